//! Internationalized URL routing for axum.
//!
//! - [`resolver`]: ordered strategy chain picking the requester's language
//! - [`middleware`]: activates that language for the span of a request
//! - [`reverse`]: language-aware URL reversal with namespace fallback
//! - [`tags`] and [`template`]: the `i18nurl` / `current_i18nurl` template tags
//! - [`views`]: guess-language redirect and language selection endpoints

pub mod app;
pub mod config;
pub mod error;
pub mod i18n;
pub mod middleware;
pub mod principal;
pub mod resolver;
pub mod reverse;
pub mod session;
pub mod tags;
pub mod template;
pub mod urls;
pub mod views;

pub use error::{Error, Result};
pub use reverse::{reverse_i18n, I18nReverser};

//! Languages: what is supported and which one is active.
//!
//! # Architecture
//!
//! - `registry`: the configured supported languages and the default one
//! - `language`: validated `Language` type and code normalization
//! - `context`: the task-local Active Language and its scoped overrides
//!
//! # Example
//!
//! ```rust
//! use i18n_url::i18n::LanguageRegistry;
//!
//! let registry = LanguageRegistry::default();
//! let french = registry.match_code("fr-CH").unwrap();
//! assert_eq!(french.code(), "fr");
//! ```

pub mod context;
mod language;
mod registry;

pub use language::{normalize, Language};
pub use registry::{LanguageConfig, LanguageRegistry};

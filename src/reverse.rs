//! Language-aware URL reversal.
//!
//! Reversal is a read-only probe: the Active Language is overridden with the
//! target language for the duration of the lookup and restored afterwards on
//! every exit path.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::i18n::{context, Language};
use crate::urls::{RouteMatch, RouteReference, UrlTable};

/// Reverse `reference` in `language`, restoring the Active Language afterwards.
pub fn reverse_i18n(table: &UrlTable, reference: &RouteReference, language: &Language) -> Result<String> {
    let _guard = context::override_language(language);
    table.reverse(reference, language)
}

/// Reverser with the namespace fallback used by the template tags and views.
#[derive(Debug, Clone)]
pub struct I18nReverser {
    table: Arc<UrlTable>,
    namespaces: Vec<String>,
}

impl I18nReverser {
    /// `namespaces` are tried in order, as `"{namespace}.{name}"`, whenever
    /// the bare name does not resolve.
    pub fn new(table: Arc<UrlTable>, namespaces: Vec<String>) -> Self {
        Self { table, namespaces }
    }

    pub fn table(&self) -> &Arc<UrlTable> {
        &self.table
    }

    /// Reverse `reference` in `language`.
    ///
    /// When neither the bare nor any namespace-qualified name resolves, the
    /// error of the bare lookup is returned, unless `as_var` is set, in which
    /// case the result is an empty string.
    pub fn reverse(&self, reference: &RouteReference, language: &Language, as_var: bool) -> Result<String> {
        if reference.name.is_empty() {
            return Err(Error::no_reverse_match(
                "",
                "'i18nurl' requires a non-empty first argument",
            ));
        }

        let _guard = context::override_language(language);

        let original = match self.table.reverse(reference, language) {
            Ok(url) => return Ok(url),
            Err(err) => err,
        };

        for namespace in &self.namespaces {
            let qualified = reference.renamed(format!("{}.{}", namespace, reference.name));
            if let Ok(url) = self.table.reverse(&qualified, language) {
                debug!("Reversed '{}' as '{}'", reference.name, qualified.name);
                return Ok(url);
            }
        }

        if as_var {
            debug!("Reverse for '{}' failed, binding empty string: {}", reference.name, original);
            Ok(String::new())
        } else {
            Err(original)
        }
    }

    /// Reverse the route the current request matched, in another language.
    ///
    /// Requests without a matched route produce an empty string.
    pub fn reverse_current(
        &self,
        current: Option<&RouteMatch>,
        language: &Language,
        as_var: bool,
    ) -> Result<String> {
        match current {
            Some(matched) => self.reverse(&matched.to_reference(), language, as_var),
            None => Ok(String::new()),
        }
    }
}

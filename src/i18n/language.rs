//! Language type: a validated, normalized language code.
//!
//! A `Language` can only be obtained through the [`LanguageRegistry`](super::LanguageRegistry),
//! so holding one means the code belongs to the configured supported set.

use std::fmt;

/// A supported language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language {
    /// Normalized language code (e.g., "en", "pt-br")
    code: String,
}

impl Language {
    pub(crate) fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }

    /// Get the language code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Primary subtag of the code ("pt" for "pt-br").
    pub fn primary(&self) -> &str {
        primary_subtag(&self.code)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

impl AsRef<str> for Language {
    fn as_ref(&self) -> &str {
        &self.code
    }
}

/// Normalize a candidate language code.
///
/// Accepts POSIX locale names and BCP 47 style tags: the encoding suffix
/// (`.UTF-8`) and modifier (`@euro`) are dropped, `_` becomes `-` and the
/// result is lowercased. Anything that does not look like a language tag
/// afterwards yields `None`.
///
/// # Example
/// ```
/// use i18n_url::i18n::normalize;
///
/// assert_eq!(normalize("fr_CH.UTF-8").as_deref(), Some("fr-ch"));
/// assert_eq!(normalize("*"), None);
/// ```
pub fn normalize(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    let candidate = candidate.split('.').next().unwrap_or(candidate);
    let candidate = candidate.split('@').next().unwrap_or(candidate);
    if candidate.is_empty() {
        return None;
    }

    let normalized = candidate.replace('_', "-").to_ascii_lowercase();

    let mut subtags = normalized.split('-');
    let primary = subtags.next()?;
    if !(2..=8).contains(&primary.len()) || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    for subtag in subtags {
        if subtag.is_empty() || subtag.len() > 8 || !subtag.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return None;
        }
    }

    Some(normalized)
}

/// Primary subtag of an already normalized code.
pub(crate) fn primary_subtag(code: &str) -> &str {
    code.split('-').next().unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ==================== normalize Tests ====================

    #[test]
    fn test_normalize_plain_code() {
        assert_eq!(normalize("en").as_deref(), Some("en"));
        assert_eq!(normalize("FR").as_deref(), Some("fr"));
    }

    #[test]
    fn test_normalize_region() {
        assert_eq!(normalize("fr-CH").as_deref(), Some("fr-ch"));
        assert_eq!(normalize("pt_BR").as_deref(), Some("pt-br"));
    }

    #[test]
    fn test_normalize_strips_encoding_and_modifier() {
        assert_eq!(normalize("de_DE.UTF-8").as_deref(), Some("de-de"));
        assert_eq!(normalize("ca_ES@valencia").as_deref(), Some("ca-es"));
        assert_eq!(normalize("  es  ").as_deref(), Some("es"));
    }

    #[test]
    fn test_normalize_rejects_malformed() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("*"), None);
        assert_eq!(normalize("e"), None);
        assert_eq!(normalize("en us"), None);
        assert_eq!(normalize("en--us"), None);
        assert_eq!(normalize("../etc"), None);
        assert_eq!(normalize("12"), None);
    }

    // ==================== Language Tests ====================

    #[test]
    fn test_language_primary() {
        assert_eq!(Language::new("pt-br").primary(), "pt");
        assert_eq!(Language::new("en").primary(), "en");
    }

    #[test]
    fn test_language_display() {
        assert_eq!(Language::new("fr").to_string(), "fr");
    }

    proptest! {
        #[test]
        fn test_normalize_is_idempotent(candidate in "[A-Za-z]{2,3}([-_][A-Za-z0-9]{2,4})?") {
            let once = normalize(&candidate).expect("well-formed tag");
            prop_assert_eq!(normalize(&once), Some(once.clone()));
            prop_assert_eq!(once.to_ascii_lowercase(), once);
        }

        #[test]
        fn test_normalize_never_panics(candidate in ".*") {
            let _ = normalize(&candidate);
        }
    }
}

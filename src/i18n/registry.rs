//! Language registry: single source of truth for the supported languages.
//!
//! The registry is built once at startup from configuration and shared
//! read-only (behind an `Arc`) by the resolver chain, the URL table and the
//! views.

use super::language::{normalize, primary_subtag, Language};
use crate::error::{Error, Result};

/// Configuration for a supported language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageConfig {
    /// Normalized language code (e.g., "en", "fr", "pt-br")
    pub code: String,

    /// Display name of the language (e.g., "English", "Français")
    pub name: String,
}

impl LanguageConfig {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// The set of supported languages plus the default one.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
    default_code: String,
}

impl LanguageRegistry {
    /// Build a registry.
    ///
    /// Codes are normalized on the way in. Fails if a code is malformed, if
    /// the list is empty, or if the default language is not part of it.
    pub fn new(languages: Vec<LanguageConfig>, default_code: &str) -> Result<Self> {
        let mut normalized: Vec<LanguageConfig> = Vec::with_capacity(languages.len());
        for lang in languages {
            let code = normalize(&lang.code).ok_or_else(|| Error::UnknownLanguage(lang.code.clone()))?;
            if normalized.iter().any(|existing| existing.code == code) {
                continue;
            }
            normalized.push(LanguageConfig::new(code, lang.name));
        }

        let default = normalize(default_code)
            .ok_or_else(|| Error::UnknownLanguage(default_code.to_string()))?;
        if !normalized.iter().any(|lang| lang.code == default) {
            return Err(Error::UnknownLanguage(default_code.to_string()));
        }

        Ok(Self {
            languages: normalized,
            default_code: default,
        })
    }

    /// Get a language configuration by its exact (normalized) code.
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// All supported languages, in configuration order.
    pub fn list(&self) -> &[LanguageConfig] {
        &self.languages
    }

    /// Iterator over the supported codes.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(|lang| lang.code.as_str())
    }

    /// The configured default language.
    pub fn default_language(&self) -> Language {
        Language::new(self.default_code.clone())
    }

    /// Look up a supported language by exact code, without normalization.
    pub fn language(&self, code: &str) -> Result<Language> {
        self.get_by_code(code)
            .map(|lang| Language::new(lang.code.clone()))
            .ok_or_else(|| Error::UnknownLanguage(code.to_string()))
    }

    /// Match an arbitrary candidate against the supported set.
    ///
    /// The candidate is normalized first, then matched exactly, then by its
    /// primary subtag ("fr-CH" falls back to "fr"). Empty, malformed or
    /// unsupported candidates yield `None`.
    pub fn match_code(&self, candidate: &str) -> Option<Language> {
        let normalized = normalize(candidate)?;
        let found = [normalized.as_str(), primary_subtag(&normalized)]
            .into_iter()
            .find_map(|code| self.get_by_code(code))
            .map(|lang| Language::new(lang.code.clone()));
        found
    }

    /// Check if a candidate resolves to a supported language.
    pub fn is_supported(&self, candidate: &str) -> bool {
        self.match_code(candidate).is_some()
    }
}

impl Default for LanguageRegistry {
    /// English (default) and French.
    fn default() -> Self {
        Self {
            languages: default_languages(),
            default_code: "en".to_string(),
        }
    }
}

fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig::new("en", "English"),
        LanguageConfig::new("fr", "Français"),
    ]
}

use anyhow::{bail, Context, Result};

use crate::i18n::{LanguageConfig, LanguageRegistry};
use crate::resolver::Strategy;
use crate::session::DEFAULT_SESSION_TTL_SECS;

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,

    // Languages
    pub languages: Vec<LanguageConfig>,
    pub language_code: String,

    // Cookies
    pub language_cookie_name: String,
    pub session_cookie_name: String,
    pub sessions_enabled: bool,
    pub session_ttl_secs: u32,

    // URL reversal
    pub redirect_url_name: String,
    pub url_namespaces: Vec<String>,

    // Language resolution
    pub resolvers: Vec<Strategy>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            languages: vec![
                LanguageConfig::new("en", "English"),
                LanguageConfig::new("fr", "Français"),
            ],
            language_code: "en".to_string(),
            language_cookie_name: "i18n_language".to_string(),
            session_cookie_name: "sessionid".to_string(),
            sessions_enabled: true,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            redirect_url_name: "home".to_string(),
            url_namespaces: vec!["demoproject".to_string()],
            resolvers: Strategy::ALL.to_vec(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            // Server
            port: match std::env::var("PORT") {
                Ok(v) => v.parse().with_context(|| format!("Invalid PORT: '{}'", v))?,
                Err(_) => defaults.port,
            },

            // Languages
            languages: match std::env::var("LANGUAGES") {
                Ok(v) => parse_languages(&v).context("Invalid LANGUAGES")?,
                Err(_) => defaults.languages,
            },
            language_code: std::env::var("LANGUAGE_CODE").unwrap_or(defaults.language_code),

            // Cookies
            language_cookie_name: std::env::var("LANGUAGE_COOKIE_NAME")
                .unwrap_or(defaults.language_cookie_name),
            session_cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or(defaults.session_cookie_name),
            sessions_enabled: std::env::var("SESSIONS_ENABLED")
                .ok()
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(defaults.sessions_enabled),
            session_ttl_secs: match std::env::var("SESSION_TTL_SECS") {
                Ok(v) => v
                    .parse()
                    .with_context(|| format!("Invalid SESSION_TTL_SECS: '{}'", v))?,
                Err(_) => defaults.session_ttl_secs,
            },

            // URL reversal
            redirect_url_name: std::env::var("I18N_REDIRECT_URL_NAME")
                .unwrap_or(defaults.redirect_url_name),
            url_namespaces: std::env::var("I18N_URL_NAMESPACES")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.url_namespaces),

            // Language resolution
            resolvers: match std::env::var("I18N_RESOLVERS") {
                Ok(v) => split_list(&v)
                    .iter()
                    .map(|name| name.parse::<Strategy>())
                    .collect::<Result<Vec<_>, _>>()
                    .context("Invalid I18N_RESOLVERS")?,
                Err(_) => defaults.resolvers,
            },
        })
    }

    /// Build the language registry described by this configuration.
    pub fn registry(&self) -> Result<LanguageRegistry> {
        LanguageRegistry::new(self.languages.clone(), &self.language_code)
            .context("Invalid language configuration")
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `code:Name` pairs separated by commas. The name defaults to the code.
fn parse_languages(value: &str) -> Result<Vec<LanguageConfig>> {
    let languages: Vec<LanguageConfig> = split_list(value)
        .iter()
        .map(|item| match item.split_once(':') {
            Some((code, name)) => LanguageConfig::new(code.trim(), name.trim()),
            None => LanguageConfig::new(item.as_str(), item.as_str()),
        })
        .collect();

    if languages.is_empty() {
        bail!("at least one language is required");
    }
    Ok(languages)
}

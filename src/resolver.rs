//! Language resolution: an ordered chain of strategies.
//!
//! Each strategy is a plain function of the request signals returning an
//! optional language. The chain returns the first hit. Strategies never
//! fail; malformed or unsupported input simply means "no opinion".

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use axum::http::{header, request::Parts};
use axum_extra::extract::cookie::CookieJar;
use regex::Regex;
use tracing::debug;

use crate::error::Error;
use crate::i18n::{Language, LanguageRegistry};
use crate::principal::Principal;
use crate::session::{Session, SESSION_LANGUAGE_KEY};

/// The language bound to a request by the activator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLanguage(pub Language);

/// Everything the strategies may look at, captured from one request.
#[derive(Debug, Clone, Default)]
pub struct RequestSignals {
    pub path: String,
    pub cookies: HashMap<String, String>,
    pub session: Option<Session>,
    pub accept_language: Option<String>,
    pub principal: Option<Principal>,
    /// Language already bound to the request by an earlier stage.
    pub bound: Option<Language>,
}

impl RequestSignals {
    pub fn from_parts(parts: &Parts) -> Self {
        let jar = CookieJar::from_headers(&parts.headers);
        Self {
            path: parts.uri.path().to_string(),
            cookies: jar
                .iter()
                .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
                .collect(),
            session: parts.extensions.get::<Session>().cloned(),
            accept_language: parts
                .headers
                .get(header::ACCEPT_LANGUAGE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            principal: parts.extensions.get::<Principal>().cloned(),
            bound: parts
                .extensions
                .get::<RequestLanguage>()
                .map(|RequestLanguage(language)| language.clone()),
        }
    }
}

/// One way of inferring the requester's language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// A language already bound to the request.
    Override,
    /// Supported language code as the first path segment.
    UrlPrefix,
    Cookie,
    Session,
    AcceptLanguage,
    /// The authenticated principal's stored preference.
    User,
    Default,
}

impl Strategy {
    /// The full chain in its usual precedence order.
    pub const ALL: [Strategy; 7] = [
        Strategy::Override,
        Strategy::UrlPrefix,
        Strategy::Cookie,
        Strategy::Session,
        Strategy::AcceptLanguage,
        Strategy::User,
        Strategy::Default,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Override => "override",
            Strategy::UrlPrefix => "url_prefix",
            Strategy::Cookie => "cookie",
            Strategy::Session => "session",
            Strategy::AcceptLanguage => "accept_language",
            Strategy::User => "user",
            Strategy::Default => "default",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s.trim())
            .ok_or_else(|| Error::UnknownStrategy(s.to_string()))
    }
}

/// Configured, ordered strategy chain. Read-only after startup.
#[derive(Debug, Clone)]
pub struct ResolverChain {
    registry: Arc<LanguageRegistry>,
    strategies: Vec<Strategy>,
    cookie_name: String,
    prefix_re: Regex,
}

impl ResolverChain {
    pub fn new(registry: Arc<LanguageRegistry>, strategies: Vec<Strategy>, cookie_name: impl Into<String>) -> Self {
        let alternatives = registry
            .codes()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        let prefix_re = Regex::new(&format!(r"^/(?P<language>{})(?P<path>/.*|)$", alternatives))
            .expect("escaped language codes form a valid regex");

        Self {
            registry,
            strategies,
            cookie_name: cookie_name.into(),
            prefix_re,
        }
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn registry(&self) -> &Arc<LanguageRegistry> {
        &self.registry
    }

    /// First non-empty strategy result, in chain order.
    pub fn resolve(&self, signals: &RequestSignals) -> Option<Language> {
        self.strategies.iter().find_map(|strategy| {
            let language = self.apply(*strategy, signals)?;
            debug!("Language '{}' resolved by {} strategy", language, strategy);
            Some(language)
        })
    }

    /// Run a single strategy.
    pub fn apply(&self, strategy: Strategy, signals: &RequestSignals) -> Option<Language> {
        match strategy {
            Strategy::Override => signals.bound.clone(),
            Strategy::UrlPrefix => self.from_url_prefix(&signals.path),
            Strategy::Cookie => signals
                .cookies
                .get(&self.cookie_name)
                .and_then(|code| self.registry.match_code(code)),
            Strategy::Session => signals
                .session
                .as_ref()
                .and_then(|session| session.get(SESSION_LANGUAGE_KEY))
                .and_then(|code| self.registry.match_code(&code)),
            Strategy::AcceptLanguage => signals
                .accept_language
                .as_deref()
                .and_then(|header| self.from_accept_language(header)),
            Strategy::User => signals
                .principal
                .as_ref()
                .and_then(|principal| principal.language_code.as_deref())
                .and_then(|code| self.registry.match_code(code)),
            Strategy::Default => Some(self.registry.default_language()),
        }
    }

    fn from_url_prefix(&self, path: &str) -> Option<Language> {
        let caps = self.prefix_re.captures(path)?;
        self.registry.match_code(&caps["language"])
    }

    fn from_accept_language(&self, header: &str) -> Option<Language> {
        for (tag, _) in parse_accept_language(header) {
            if tag == "*" {
                break;
            }
            if let Some(language) = self.registry.match_code(&tag) {
                return Some(language);
            }
        }
        None
    }
}

fn accept_entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z]{1,8}(?:-[A-Za-z0-9]{1,8})*|\*)(?:\s*;\s*q\s*=\s*([0-9.]+))?$")
            .expect("accept-language regex is valid")
    })
}

/// Parse an `Accept-Language` header into `(tag, quality)` pairs.
///
/// Entries are ordered by descending quality, keeping header order among
/// equal qualities. Malformed entries and entries with `q=0` are dropped.
pub fn parse_accept_language(header: &str) -> Vec<(String, f32)> {
    let mut entries: Vec<(String, f32)> = header
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let caps = accept_entry_re().captures(entry)?;
            let quality = match caps.get(2) {
                Some(q) => q.as_str().parse::<f32>().ok()?,
                None => 1.0,
            };
            if !(0.0..=1.0).contains(&quality) || quality == 0.0 {
                return None;
            }
            Some((caps[1].to_string(), quality))
        })
        .collect();

    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries
}

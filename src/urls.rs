//! Routing table with per-language patterns.
//!
//! Every route has a logical name (optionally namespace-qualified, e.g.
//! `demoproject.home` or `blog:detail`), a default pattern and optional
//! translated patterns keyed by language code. Patterns are absolute paths
//! whose segments are either literal text, the `{language}` placeholder or a
//! named `{param}` placeholder.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;

use crate::error::{Error, Result};
use crate::i18n::{Language, LanguageRegistry};

const LANGUAGE_PLACEHOLDER: &str = "language";

/// Bytes escaped in a parameter segment. Non-ASCII is always escaped.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A logical route name plus its parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteReference {
    pub name: String,
    pub args: Vec<String>,
    pub kwargs: BTreeMap<String, String>,
}

impl RouteReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Same parameters under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
        }
    }
}

/// The route a path resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Fully qualified route name.
    pub route_name: String,
    /// Language the path was written in, when the pattern is language-specific.
    pub language: Option<Language>,
    pub kwargs: BTreeMap<String, String>,
}

impl RouteMatch {
    /// A reference to the same route with the same parameters.
    pub fn to_reference(&self) -> RouteReference {
        RouteReference {
            name: self.route_name.clone(),
            args: Vec::new(),
            kwargs: self.kwargs.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Language,
    Param(String),
}

#[derive(Debug, Clone)]
struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\{(\w+)\}$").expect("placeholder regex is valid"))
}

impl Pattern {
    fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        if !raw.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut segments = Vec::new();
        let mut seen = Vec::new();
        for part in raw.split('/') {
            if let Some(caps) = placeholder_re().captures(part) {
                let name = &caps[1];
                if name == LANGUAGE_PLACEHOLDER {
                    segments.push(Segment::Language);
                    continue;
                }
                if seen.iter().any(|existing: &String| existing == name) {
                    return Err(invalid("duplicate parameter"));
                }
                seen.push(name.to_string());
                segments.push(Segment::Param(name.to_string()));
            } else if part.contains('{') || part.contains('}') {
                return Err(invalid("placeholders must span a whole segment"));
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            _ => None,
        })
    }

    fn has_language(&self) -> bool {
        self.segments.contains(&Segment::Language)
    }

    fn matches(&self, path: &str, language: &Language) -> Option<BTreeMap<String, String>> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut kwargs = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(text) if text == part => {}
                Segment::Language if part == language.code() => {}
                Segment::Param(name) if !part.is_empty() => {
                    let value = percent_decode_str(part).decode_utf8().ok()?;
                    kwargs.insert(name.clone(), value.into_owned());
                }
                _ => return None,
            }
        }
        Some(kwargs)
    }

    fn fill(&self, language: &Language, values: &HashMap<&str, &str>) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => Cow::Borrowed(text.as_str()),
                Segment::Language => Cow::Borrowed(language.code()),
                Segment::Param(name) => {
                    let value = values.get(name.as_str()).copied().unwrap_or_default();
                    Cow::from(utf8_percent_encode(value, SEGMENT))
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// A named route with its default and translated patterns.
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    default: Pattern,
    translated: HashMap<String, Pattern>,
}

impl Route {
    /// Create a route; `pattern` is used for every language without a translation.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            default: Pattern::parse(pattern)?,
            translated: HashMap::new(),
        })
    }

    /// Add a language-specific pattern. It must take the same parameters as
    /// the default pattern.
    pub fn translate(mut self, code: &str, pattern: &str) -> Result<Self> {
        let parsed = Pattern::parse(pattern)?;
        let mut expected: Vec<_> = self.default.params().collect();
        let mut actual: Vec<_> = parsed.params().collect();
        expected.sort_unstable();
        actual.sort_unstable();
        if expected != actual {
            return Err(Error::InvalidPattern {
                pattern: pattern.to_string(),
                reason: format!("parameters differ from '{}'", self.default.raw),
            });
        }
        self.translated.insert(code.to_string(), parsed);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn pattern_for(&self, language: &Language) -> &Pattern {
        self.translated.get(language.code()).unwrap_or(&self.default)
    }
}

/// Named routes, reversible and resolvable in every supported language.
#[derive(Debug, Clone)]
pub struct UrlTable {
    registry: Arc<LanguageRegistry>,
    routes: Vec<Route>,
}

impl UrlTable {
    pub fn new(registry: Arc<LanguageRegistry>) -> Self {
        Self {
            registry,
            routes: Vec::new(),
        }
    }

    /// Register a route. Names must be unique and translations must target
    /// supported languages.
    pub fn add(&mut self, route: Route) -> Result<()> {
        if self.get(&route.name).is_some() {
            return Err(Error::InvalidPattern {
                pattern: route.default.raw.clone(),
                reason: format!("route '{}' is already registered", route.name),
            });
        }
        for code in route.translated.keys() {
            self.registry.language(code)?;
        }
        self.routes.push(route);
        Ok(())
    }

    /// Builder-style [`add`](Self::add).
    pub fn with_route(mut self, route: Route) -> Result<Self> {
        self.add(route)?;
        Ok(self)
    }

    pub fn registry(&self) -> &Arc<LanguageRegistry> {
        &self.registry
    }

    pub fn get(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.name == name)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Compute the path of `reference` in `language`.
    ///
    /// Positional arguments fill the parameters in pattern order, keyword
    /// arguments fill them by name. Mixing both, or supplying the wrong
    /// parameters, fails with [`Error::NoReverseMatch`].
    pub fn reverse(&self, reference: &RouteReference, language: &Language) -> Result<String> {
        let name = reference.name.as_str();
        let route = self
            .get(name)
            .ok_or_else(|| Error::no_reverse_match(name, "no route with this name"))?;
        let pattern = route.pattern_for(language);
        let params: Vec<&str> = pattern.params().collect();

        if !reference.args.is_empty() && !reference.kwargs.is_empty() {
            return Err(Error::no_reverse_match(
                name,
                "positional and keyword arguments cannot be mixed",
            ));
        }

        let values: HashMap<&str, &str> = if reference.kwargs.is_empty() {
            if reference.args.len() != params.len() {
                return Err(Error::no_reverse_match(
                    name,
                    format!(
                        "expected {} argument(s), got {}",
                        params.len(),
                        reference.args.len()
                    ),
                ));
            }
            params
                .iter()
                .copied()
                .zip(reference.args.iter().map(String::as_str))
                .collect()
        } else {
            let mut given: Vec<&str> = reference.kwargs.keys().map(String::as_str).collect();
            let mut expected = params.clone();
            given.sort_unstable();
            expected.sort_unstable();
            if given != expected {
                return Err(Error::no_reverse_match(
                    name,
                    format!("expected keyword arguments {:?}, got {:?}", expected, given),
                ));
            }
            reference
                .kwargs
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str()))
                .collect()
        };

        if let Some((param, value)) = values
            .iter()
            .find(|(_, value)| value.is_empty() || value.contains(['/', '?', '#']))
        {
            return Err(Error::no_reverse_match(
                name,
                format!("invalid value {:?} for parameter '{}'", value, param),
            ));
        }

        Ok(pattern.fill(language, &values))
    }

    /// Find the route a path belongs to, trying every supported language.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        for route in &self.routes {
            for code in self.registry.codes() {
                let language = Language::new(code);
                let pattern = route.pattern_for(&language);
                if let Some(kwargs) = pattern.matches(path, &language) {
                    let specific =
                        pattern.has_language() || route.translated.contains_key(language.code());
                    return Some(RouteMatch {
                        route_name: route.name.clone(),
                        language: specific.then_some(language),
                        kwargs,
                    });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> UrlTable {
        UrlTable::new(Arc::new(LanguageRegistry::default()))
            .with_route(Route::new("demoproject.home", "/{language}/").unwrap())
            .unwrap()
            .with_route(
                Route::new("about", "/{language}/about/")
                    .unwrap()
                    .translate("fr", "/{language}/a-propos/")
                    .unwrap(),
            )
            .unwrap()
            .with_route(Route::new("blog:detail", "/{language}/blog/{year}/{slug}/").unwrap())
            .unwrap()
            .with_route(Route::new("health", "/health").unwrap())
            .unwrap()
    }

    fn lang(code: &str) -> Language {
        LanguageRegistry::default().language(code).unwrap()
    }

    // ==================== Pattern Tests ====================

    #[test]
    fn test_pattern_requires_leading_slash() {
        assert!(Route::new("x", "about/").is_err());
    }

    #[test]
    fn test_pattern_rejects_partial_placeholder() {
        assert!(Route::new("x", "/page-{id}/").is_err());
    }

    #[test]
    fn test_pattern_rejects_duplicate_params() {
        assert!(Route::new("x", "/{id}/{id}/").is_err());
    }

    #[test]
    fn test_translation_must_keep_params() {
        let route = Route::new("x", "/{language}/{id}/").unwrap();
        assert!(route.translate("fr", "/{language}/").is_err());
    }

    #[test]
    fn test_add_rejects_duplicate_names() {
        let mut table = table();
        assert!(table.add(Route::new("about", "/other/").unwrap()).is_err());
    }

    #[test]
    fn test_add_rejects_unsupported_translation() {
        let mut table = table();
        let route = Route::new("contact", "/contact/")
            .unwrap()
            .translate("de", "/kontakt/")
            .unwrap();
        assert!(table.add(route).is_err());
    }

    // ==================== reverse Tests ====================

    #[test]
    fn test_reverse_language_prefix() {
        let table = table();
        let home = RouteReference::new("demoproject.home");
        assert_eq!(table.reverse(&home, &lang("en")).unwrap(), "/en/");
        assert_eq!(table.reverse(&home, &lang("fr")).unwrap(), "/fr/");
    }

    #[test]
    fn test_reverse_translated_pattern() {
        let table = table();
        let about = RouteReference::new("about");
        assert_eq!(table.reverse(&about, &lang("en")).unwrap(), "/en/about/");
        assert_eq!(table.reverse(&about, &lang("fr")).unwrap(), "/fr/a-propos/");
    }

    #[test]
    fn test_reverse_positional_args() {
        let table = table();
        let detail = RouteReference::new("blog:detail").arg("2024").arg("hello");
        assert_eq!(
            table.reverse(&detail, &lang("fr")).unwrap(),
            "/fr/blog/2024/hello/"
        );
    }

    #[test]
    fn test_reverse_keyword_args() {
        let table = table();
        let detail = RouteReference::new("blog:detail")
            .kwarg("slug", "hello")
            .kwarg("year", "2024");
        assert_eq!(
            table.reverse(&detail, &lang("en")).unwrap(),
            "/en/blog/2024/hello/"
        );
    }

    #[test]
    fn test_reverse_unknown_name() {
        let table = table();
        let err = table
            .reverse(&RouteReference::new("missing"), &lang("en"))
            .unwrap_err();
        assert!(matches!(err, Error::NoReverseMatch { name, .. } if name == "missing"));
    }

    #[test]
    fn test_reverse_wrong_arguments() {
        let table = table();
        let en = lang("en");
        assert!(table
            .reverse(&RouteReference::new("blog:detail").arg("2024"), &en)
            .is_err());
        assert!(table
            .reverse(&RouteReference::new("blog:detail").kwarg("year", "2024"), &en)
            .is_err());
        assert!(table
            .reverse(
                &RouteReference::new("blog:detail")
                    .arg("2024")
                    .kwarg("slug", "hello"),
                &en
            )
            .is_err());
        assert!(table
            .reverse(&RouteReference::new("demoproject.home").arg("extra"), &en)
            .is_err());
    }

    #[test]
    fn test_reverse_rejects_unsafe_values() {
        let table = table();
        let detail = RouteReference::new("blog:detail").arg("2024").arg("a/b");
        assert!(table.reverse(&detail, &lang("en")).is_err());
        let detail = RouteReference::new("blog:detail").arg("").arg("x");
        assert!(table.reverse(&detail, &lang("en")).is_err());
    }

    #[test]
    fn test_reverse_percent_encodes_values() {
        let table = table();
        let detail = RouteReference::new("blog:detail")
            .kwarg("year", "2024")
            .kwarg("slug", "café au lait");
        assert_eq!(
            table.reverse(&detail, &lang("fr")).unwrap(),
            "/fr/blog/2024/caf%C3%A9%20au%20lait/"
        );

        let percent = RouteReference::new("blog:detail").arg("2024").arg("100%");
        assert_eq!(
            table.reverse(&percent, &lang("en")).unwrap(),
            "/en/blog/2024/100%25/"
        );
    }

    // ==================== resolve Tests ====================

    #[test]
    fn test_resolve_decodes_values() {
        let table = table();
        let matched = table.resolve("/en/blog/2024/caf%C3%A9%20au%20lait/").unwrap();
        assert_eq!(
            matched.kwargs.get("slug").map(String::as_str),
            Some("café au lait")
        );
        assert!(table.resolve("/en/blog/2024/%FF/").is_none());
    }

    #[test]
    fn test_resolve_translated_path() {
        let table = table();
        let matched = table.resolve("/fr/a-propos/").unwrap();
        assert_eq!(matched.route_name, "about");
        assert_eq!(matched.language, Some(lang("fr")));
    }

    #[test]
    fn test_resolve_extracts_kwargs() {
        let table = table();
        let matched = table.resolve("/en/blog/2024/hello/").unwrap();
        assert_eq!(matched.route_name, "blog:detail");
        assert_eq!(matched.kwargs.get("year").map(String::as_str), Some("2024"));
        assert_eq!(matched.kwargs.get("slug").map(String::as_str), Some("hello"));
    }

    #[test]
    fn test_resolve_language_neutral_route() {
        let table = table();
        let matched = table.resolve("/health").unwrap();
        assert_eq!(matched.route_name, "health");
        assert_eq!(matched.language, None);
    }

    #[test]
    fn test_resolve_no_match() {
        let table = table();
        assert!(table.resolve("/de/").is_none());
        assert!(table.resolve("/fr/about/").is_none());
        assert!(table.resolve("/en/blog/2024//").is_none());
    }

    #[test]
    fn test_reverse_then_resolve_round_trip() {
        let table = table();
        let references = [
            RouteReference::new("demoproject.home"),
            RouteReference::new("about"),
            RouteReference::new("blog:detail")
                .kwarg("year", "2024")
                .kwarg("slug", "hello"),
            RouteReference::new("blog:detail")
                .kwarg("year", "2024")
                .kwarg("slug", "crème brûlée 50%"),
            RouteReference::new("health"),
        ];
        for code in ["en", "fr"] {
            let language = lang(code);
            for reference in &references {
                let path = table.reverse(reference, &language).unwrap();
                let matched = table.resolve(&path).unwrap();
                assert_eq!(matched.route_name, reference.name);
                assert_eq!(matched.kwargs, reference.kwargs);
            }
        }
    }
}

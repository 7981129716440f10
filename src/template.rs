//! Minimal templates: text, `{{ variable }}` and the URL tags.
//!
//! Compilation parses every tag up front; rendering only evaluates.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::i18n::LanguageRegistry;
use crate::reverse::I18nReverser;
use crate::tags::{split_contents, CurrentUrlTag, Expr, UrlTag, CURRENT_URL_TAG, URL_TAG};
use crate::urls::RouteMatch;

/// A context value. `Safe` values are emitted without HTML escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Safe(String),
}

impl Value {
    pub fn as_str(&self) -> &str {
        match self {
            Value::Text(s) | Value::Safe(s) => s,
        }
    }
}

/// Variables available while rendering, plus the route of the current request.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    vars: HashMap<String, Value>,
    current_route: Option<RouteMatch>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context pre-populated with the i18n settings and the active language.
    ///
    /// `I18N_LANGUAGES` lists the supported languages as `code:Name`
    /// entries separated by commas.
    pub fn i18n(registry: &LanguageRegistry, redirect_url_name: &str, language_code: &str) -> Self {
        let mut context = Self::new();
        context.set(
            "I18N_LANGUAGES",
            registry
                .list()
                .iter()
                .map(|lang| format!("{}:{}", lang.code, lang.name))
                .collect::<Vec<_>>()
                .join(","),
        );
        context.set("I18N_REDIRECT_URL_NAME", redirect_url_name);
        context.set("LANGUAGE_CODE", language_code);
        context
    }

    pub fn with_current_route(mut self, current_route: Option<RouteMatch>) -> Self {
        self.current_route = current_route;
        self
    }

    pub fn current_route(&self) -> Option<&RouteMatch> {
        self.current_route.as_ref()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), Value::Text(value.into()));
    }

    /// Set pre-rendered markup that must not be escaped.
    pub fn set_safe(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), Value::Safe(value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(Value::as_str)
    }

    fn value(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Variable(Expr),
    Url(UrlTag),
    CurrentUrl(CurrentUrlTag),
}

/// A compiled template.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parse `source`. Unknown tags, malformed tag arguments and unclosed
    /// delimiters are reported here.
    pub fn compile(source: &str) -> Result<Self> {
        let mut nodes = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{").into_iter().chain(rest.find("{%")).min() {
            if start > 0 {
                nodes.push(Node::Text(rest[..start].to_string()));
            }
            let is_tag = rest[start..].starts_with("{%");
            let close = if is_tag { "%}" } else { "}}" };
            let body_start = start + 2;
            let end = rest[body_start..]
                .find(close)
                .map(|offset| body_start + offset)
                .ok_or_else(|| Error::syntax(format!("Unclosed tag starting at '{}'", excerpt(&rest[start..]))))?;
            let body = rest[body_start..end].trim();

            nodes.push(if is_tag {
                compile_tag(body)?
            } else {
                Node::Variable(Expr::parse(body)?)
            });
            rest = &rest[end + 2..];
        }

        if !rest.is_empty() {
            nodes.push(Node::Text(rest.to_string()));
        }
        Ok(Self { nodes })
    }

    pub fn render(&self, context: &mut TemplateContext, reverser: &I18nReverser) -> Result<String> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Variable(Expr::Variable(name)) => match context.value(name) {
                    Some(Value::Safe(markup)) => out.push_str(markup),
                    Some(Value::Text(text)) => out.push_str(&escape_html(text)),
                    None => {}
                },
                Node::Variable(literal) => out.push_str(&escape_html(&literal.resolve(context))),
                Node::Url(tag) => out.push_str(&tag.render(context, reverser)?),
                Node::CurrentUrl(tag) => out.push_str(&tag.render(context, reverser)?),
            }
        }
        Ok(out)
    }
}

fn compile_tag(body: &str) -> Result<Node> {
    let bits = split_contents(body)?;
    match bits.first().map(String::as_str) {
        Some(URL_TAG) => Ok(Node::Url(UrlTag::parse(bits)?)),
        Some(CURRENT_URL_TAG) => Ok(Node::CurrentUrl(CurrentUrlTag::parse(bits)?)),
        Some(other) => Err(Error::syntax(format!("Invalid block tag: '{}'", other))),
        None => Err(Error::syntax("Empty block tag")),
    }
}

fn excerpt(s: &str) -> String {
    s.chars().take(20).collect()
}

/// Escape text for HTML content and quoted attribute values.
pub fn escape_html(s: &str) -> String {
    html_escape::encode_quoted_attribute(s).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::urls::{Route, UrlTable};
    use std::sync::Arc;

    fn reverser() -> I18nReverser {
        let table = UrlTable::new(Arc::new(LanguageRegistry::default()))
            .with_route(Route::new("demoproject.home", "/{language}/").unwrap())
            .unwrap()
            .with_route(
                Route::new("demoproject.about", "/{language}/about/")
                    .unwrap()
                    .translate("fr", "/{language}/a-propos/")
                    .unwrap(),
            )
            .unwrap();
        I18nReverser::new(Arc::new(table), vec!["demoproject".to_string()])
    }

    fn render(source: &str, context: &mut TemplateContext) -> Result<String> {
        Template::compile(source)?.render(context, &reverser())
    }

    // ==================== Compile Tests ====================

    #[test]
    fn test_compile_plain_text() {
        let mut context = TemplateContext::new();
        assert_eq!(render("hello", &mut context).unwrap(), "hello");
    }

    #[test]
    fn test_compile_unknown_tag() {
        let err = Template::compile("{% for x in y %}").unwrap_err();
        assert!(matches!(err, Error::TemplateSyntax(msg) if msg.contains("Invalid block tag")));
    }

    #[test]
    fn test_compile_unclosed() {
        assert!(Template::compile("{% i18nurl \"home\" \"fr\"").is_err());
        assert!(Template::compile("{{ name").is_err());
    }

    #[test]
    fn test_compile_reports_tag_errors_before_render() {
        assert!(Template::compile("ok {% i18nurl \"home\" %}").is_err());
        assert!(Template::compile("{% current_i18nurl %}").is_err());
        assert!(Template::compile("{% %}").is_err());
    }

    // ==================== Render Tests ====================

    #[test]
    fn test_render_variables_escaped() {
        let mut context = TemplateContext::new();
        context.set("name", "<b>Ana</b>");
        context.set_safe("markup", "<i>ok</i>");
        assert_eq!(
            render("{{ name }} {{markup}} {{ missing }}", &mut context).unwrap(),
            "&lt;b&gt;Ana&lt;/b&gt; <i>ok</i> "
        );
    }

    #[test]
    fn test_render_url_tags() {
        let reverser = reverser();
        let mut context = TemplateContext::i18n(reverser.table().registry(), "home", "en")
            .with_current_route(reverser.table().resolve("/en/about/"));
        let out = Template::compile(
            r#"<a href="{% i18nurl "home" LANGUAGE_CODE %}">home</a> <a href="{% current_i18nurl "fr" %}">fr</a>"#,
        )
        .unwrap()
        .render(&mut context, &reverser)
        .unwrap();
        assert_eq!(out, r#"<a href="/en/">home</a> <a href="/fr/a-propos/">fr</a>"#);
    }

    #[test]
    fn test_render_as_var_then_use() {
        let mut context = TemplateContext::new();
        let out = render(
            r#"{% i18nurl "about" "fr" as link %}[{{ link }}]"#,
            &mut context,
        )
        .unwrap();
        assert_eq!(out, "[/fr/a-propos/]");
    }

    #[test]
    fn test_render_missing_route_fails() {
        let mut context = TemplateContext::new();
        assert!(render(r#"{% i18nurl "nowhere" "fr" %}"#, &mut context).is_err());
    }

    #[test]
    fn test_i18n_context_processor() {
        let context = TemplateContext::i18n(&LanguageRegistry::default(), "home", "fr");
        assert_eq!(context.get("I18N_LANGUAGES"), Some("en:English,fr:Français"));
        assert_eq!(context.get("I18N_REDIRECT_URL_NAME"), Some("home"));
        assert_eq!(context.get("LANGUAGE_CODE"), Some("fr"));
    }

    #[test]
    fn test_escape_html() {
        let escaped = escape_html(r#"a&b<c>"d'"#);
        assert!(escaped.starts_with("a&amp;b&lt;c&gt;"));
        assert!(!escaped.contains('"'));
        assert!(!escaped.contains('\''));
    }

    #[test]
    fn test_escape_html_keeps_urls() {
        assert_eq!(escape_html("/fr/a-propos/?x=1"), "/fr/a-propos/?x=1");
        assert_eq!(escape_html("Français"), "Français");
    }

    #[test]
    fn test_render_escapes_attribute_quotes() {
        let mut context = TemplateContext::new();
        context.set("title", r#"x" onclick="y"#);
        let out = render(r#"<a title="{{ title }}">"#, &mut context).unwrap();
        assert!(!out.contains(r#"" onclick=""#));
        assert!(out.starts_with(r#"<a title="x&quot; onclick="#));
    }
}

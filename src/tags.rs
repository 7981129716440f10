//! The `i18nurl` and `current_i18nurl` template tags.
//!
//! ```text
//! {% i18nurl "path.to.view" "fr" arg1 arg2 %}
//! {% i18nurl "path.to.view" LANGUAGE_CODE name1=value1 name2=value2 as link %}
//! {% current_i18nurl "fr" %}
//! {% current_i18nurl "fr" as link %}
//! ```
//!
//! Tags are parsed when the template is compiled, so a malformed invocation
//! is reported before anything is rendered.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::i18n::Language;
use crate::reverse::I18nReverser;
use crate::template::{escape_html, TemplateContext};
use crate::urls::RouteReference;

pub const URL_TAG: &str = "i18nurl";
pub const CURRENT_URL_TAG: &str = "current_i18nurl";

/// A tag argument: a quoted literal, a number or a context variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(String),
    Variable(String),
}

fn variable_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][\w.]*$").expect("variable regex is valid"))
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+(?:\.\d+)?$").expect("number regex is valid"))
}

fn kwarg_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:(\w+)=)?(.+)$").expect("kwarg regex is valid"))
}

impl Expr {
    pub fn parse(bit: &str) -> Result<Self> {
        for quote in ['"', '\''] {
            if bit.len() >= 2 && bit.starts_with(quote) && bit.ends_with(quote) {
                return Ok(Expr::Literal(bit[1..bit.len() - 1].to_string()));
            }
        }
        if number_re().is_match(bit) {
            return Ok(Expr::Literal(bit.to_string()));
        }
        if variable_re().is_match(bit) {
            return Ok(Expr::Variable(bit.to_string()));
        }
        Err(Error::syntax(format!("Could not parse the remainder: '{}'", bit)))
    }

    /// Evaluate against the context. Missing variables are empty.
    pub fn resolve(&self, context: &TemplateContext) -> String {
        match self {
            Expr::Literal(value) => value.clone(),
            Expr::Variable(name) => context.get(name).unwrap_or_default().to_string(),
        }
    }
}

/// Split tag contents on whitespace, keeping quoted strings together.
pub fn split_contents(contents: &str) -> Result<Vec<String>> {
    let mut bits = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in contents.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    bits.push(std::mem::take(&mut current));
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                current.push(c);
            }
        }
    }

    if quote.is_some() {
        return Err(Error::syntax(format!("Unclosed quote in '{}'", contents)));
    }
    if !current.is_empty() {
        bits.push(current);
    }
    Ok(bits)
}

/// Strip a trailing `as <name>` from the bits.
fn take_as_var(bits: &mut Vec<String>) -> Option<String> {
    let len = bits.len();
    if len >= 2 && bits[len - 2] == "as" {
        let name = bits.pop();
        bits.pop();
        name
    } else {
        None
    }
}

fn language_of(expr: &Expr, context: &TemplateContext, reverser: &I18nReverser) -> Result<Option<Language>> {
    let code = expr.resolve(context);
    if code.is_empty() {
        return Ok(None);
    }
    reverser
        .table()
        .registry()
        .match_code(&code)
        .map(Some)
        .ok_or(Error::UnknownLanguage(code))
}

/// Emit `url`, or bind it to `as_var` and emit nothing.
fn output(url: String, as_var: &Option<String>, context: &mut TemplateContext) -> String {
    match as_var {
        Some(name) => {
            context.set(name.clone(), url);
            String::new()
        }
        None => escape_html(&url),
    }
}

/// Compiled `{% i18nurl %}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTag {
    pub view_name: Expr,
    pub language: Expr,
    pub args: Vec<Expr>,
    pub kwargs: Vec<(String, Expr)>,
    pub as_var: Option<String>,
}

impl UrlTag {
    /// Compile from the split tag contents (tag name included).
    pub fn parse(mut bits: Vec<String>) -> Result<Self> {
        if bits.len() < 3 {
            return Err(Error::syntax(format!(
                "'{}' takes at least two arguments (path to a view and language)",
                bits.first().map(String::as_str).unwrap_or(URL_TAG)
            )));
        }

        let view_name = Expr::parse(&bits[1])?;
        let language = Expr::parse(&bits[2])?;

        let mut rest = bits.split_off(3);
        let as_var = take_as_var(&mut rest);

        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        for bit in &rest {
            let caps = kwarg_re()
                .captures(bit)
                .ok_or_else(|| Error::syntax("Malformed arguments to url tag"))?;
            let value = Expr::parse(&caps[2])?;
            match caps.get(1) {
                Some(name) => kwargs.push((name.as_str().to_string(), value)),
                None => args.push(value),
            }
        }

        Ok(Self {
            view_name,
            language,
            args,
            kwargs,
            as_var,
        })
    }

    pub fn render(&self, context: &mut TemplateContext, reverser: &I18nReverser) -> Result<String> {
        let as_var = self.as_var.is_some();
        let reference = RouteReference {
            name: self.view_name.resolve(context),
            args: self.args.iter().map(|arg| arg.resolve(context)).collect(),
            kwargs: self
                .kwargs
                .iter()
                .map(|(name, value)| (name.clone(), value.resolve(context)))
                .collect(),
        };

        let language = match language_of(&self.language, context, reverser) {
            Ok(Some(language)) => language,
            Ok(None) => reverser.table().registry().default_language(),
            Err(_) if as_var => return Ok(output(String::new(), &self.as_var, context)),
            Err(e) => return Err(e),
        };

        let url = reverser.reverse(&reference, &language, as_var)?;
        Ok(output(url, &self.as_var, context))
    }
}

/// Compiled `{% current_i18nurl %}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUrlTag {
    pub language: Expr,
    pub as_var: Option<String>,
}

impl CurrentUrlTag {
    pub fn parse(mut bits: Vec<String>) -> Result<Self> {
        let tag = bits.first().cloned().unwrap_or_else(|| CURRENT_URL_TAG.to_string());
        let as_var = take_as_var(&mut bits);
        if bits.len() != 2 {
            return Err(Error::syntax(format!("'{}' takes one argument (language)", tag)));
        }

        Ok(Self {
            language: Expr::parse(&bits[1])?,
            as_var,
        })
    }

    pub fn render(&self, context: &mut TemplateContext, reverser: &I18nReverser) -> Result<String> {
        let as_var = self.as_var.is_some();
        let language = match language_of(&self.language, context, reverser) {
            Ok(Some(language)) => language,
            Ok(None) => reverser.table().registry().default_language(),
            Err(_) if as_var => return Ok(output(String::new(), &self.as_var, context)),
            Err(e) => return Err(e),
        };

        let url = reverser.reverse_current(context.current_route(), &language, as_var)?;
        Ok(output(url, &self.as_var, context))
    }
}

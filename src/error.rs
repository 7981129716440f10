use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Errors produced by language resolution, URL reversal and template compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A route reference could not be turned into a path.
    #[error("Reverse for '{name}' not found: {reason}")]
    NoReverseMatch { name: String, reason: String },

    /// A template tag was invoked with the wrong shape. Raised at compile time.
    #[error("Template syntax error: {0}")]
    TemplateSyntax(String),

    #[error("Unknown language code: '{0}'")]
    UnknownLanguage(String),

    #[error("Unknown language resolution strategy: '{0}'")]
    UnknownStrategy(String),

    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl Error {
    pub(crate) fn no_reverse_match(name: &str, reason: impl Into<String>) -> Self {
        Error::NoReverseMatch {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Error::TemplateSyntax(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::UnknownLanguage(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!("Request failed ({}): {}", status, self);
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_reverse_match_message() {
        let err = Error::no_reverse_match("home", "no route with this name");
        assert_eq!(
            err.to_string(),
            "Reverse for 'home' not found: no route with this name"
        );
    }

    #[test]
    fn test_into_response_status() {
        let response = Error::UnknownLanguage("xx".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = Error::no_reverse_match("home", "missing").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_template_syntax_message() {
        let err = Error::syntax("Malformed arguments to url tag");
        assert!(err.to_string().contains("Malformed arguments"));
    }
}

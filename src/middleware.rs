//! Request language activator.
//!
//! Runs the resolver chain once per request, binds the result to the
//! request and to the Active Language for the span of the handler, then
//! stamps the response with `Content-Language` and `Vary: Accept-Language`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::i18n::context;
use crate::resolver::{RequestLanguage, RequestSignals, ResolverChain};

/// Middleware activating the request's language.
///
/// Install with `axum::middleware::from_fn_with_state(chain, activate_language)`.
pub async fn activate_language(
    State(chain): State<Arc<ResolverChain>>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    if parts.extensions.get::<RequestLanguage>().is_none() {
        let signals = RequestSignals::from_parts(&parts);
        if let Some(language) = chain.resolve(&signals) {
            parts.extensions.insert(RequestLanguage(language));
        }
    }

    let language = parts
        .extensions
        .get::<RequestLanguage>()
        .map(|RequestLanguage(language)| language.clone());
    let req = Request::from_parts(parts, body);
    let fallback = chain.registry().default_language();

    context::scope(async move {
        if let Some(language) = &language {
            debug!("Activating language '{}' for {}", language, req.uri().path());
            context::activate(language);
        }

        let mut response = next.run(req).await;

        patch_vary_headers(response.headers_mut(), header::ACCEPT_LANGUAGE.as_str());
        if !response.headers().contains_key(header::CONTENT_LANGUAGE) {
            let active = context::get_language().unwrap_or(fallback);
            match HeaderValue::from_str(active.code()) {
                Ok(value) => {
                    response.headers_mut().insert(header::CONTENT_LANGUAGE, value);
                }
                Err(e) => warn!("Cannot use '{}' as Content-Language: {}", active, e),
            }
        }

        context::deactivate();
        response
    })
    .await
}

/// Add `name` to the response's `Vary` header unless it is already covered.
pub fn patch_vary_headers(headers: &mut HeaderMap, name: &str) {
    let existing: Vec<String> = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|field| field.trim().to_string())
        .filter(|field| !field.is_empty())
        .collect();

    if existing
        .iter()
        .any(|field| field == "*" || field.eq_ignore_ascii_case(name))
    {
        return;
    }

    let mut fields = existing;
    fields.push(name.to_string());
    match HeaderValue::from_str(&fields.join(", ")) {
        Ok(value) => {
            headers.insert(header::VARY, value);
        }
        Err(e) => warn!("Cannot patch Vary header: {}", e),
    }
}

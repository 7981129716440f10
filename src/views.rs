//! Language endpoints and the demo project pages.

use std::collections::HashMap;

use axum::extract::{Extension, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::Form;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

use crate::app::AppState;
use crate::error::Result;
use crate::i18n::{context, Language};
use crate::principal::Principal;
use crate::resolver::RequestLanguage;
use crate::session::{Session, SESSION_LANGUAGE_KEY};
use crate::template::{escape_html, Template, TemplateContext};
use crate::urls::RouteReference;

const SET_LANGUAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ LANGUAGE_CODE }}">
<head><title>Language</title></head>
<body>
{{ error }}
<form method="post" action="{% i18nurl "set_language" LANGUAGE_CODE %}">
<select name="language">{{ language_options }}</select>
<input type="hidden" name="next" value="{{ next }}">
<label><input type="checkbox" name="temporary" value="true"> Only for this session</label>
<button type="submit">OK</button>
</form>
</body>
</html>
"#;

const HOME_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ LANGUAGE_CODE }}">
<body>
<h1>Home ({{ LANGUAGE_CODE }})</h1>
<a href="{% i18nurl "about" LANGUAGE_CODE %}">About</a>
<nav><a href="{% current_i18nurl "en" %}">en</a> <a href="{% current_i18nurl "fr" %}">fr</a></nav>
<a href="{% i18nurl "set_language" LANGUAGE_CODE %}">Language</a>
</body>
</html>
"#;

const ABOUT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ LANGUAGE_CODE }}">
<body>
<h1>About ({{ LANGUAGE_CODE }})</h1>
<a href="{% i18nurl "home" LANGUAGE_CODE %}">Home</a>
<nav><a href="{% current_i18nurl "en" %}">en</a> <a href="{% current_i18nurl "fr" %}">fr</a></nav>
</body>
</html>
"#;

const ARTICLE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ LANGUAGE_CODE }}">
<body>
<h1>{{ slug }}</h1>
{% i18nurl "article" "en" slug=slug as en_link %}{% i18nurl "article" "fr" slug=slug as fr_link %}
<nav><a href="{{ en_link }}">en</a> <a href="{{ fr_link }}">fr</a></nav>
</body>
</html>
"#;

/// Templates compiled once at startup.
#[derive(Debug, Clone)]
pub struct Templates {
    set_language: Template,
    pages: HashMap<String, Template>,
}

impl Templates {
    pub fn compile() -> Result<Self> {
        let pages = [
            ("demoproject.home", HOME_TEMPLATE),
            ("demoproject.about", ABOUT_TEMPLATE),
            ("demoproject.article", ARTICLE_TEMPLATE),
        ]
        .into_iter()
        .map(|(name, source)| Template::compile(source).map(|template| (name.to_string(), template)))
        .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self {
            set_language: Template::compile(SET_LANGUAGE_TEMPLATE)?,
            pages,
        })
    }

    pub fn page(&self, route_name: &str) -> Option<&Template> {
        self.pages.get(route_name)
    }
}

/// `302 Found`, the status of a plain temporary redirect.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn request_language(state: &AppState, bound: Option<Extension<RequestLanguage>>) -> Language {
    bound
        .map(|Extension(RequestLanguage(language))| language)
        .unwrap_or_else(|| state.registry().default_language())
}

/// Redirect to the configured landing route in the requester's language.
pub async fn guess_language(
    State(state): State<AppState>,
    bound: Option<Extension<RequestLanguage>>,
) -> Response {
    let language = request_language(&state, bound);
    let reference = RouteReference::new(state.config.redirect_url_name.clone());

    match state.reverser.reverse(&reference, &language, false) {
        Ok(url) => {
            info!("Guessed language '{}', redirecting to {}", language, url);
            found(&url)
        }
        Err(e) => e.into_response(),
    }
}

/// Submitted language selection.
#[derive(Debug, Default, Deserialize)]
pub struct LanguageSelection {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub next: String,
    #[serde(default, deserialize_with = "checkbox")]
    pub temporary: bool,
}

fn checkbox<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let value = String::deserialize(deserializer)?;
    Ok(matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "on" | "1" | "yes"
    ))
}

/// Only local absolute paths are followed after a language change.
fn is_safe_next(next: &str) -> bool {
    next.starts_with('/')
        && !next.starts_with("//")
        && !next.contains('\\')
        && !next.chars().any(char::is_control)
}

fn render_set_language(
    state: &AppState,
    language: &Language,
    next: &str,
    error: Option<&str>,
) -> Result<String> {
    let options: String = state
        .registry()
        .list()
        .iter()
        .map(|lang| {
            let selected = if lang.code == language.code() { " selected" } else { "" };
            format!(
                r#"<option value="{}"{}>{}</option>"#,
                escape_html(&lang.code),
                selected,
                escape_html(&lang.name)
            )
        })
        .collect();

    let mut context = TemplateContext::i18n(
        state.registry(),
        &state.config.redirect_url_name,
        language.code(),
    );
    context.set_safe("language_options", options);
    context.set("next", next);
    if let Some(error) = error {
        context.set("error", error);
    }
    state.templates.set_language.render(&mut context, &state.reverser)
}

/// Display the language selection form.
pub async fn set_language_form(
    State(state): State<AppState>,
    bound: Option<Extension<RequestLanguage>>,
) -> Response {
    let language = request_language(&state, bound);
    match render_set_language(&state, &language, "", None) {
        Ok(html) => Html(html).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Remember the selected language and redirect.
///
/// The profile is updated only when the choice is not temporary. The
/// session (or, without a session, a cookie) always receives it.
pub async fn set_language(
    State(state): State<AppState>,
    bound: Option<Extension<RequestLanguage>>,
    principal: Option<Extension<Principal>>,
    session: Option<Extension<Session>>,
    jar: CookieJar,
    Form(selection): Form<LanguageSelection>,
) -> Response {
    let language = match state.registry().language(&selection.language) {
        Ok(language) => language,
        Err(_) => {
            let current = request_language(&state, bound);
            let message = format!(
                "Select a valid choice. '{}' is not one of the available choices.",
                selection.language
            );
            return match render_set_language(&state, &current, &selection.next, Some(&message)) {
                Ok(html) => (StatusCode::BAD_REQUEST, Html(html)).into_response(),
                Err(e) => e.into_response(),
            };
        }
    };

    let redirect_url = if is_safe_next(&selection.next) {
        selection.next.clone()
    } else {
        let reference = RouteReference::new(state.config.redirect_url_name.clone());
        match state.reverser.reverse(&reference, &language, false) {
            Ok(url) => url,
            Err(e) => return e.into_response(),
        }
    };

    let remember = !selection.temporary;
    if remember {
        if let Some(Extension(principal)) = &principal {
            if principal.language_code.as_deref() != Some(language.code()) {
                match state.profiles.set_language(&principal.id, language.code()) {
                    Ok(()) => info!("Saved language '{}' for user {}", language, principal.id),
                    Err(e) => warn!("Failed to save language for user {}: {}", principal.id, e),
                }
            }
        }
    }

    let jar = match session {
        Some(Extension(session)) => {
            session.insert(SESSION_LANGUAGE_KEY, language.code());
            jar
        }
        None => jar.add(
            Cookie::build((
                state.config.language_cookie_name.clone(),
                language.code().to_string(),
            ))
            .path("/"),
        ),
    };

    (jar, found(&redirect_url)).into_response()
}

/// Demo project pages, routed through the URL table.
pub async fn page(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(current) = state.reverser.table().resolve(uri.path()) else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };
    let Some(template) = state.templates.page(&current.route_name) else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    let language = context::get_language().unwrap_or_else(|| state.registry().default_language());
    let kwargs = current.kwargs.clone();
    let mut page_context = TemplateContext::i18n(
        state.registry(),
        &state.config.redirect_url_name,
        language.code(),
    )
    .with_current_route(Some(current));
    for (name, value) in kwargs {
        page_context.set(name, value);
    }

    match template.render(&mut page_context, &state.reverser) {
        Ok(html) => Html(html).into_response(),
        Err(e) => e.into_response(),
    }
}

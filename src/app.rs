//! Application assembly: shared state, the demo URL table and the router.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use chrono::Duration;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::i18n::LanguageRegistry;
use crate::middleware::activate_language;
use crate::principal::{authenticate, ProfileStore};
use crate::resolver::ResolverChain;
use crate::reverse::I18nReverser;
use crate::session::{attach_session, SessionStore};
use crate::urls::{Route, UrlTable};
use crate::views::{self, Templates};

/// State shared by every handler. Everything but the stores is read-only.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub chain: Arc<ResolverChain>,
    pub reverser: Arc<I18nReverser>,
    pub templates: Arc<Templates>,
    pub profiles: Arc<dyn ProfileStore>,
    /// `None` when sessions are disabled; the language cookie is used instead.
    pub sessions: Option<SessionStore>,
}

impl AppState {
    pub fn new(config: Config, profiles: Arc<dyn ProfileStore>) -> Result<Self> {
        let registry = Arc::new(config.registry()?);
        let table = demo_url_table(Arc::clone(&registry)).context("Invalid demo routes")?;
        let chain = ResolverChain::new(
            Arc::clone(&registry),
            config.resolvers.clone(),
            config.language_cookie_name.clone(),
        );
        let reverser = I18nReverser::new(Arc::new(table), config.url_namespaces.clone());
        let templates = Templates::compile().context("Invalid templates")?;
        let sessions = config
            .sessions_enabled
            .then(|| {
                SessionStore::with_ttl(
                    config.session_cookie_name.clone(),
                    Duration::seconds(i64::from(config.session_ttl_secs)),
                )
            });

        Ok(Self {
            config: Arc::new(config),
            chain: Arc::new(chain),
            reverser: Arc::new(reverser),
            templates: Arc::new(templates),
            profiles,
            sessions,
        })
    }

    pub fn registry(&self) -> &LanguageRegistry {
        self.chain.registry()
    }
}

/// Routes of the demo project plus the language endpoints.
pub fn demo_url_table(registry: Arc<LanguageRegistry>) -> crate::error::Result<UrlTable> {
    let mut table = UrlTable::new(Arc::clone(&registry));
    table.add(Route::new("guess_language", "/")?)?;
    table.add(Route::new("set_language", "/i18n/")?)?;
    table.add(Route::new("demoproject.home", "/{language}/")?)?;

    let mut about = Route::new("demoproject.about", "/{language}/about/")?;
    if registry.get_by_code("fr").is_some() {
        about = about.translate("fr", "/{language}/a-propos/")?;
    }
    table.add(about)?;

    table.add(Route::new("demoproject.article", "/{language}/articles/{slug}/")?)?;
    Ok(table)
}

/// Build the router. Layers run outermost first: tracing, sessions,
/// authentication, then language activation.
pub fn router(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(views::guess_language))
        .route("/i18n/", get(views::set_language_form).post(views::set_language))
        .fallback(views::page)
        .with_state(state.clone())
        .layer(from_fn_with_state(Arc::clone(&state.chain), activate_language))
        .layer(from_fn_with_state(Arc::clone(&state.profiles), authenticate));

    let router = match state.sessions {
        Some(sessions) => router.layer(from_fn_with_state(sessions, attach_session)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

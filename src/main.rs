use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use i18n_url::app::{router, AppState};
use i18n_url::config::Config;
use i18n_url::principal::InMemoryProfileStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("i18n_url=info".parse()?)
        )
        .init();

    info!("Starting i18n-url demo server");

    // Load configuration from environment
    let config = Config::from_env()?;
    let port = config.port;
    info!(
        "Languages: {}",
        config
            .languages
            .iter()
            .map(|lang| lang.code.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    // Demo users: "alice" prefers French, "bob" has no preference
    let profiles = InMemoryProfileStore::new();
    profiles.insert("alice", Some("fr"));
    profiles.insert("bob", None);

    let state = AppState::new(config, Arc::new(profiles))?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

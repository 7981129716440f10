//! Authenticated principal and its stored language preference.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

/// Header carrying the user id in the demo application.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    /// Stored language preference, if the user picked one.
    pub language_code: Option<String>,
}

/// Persistence for user profiles.
pub trait ProfileStore: Debug + Send + Sync {
    fn find(&self, id: &str) -> Option<Principal>;

    fn set_language(&self, id: &str, code: &str) -> Result<()>;
}

/// Profile store backed by a map, used by the demo and the tests.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, Option<String>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with an optional language preference.
    pub fn insert(&self, id: impl Into<String>, language_code: Option<&str>) {
        self.write_profiles()
            .insert(id.into(), language_code.map(str::to_string));
    }

    fn read_profiles(&self) -> RwLockReadGuard<'_, HashMap<String, Option<String>>> {
        self.profiles.read().unwrap_or_else(|poisoned| {
            warn!("Profile store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_profiles(&self) -> RwLockWriteGuard<'_, HashMap<String, Option<String>>> {
        self.profiles.write().unwrap_or_else(|poisoned| {
            warn!("Profile store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn find(&self, id: &str) -> Option<Principal> {
        self.read_profiles().get(id).map(|language_code| Principal {
            id: id.to_string(),
            language_code: language_code.clone(),
        })
    }

    fn set_language(&self, id: &str, code: &str) -> Result<()> {
        let mut profiles = self.write_profiles();
        let entry = profiles
            .get_mut(id)
            .ok_or_else(|| anyhow!("unknown user '{}'", id))?;
        *entry = Some(code.to_string());
        Ok(())
    }
}

/// Middleware resolving the `X-User-Id` header into a [`Principal`] extension.
pub async fn authenticate(
    State(profiles): State<Arc<dyn ProfileStore>>,
    mut req: Request,
    next: Next,
) -> Response {
    let principal = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|id| profiles.find(id));

    if let Some(principal) = principal {
        debug!("Authenticated user {}", principal.id);
        req.extensions_mut().insert(principal);
    }

    next.run(req).await
}

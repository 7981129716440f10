//! Cookie-keyed, in-memory sessions.
//!
//! Every request gets a [`Session`] handle in its extensions. A session is
//! only stored (and its cookie only sent) once something is written to it.
//! Sessions idle for longer than the store's TTL are dropped.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Session key holding the selected language.
pub const SESSION_LANGUAGE_KEY: &str = "_language";

/// Idle time after which a session is forgotten.
pub const DEFAULT_SESSION_TTL_SECS: u32 = 14 * 24 * 60 * 60;

#[derive(Debug, Clone)]
struct SessionData {
    values: HashMap<String, String>,
    last_seen: DateTime<Utc>,
}

impl SessionData {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            values: HashMap::new(),
            last_seen: now,
        }
    }
}

/// Shared storage for all sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    cookie_name: String,
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
}

impl SessionStore {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self::with_ttl(cookie_name, Duration::seconds(i64::from(DEFAULT_SESSION_TTL_SECS)))
    }

    pub fn with_ttl(cookie_name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            ttl,
            sessions: Arc::default(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Handle for an existing, unexpired session id, or a fresh one.
    /// Opening an existing session marks it as used.
    pub fn open(&self, id: Option<&str>) -> Session {
        let now = Utc::now();
        let existing = id.filter(|id| {
            self.write(|sessions| {
                let Some(data) = sessions.get_mut(*id) else {
                    return false;
                };
                if !self.is_expired(data, now) {
                    data.last_seen = now;
                    return true;
                }
                debug!("Session {} expired", id);
                sessions.remove(*id);
                false
            })
        });

        match existing {
            Some(id) => Session {
                id: id.to_string(),
                is_new: false,
                store: self.clone(),
            },
            None => Session {
                id: Uuid::new_v4().to_string(),
                is_new: true,
                store: self.clone(),
            },
        }
    }

    pub fn exists(&self, id: &str) -> bool {
        let now = Utc::now();
        self.read(|sessions| {
            sessions
                .get(id)
                .is_some_and(|data| !self.is_expired(data, now))
        })
    }

    /// Number of stored sessions, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.read(HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every session idle for longer than the TTL. Returns how many
    /// were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let removed = self.write(|sessions| {
            let before = sessions.len();
            sessions.retain(|_, data| !self.is_expired(data, now));
            before - sessions.len()
        });
        if removed > 0 {
            debug!("Purged {} expired session(s)", removed);
        }
        removed
    }

    fn is_expired(&self, data: &SessionData, now: DateTime<Utc>) -> bool {
        now - data.last_seen > self.ttl
    }

    fn read<R>(&self, f: impl FnOnce(&HashMap<String, SessionData>) -> R) -> R {
        let sessions = self.sessions.read().unwrap_or_else(|poisoned| {
            warn!("Session store lock poisoned, recovering");
            poisoned.into_inner()
        });
        f(&sessions)
    }

    fn write<R>(&self, f: impl FnOnce(&mut HashMap<String, SessionData>) -> R) -> R {
        let mut sessions = self.sessions.write().unwrap_or_else(|poisoned| {
            warn!("Session store lock poisoned, recovering");
            poisoned.into_inner()
        });
        f(&mut sessions)
    }
}

/// A request's view of its session.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    is_new: bool,
    store: SessionStore,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.store.read(|sessions| {
            sessions
                .get(&self.id)
                .and_then(|data| data.values.get(key).cloned())
        })
    }

    /// Store a value. The first write to a new session also evicts expired
    /// sessions, so the store cannot grow without bound.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        let now = Utc::now();
        if self.is_new && !self.store.exists(&self.id) {
            self.store.purge_expired_at(now);
        }
        self.store.write(|sessions| {
            let data = sessions
                .entry(self.id.clone())
                .or_insert_with(|| SessionData::new(now));
            data.last_seen = now;
            data.values.insert(key, value);
        });
    }

    /// True once a new session has been written and needs its cookie sent.
    fn needs_cookie(&self) -> bool {
        self.is_new && self.store.exists(&self.id)
    }
}

/// Middleware attaching a [`Session`] to every request.
pub async fn attach_session(
    State(store): State<SessionStore>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let id = jar.get(store.cookie_name()).map(|cookie| cookie.value().to_string());
    let session = store.open(id.as_deref());
    req.extensions_mut().insert(session.clone());

    let response = next.run(req).await;

    if session.needs_cookie() {
        debug!("Created session {}", session.id());
        let cookie = Cookie::build((store.cookie_name().to_string(), session.id().to_string()))
            .path("/")
            .http_only(true);
        (jar.add(cookie), response).into_response()
    } else {
        response
    }
}

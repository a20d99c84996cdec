//! Server-side sessions keyed by the `sessionid` cookie.
//!
//! Session data lives in a concurrent in-memory map. The [`session_layer`]
//! middleware resolves the cookie into a [`Session`] handle before the handler
//! runs and writes a `Set-Cookie` afterwards when the handle changed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use banquet_core::User;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sessionid";

/// Expired entries are swept at most this often.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Lifetime of a session that only carries flash messages.
pub const ANONYMOUS_TTL: Duration = Duration::from_secs(60 * 60);

/// Upper bound on stored sessions before anonymous ones are evicted.
pub const MAX_SESSIONS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

impl FlashLevel {
    pub fn css_class(&self) -> &'static str {
        match self {
            FlashLevel::Success => "flash-success",
            FlashLevel::Info => "flash-info",
            FlashLevel::Error => "flash-error",
        }
    }
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// The signed-in account as remembered by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub display_name: String,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name(),
        }
    }
}

#[derive(Debug, Clone)]
struct SessionData {
    user: Option<SessionUser>,
    flashes: Vec<Flash>,
    expires_at: Instant,
}

/// Signed-in sessions live for `ttl`; anonymous ones for the shorter
/// `anonymous_ttl`. Once `max_sessions` entries are stored, new anonymous
/// entries first push out expired and then other anonymous entries.
pub struct SessionStore {
    sessions: DashMap<String, SessionData>,
    ttl: Duration,
    anonymous_ttl: Duration,
    max_sessions: usize,
    last_cleanup: Mutex<Instant>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_limits(ttl, ANONYMOUS_TTL, MAX_SESSIONS)
    }

    pub fn with_limits(ttl: Duration, anonymous_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            anonymous_ttl: anonymous_ttl.min(ttl),
            max_sessions,
            last_cleanup: Mutex::new(Instant::now()),
        }
    }

    fn lifetime(&self, data: &SessionData) -> Duration {
        if data.user.is_some() {
            self.ttl
        } else {
            self.anonymous_ttl
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn new_id() -> String {
        format!("sess_{}", uuid::Uuid::new_v4().simple())
    }

    fn contains(&self, id: &str) -> bool {
        self.sessions
            .get(id)
            .map_or(false, |data| data.expires_at > Instant::now())
    }

    fn user(&self, id: &str) -> Option<SessionUser> {
        let data = self.sessions.get(id)?;
        if data.expires_at <= Instant::now() {
            return None;
        }
        data.user.clone()
    }

    /// Seconds until the live entry for `id` expires.
    fn max_age(&self, id: &str) -> Option<u64> {
        let data = self.sessions.get(id)?;
        let remaining = data.expires_at.checked_duration_since(Instant::now())?;
        (!remaining.is_zero()).then(|| remaining.as_secs())
    }

    /// Mutate (creating if needed) the entry for `id` and push its expiry forward.
    fn update<F: FnOnce(&mut SessionData)>(&self, id: &str, f: F) {
        let now = Instant::now();
        if !self.sessions.contains_key(id) && self.sessions.len() >= self.max_sessions {
            self.make_room(now);
        }
        let mut entry = self.sessions.entry(id.to_string()).or_insert_with(|| SessionData {
            user: None,
            flashes: Vec::new(),
            expires_at: now,
        });
        if entry.expires_at <= now {
            entry.user = None;
            entry.flashes.clear();
        }
        f(entry.value_mut());
        let lifetime = self.lifetime(entry.value());
        entry.expires_at = now + lifetime;
    }

    /// Drop expired entries, then anonymous ones if the store is still full.
    fn make_room(&self, now: Instant) {
        self.sessions.retain(|_, data| data.expires_at > now);
        if self.sessions.len() >= self.max_sessions {
            let before = self.sessions.len();
            self.sessions.retain(|_, data| data.user.is_some());
            warn!(
                "Session store full; evicted {} anonymous sessions",
                before.saturating_sub(self.sessions.len())
            );
        }
    }

    fn take_flashes(&self, id: &str) -> Vec<Flash> {
        match self.sessions.get_mut(id) {
            Some(mut data) if data.expires_at > Instant::now() => std::mem::take(&mut data.flashes),
            _ => Vec::new(),
        }
    }

    fn remove(&self, id: &str) -> Option<SessionData> {
        self.sessions.remove(id).map(|(_, data)| data)
    }

    /// Drop expired sessions, at most once per [`CLEANUP_INTERVAL`].
    pub fn maybe_cleanup(&self) {
        let now = Instant::now();
        {
            let mut last = match self.last_cleanup.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if now.duration_since(*last) < CLEANUP_INTERVAL {
                return;
            }
            *last = now;
        }
        let before = self.sessions.len();
        self.sessions.retain(|_, data| data.expires_at > now);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            debug!("Removed {} expired sessions", removed);
        }
    }
}

struct SessionInner {
    store: Arc<SessionStore>,
    id: Mutex<String>,
    dirty: AtomicBool,
}

/// Per-request handle onto the visitor's session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    fn new(store: Arc<SessionStore>, id: String) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                store,
                id: Mutex::new(id),
                dirty: AtomicBool::new(false),
            }),
        }
    }

    fn id(&self) -> String {
        match self.inner.id.lock() {
            Ok(id) => id.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace_id(&self, new_id: String) -> String {
        let mut id = match self.inner.id.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *id, new_id)
    }

    fn touch(&self) {
        self.inner.dirty.store(true, Ordering::SeqCst);
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.inner.store.user(&self.id())
    }

    /// Attach `user` under a fresh session id, keeping pending flashes.
    pub fn login(&self, user: &User) {
        let store = &self.inner.store;
        let old_id = self.replace_id(SessionStore::new_id());
        let pending = store.remove(&old_id).map(|data| data.flashes).unwrap_or_default();
        let session_user = SessionUser::from(user);
        store.update(&self.id(), move |data| {
            data.user = Some(session_user);
            data.flashes = pending;
        });
        self.touch();
    }

    /// Forget everything and continue under a fresh, empty session id.
    pub fn logout(&self) {
        let old_id = self.replace_id(SessionStore::new_id());
        self.inner.store.remove(&old_id);
        self.touch();
    }

    pub fn flash(&self, level: FlashLevel, message: impl Into<String>) {
        let flash = Flash {
            level,
            message: message.into(),
        };
        self.inner.store.update(&self.id(), move |data| data.flashes.push(flash));
        self.touch();
    }

    pub fn take_flashes(&self) -> Vec<Flash> {
        self.inner.store.take_flashes(&self.id())
    }

    /// Cookie to send back, if this request changed the session.
    fn set_cookie(&self, secure: bool) -> Option<HeaderValue> {
        if !self.inner.dirty.load(Ordering::SeqCst) {
            return None;
        }
        let id = self.id();
        let mut cookie = match self.inner.store.max_age(&id) {
            Some(max_age) => format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"),
            None => format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
        };
        if secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).ok()
    }
}

/// Value of the `sessionid` cookie, if the request carries one.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolve the session before the handler and emit `Set-Cookie` after it.
pub async fn session_layer(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    state.sessions.maybe_cleanup();

    let id = session_id_from_headers(req.headers())
        .filter(|id| state.sessions.contains(id))
        .unwrap_or_else(SessionStore::new_id);
    let session = Session::new(state.sessions.clone(), id);
    req.extensions_mut().insert(session.clone());

    let mut response = next.run(req).await;
    if let Some(cookie) = session.set_cookie(state.config.is_production()) {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Session layer is not installed"))
    }
}

/// A signed-in visitor. Anonymous requests are redirected to the login page
/// with a `next` parameter pointing back at the requested path.
pub struct RequireUser {
    pub user: SessionUser,
    pub session: Session,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        match session.user() {
            Some(user) => Ok(Self { user, session }),
            None => {
                let path = parts.uri.path();
                debug!("Anonymous request to {} redirected to login", path);
                Err(Redirect::to(&format!("/login?next={path}")).into_response())
            }
        }
    }
}

//! Server-side sessions. The cookie carries only an opaque random token;
//! user id, anti-forgery token and pending flash messages live in an
//! in-process store keyed by that token.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::extract::{FromRequestParts, Request, State};
use axum::http::{HeaderValue, header, request::Parts};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use subtle::ConstantTimeEq;
use tracing::error;
use uuid::Uuid;
use wren_types::User;

use crate::{AppState, view};

pub const SESSION_COOKIE: &str = "wren_session";

/// Sessions idle longer than this are dropped, so the store stays bounded
/// by active traffic instead of growing with every cookieless request.
const SESSION_IDLE: Duration = Duration::from_secs(60 * 60 * 24 * 7);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Success,
    Danger,
}

impl FlashLevel {
    pub fn css_class(self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

#[derive(Debug)]
struct Session {
    user_id: Option<i64>,
    csrf_token: String,
    flashes: Vec<Flash>,
    last_seen: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            user_id: None,
            csrf_token: Uuid::new_v4().to_string(),
            flashes: Vec::new(),
            last_seen: Instant::now(),
        }
    }
}

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a cookie value to a live session, creating a fresh one when
    /// the token is missing or unknown. Returns the token and whether a new
    /// session was created (so the middleware knows to set the cookie).
    fn resolve(&self, token: Option<&str>) -> (String, bool) {
        let mut map = self.lock_map();
        if let Some(token) = token {
            if let Some(session) = map.get_mut(token) {
                session.last_seen = Instant::now();
                return (token.to_string(), false);
            }
        }
        prune_idle(&mut map, Instant::now());
        let token = Uuid::new_v4().to_string();
        map.insert(token.clone(), Session::new());
        (token, true)
    }

    fn lock_map(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn prune_idle(map: &mut HashMap<String, Session>, now: Instant) {
    map.retain(|_, session| now.saturating_duration_since(session.last_seen) < SESSION_IDLE);
}

/// Per-request handle on one session. Cheap to clone; handlers use it to
/// read the login state, verify the anti-forgery token and queue flashes.
#[derive(Clone)]
pub struct SessionContext {
    store: SessionStore,
    token: String,
}

impl SessionContext {
    pub fn new(store: SessionStore, token: String) -> Self {
        Self { store, token }
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        let mut map = self.store.lock_map();
        let session = map.entry(self.token.clone()).or_insert_with(Session::new);
        f(session)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.with_session(|s| s.user_id)
    }

    pub fn login(&self, user_id: i64) {
        self.with_session(|s| s.user_id = Some(user_id));
    }

    pub fn logout(&self) {
        self.with_session(|s| s.user_id = None);
    }

    pub fn csrf_token(&self) -> String {
        self.with_session(|s| s.csrf_token.clone())
    }

    /// A missing or mismatched anti-forgery token is treated exactly like a
    /// missing login. Comparison is constant-time over the token bytes.
    pub fn verify_csrf(&self, token: &str) -> bool {
        !token.is_empty()
            && self.with_session(|s| bool::from(s.csrf_token.as_bytes().ct_eq(token.as_bytes())))
    }

    pub fn flash(&self, level: FlashLevel, message: impl Into<String>) {
        let message = message.into();
        self.with_session(|s| s.flashes.push(Flash { level, message }));
    }

    /// Drains pending flash messages; they render once and are gone.
    pub fn take_flashes(&self) -> Vec<Flash> {
        self.with_session(|s| std::mem::take(&mut s.flashes))
    }
}

/// Current user resolved from the session, present on every request.
/// `None` means anonymous.
#[derive(Clone)]
pub struct CurrentUser(pub Option<User>);

pub async fn load_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let cookie_token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let (token, created) = state.sessions.resolve(cookie_token.as_deref());
    let ctx = SessionContext::new(state.sessions.clone(), token.clone());

    let user = match ctx.user_id() {
        Some(id) => match state.db.get_user_by_id(id) {
            Ok(Some(row)) => Some(view::user_from_row(row)),
            Ok(None) => {
                // stale id, e.g. the account was deleted
                ctx.logout();
                None
            }
            Err(e) => {
                error!("session user lookup failed: {e}");
                None
            }
        },
        None => None,
    };

    req.extensions_mut().insert(ctx);
    req.extensions_mut().insert(CurrentUser(user));

    let mut res = next.run(req).await;

    if created {
        let cookie = Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            res.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    res
}

/// Extractor for handlers that require a logged-in user. Anonymous requests
/// get the uniform "Access unauthorized." flash and a redirect home.
pub struct AuthedUser(pub User);

impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(CurrentUser(Some(user))) = parts.extensions.get::<CurrentUser>() {
            return Ok(AuthedUser(user.clone()));
        }
        if let Some(ctx) = parts.extensions.get::<SessionContext>() {
            ctx.flash(FlashLevel::Danger, "Access unauthorized.");
        }
        Err(Redirect::to("/"))
    }
}

/// Uniform rejection for a failed anti-forgery check, indistinguishable
/// from a missing login.
pub fn access_denied(ctx: &SessionContext) -> Response {
    ctx.flash(FlashLevel::Danger, "Access unauthorized.");
    Redirect::to("/").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(store: &SessionStore) -> SessionContext {
        let (token, created) = store.resolve(None);
        assert!(created);
        SessionContext::new(store.clone(), token)
    }

    #[test]
    fn resolve_reuses_known_tokens() {
        let store = SessionStore::new();
        let (token, created) = store.resolve(None);
        assert!(created);

        let (again, created) = store.resolve(Some(&token));
        assert!(!created);
        assert_eq!(again, token);

        let (fresh, created) = store.resolve(Some("not-a-session"));
        assert!(created);
        assert_ne!(fresh, token);
    }

    #[test]
    fn login_logout_roundtrip() {
        let store = SessionStore::new();
        let ctx = ctx(&store);

        assert_eq!(ctx.user_id(), None);
        ctx.login(7);
        assert_eq!(ctx.user_id(), Some(7));
        ctx.logout();
        assert_eq!(ctx.user_id(), None);
    }

    #[test]
    fn csrf_token_must_match() {
        let store = SessionStore::new();
        let ctx = ctx(&store);

        let token = ctx.csrf_token();
        assert!(ctx.verify_csrf(&token));
        assert!(!ctx.verify_csrf("wrong"));
        assert!(!ctx.verify_csrf(""));
    }

    #[test]
    fn idle_sessions_are_pruned() {
        let store = SessionStore::new();
        let (stale, _) = store.resolve(None);
        let (fresh, _) = store.resolve(None);

        let later = Instant::now() + SESSION_IDLE + Duration::from_secs(1);
        {
            let mut map = store.lock_map();
            map.get_mut(&fresh).unwrap().last_seen = later;
            prune_idle(&mut map, later);
        }

        let map = store.lock_map();
        assert!(!map.contains_key(&stale));
        assert!(map.contains_key(&fresh));
    }

    #[test]
    fn resolving_a_session_keeps_it_alive() {
        let store = SessionStore::new();
        let (token, _) = store.resolve(None);
        let before = store.lock_map().get(&token).unwrap().last_seen;

        let (_, created) = store.resolve(Some(&token));
        assert!(!created);
        assert!(store.lock_map().get(&token).unwrap().last_seen >= before);
    }

    #[test]
    fn flashes_drain_once() {
        let store = SessionStore::new();
        let ctx = ctx(&store);

        ctx.flash(FlashLevel::Danger, "Access unauthorized.");
        ctx.flash(FlashLevel::Success, "Hello!");

        let flashes = ctx.take_flashes();
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].message, "Access unauthorized.");
        assert!(ctx.take_flashes().is_empty());
    }
}

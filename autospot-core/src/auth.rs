//! The session holder.
//!
//! [`AuthContext`] is created once at startup and passed by reference to
//! everything that needs the current identity. It owns the backend handle,
//! keeps the current session and the derived privileged flag, persists the
//! session through a [`SessionStore`], and notifies [`SessionListener`]s of
//! every change.

use crate::backend::{decode_rows, first_row, Backend, SignUpOutcome};
use crate::error::{Error, Result};
use crate::models::{Profile, Session, User, UserMetadata};
use crate::query::Query;
use crate::session_store::{SessionStore, SESSION_KEY};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::{info, warn};

/// Tokens closer than this to expiry are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

pub const DEFAULT_AVATAR_URL: &str = "https://cdn-icons-png.flaticon.com/512/149/149071.png";

// ── Events ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

impl AuthEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthEvent::InitialSession => "INITIAL_SESSION",
            AuthEvent::SignedIn => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed => "TOKEN_REFRESHED",
        }
    }
}

/// What observers see after each change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    pub is_admin: bool,
    pub is_loading: bool,
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self {
            session: None,
            is_admin: false,
            is_loading: true,
        }
    }
}

impl AuthSnapshot {
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }
}

pub trait SessionListener: Send + Sync + 'static {
    fn on_auth_change(&self, event: AuthEvent, snapshot: &AuthSnapshot);
}

impl<F> SessionListener for F
where
    F: Fn(AuthEvent, &AuthSnapshot) + Send + Sync + 'static,
{
    fn on_auth_change(&self, event: AuthEvent, snapshot: &AuthSnapshot) {
        self(event, snapshot)
    }
}

type ListenerList = Mutex<Vec<(u64, Arc<dyn SessionListener>)>>;

/// Keeps a listener attached; dropping it detaches the listener.
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerList>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        if let Ok(mut guard) = listeners.lock() {
            guard.retain(|(id, _)| *id != self.id);
        };
    }
}

// ── Context ──────────────────────────────────────────────────────────────────

pub struct AuthContext {
    backend: Arc<dyn Backend>,
    store: Arc<dyn SessionStore>,
    state: RwLock<AuthSnapshot>,
    listeners: Arc<ListenerList>,
    next_listener_id: AtomicU64,
}

impl AuthContext {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            backend,
            store,
            state: RwLock::new(AuthSnapshot::default()),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicU64::new(1),
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Loads the persisted session once, refreshing it when it is about to
    /// expire, and publishes it as the initial session.
    pub fn initialize(&self) {
        let stored = match self.store.get_item(SESSION_KEY) {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "could not read persisted session");
                None
            }
        };

        let session = stored.and_then(|raw| match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(error = %err, "discarding unreadable persisted session");
                None
            }
        });

        let session = match session {
            Some(session) if session.expires_within(Utc::now(), REFRESH_MARGIN_SECS) => {
                match self.backend.refresh_session(&session.refresh_token) {
                    Ok(fresh) => Some(fresh),
                    Err(err) => {
                        warn!(error = %err, "persisted session could not be refreshed");
                        None
                    }
                }
            }
            other => other,
        };

        self.apply(AuthEvent::InitialSession, session);
    }

    pub fn subscribe(&self, listener: impl SessionListener) -> Subscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = self.listeners.lock() {
            guard.push((id, Arc::new(listener)));
        }
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.snapshot().session
    }

    pub fn user(&self) -> Option<User> {
        self.session().map(|s| s.user)
    }

    pub fn is_admin(&self) -> bool {
        self.snapshot().is_admin
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot().is_loading
    }

    pub fn require_user(&self) -> Result<User> {
        self.user().ok_or(Error::NotAuthenticated)
    }

    pub fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(Error::validation("email and password are required"));
        }
        let session = self.backend.sign_in_with_password(email, password)?;
        self.apply(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    /// Creates the account with `full_name` in its metadata. When the backend
    /// signs the user in immediately the client record is created right away.
    pub fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<SignUpOutcome> {
        let email = email.trim();
        let full_name = full_name.trim();
        if email.is_empty() || password.is_empty() || full_name.is_empty() {
            return Err(Error::validation("email, password and full name are required"));
        }

        let metadata = UserMetadata {
            full_name: Some(full_name.to_string()),
            avatar_url: Some(DEFAULT_AVATAR_URL.to_string()),
        };
        let outcome = self.backend.sign_up(email, password, &metadata)?;

        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.apply(AuthEvent::SignedIn, Some(session.clone()));
            if let Err(err) = crate::clients::ensure_client(self) {
                warn!(error = %err, "client record not created at sign-up");
            }
        }
        Ok(outcome)
    }

    /// Clears the local session even when the backend call fails; the
    /// backend error is still returned.
    pub fn sign_out(&self) -> Result<()> {
        let result = match self.session() {
            Some(session) => self.backend.sign_out(&session.access_token),
            None => Ok(()),
        };
        self.apply(AuthEvent::SignedOut, None);
        result
    }

    pub fn refresh_session(&self) -> Result<Session> {
        let current = self.session().ok_or(Error::NotAuthenticated)?;
        let fresh = self.backend.refresh_session(&current.refresh_token)?;
        self.apply(AuthEvent::TokenRefreshed, Some(fresh.clone()));
        Ok(fresh)
    }

    /// The access token for data requests, refreshed first when it is close
    /// to expiry. `None` when signed out.
    pub fn access_token(&self) -> Result<Option<String>> {
        match self.session() {
            Some(session) if session.expires_within(Utc::now(), REFRESH_MARGIN_SECS) => {
                Ok(Some(self.refresh_session()?.access_token))
            }
            Some(session) => Ok(Some(session.access_token)),
            None => Ok(None),
        }
    }

    // ── Data helpers ─────────────────────────────────────────────────────────

    pub fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>> {
        let token = self.access_token()?;
        decode_rows(self.backend.select(query, token.as_deref())?)
    }

    pub fn insert_one<T: DeserializeOwned>(&self, table: &str, row: &impl Serialize) -> Result<T> {
        let token = self.access_token()?;
        let rows = self
            .backend
            .insert(table, serde_json::to_value(row)?, token.as_deref())?;
        first_row(rows)?.ok_or_else(|| Error::NotFound {
            entity: "inserted row",
            id: table.to_string(),
        })
    }

    pub fn update<T: DeserializeOwned>(&self, query: &Query, patch: &impl Serialize) -> Result<Vec<T>> {
        let token = self.access_token()?;
        decode_rows(
            self.backend
                .update(query, serde_json::to_value(patch)?, token.as_deref())?,
        )
    }

    // ── State changes ────────────────────────────────────────────────────────

    fn apply(&self, event: AuthEvent, session: Option<Session>) {
        self.persist(session.as_ref());
        let is_admin = self.lookup_is_admin(session.as_ref());

        let snapshot = AuthSnapshot {
            session,
            is_admin,
            is_loading: false,
        };
        {
            let mut state = self
                .state
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *state = snapshot.clone();
        }

        info!(
            event = event.as_str(),
            user = snapshot.user().map(|u| u.id.as_str()).unwrap_or("-"),
            is_admin,
            "auth state changed"
        );

        let listeners: Vec<Arc<dyn SessionListener>> = match self.listeners.lock() {
            Ok(guard) => guard.iter().map(|(_, l)| Arc::clone(l)).collect(),
            Err(_) => Vec::new(),
        };
        for listener in listeners {
            listener.on_auth_change(event, &snapshot);
        }
    }

    fn persist(&self, session: Option<&Session>) {
        let result = match session {
            Some(session) => serde_json::to_string(session)
                .map_err(Error::from)
                .and_then(|raw| self.store.set_item(SESSION_KEY, &raw)),
            None => self.store.remove_item(SESSION_KEY),
        };
        if let Err(err) = result {
            warn!(error = %err, "could not persist session");
        }
    }

    fn lookup_is_admin(&self, session: Option<&Session>) -> bool {
        let Some(session) = session else {
            return false;
        };
        let query = Query::from("profiles")
            .select("id, role")
            .eq("id", session.user.id.as_str())
            .limit(1);

        let rows = self
            .backend
            .select(&query, Some(&session.access_token))
            .and_then(first_row::<Profile>);
        match rows {
            Ok(Some(row)) => row.role.is_privileged(),
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "role lookup failed");
                false
            }
        }
    }
}

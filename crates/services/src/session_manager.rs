//! Session and auth-token lifecycle over the two storage scopes.
//!
//! Storage failures never escape this module: a store that cannot be read
//! reads as "no session", and a failed write is logged and skipped.

use course_core::Clock;
use course_core::model::{AuthToken, Role, SessionId, TokenClaims, UserId, is_token_expired};
use storage::keys::{AUTH_KEYS, AUTH_TOKEN, REFRESH_TOKEN, SESSION_ID, USER_ID};
use storage::repository::{KeyValueStore, Storage};
use tokio::sync::broadcast;

use crate::api::LoginResponse;

const EVENT_CAPACITY: usize = 32;

/// Session changes published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A fresh tab session id was issued.
    Created(SessionId),
    LoggedIn { user_id: Option<UserId> },
    LoggedOut,
    /// A 401 forced a logout; the UI should navigate to `route`.
    LoginRequired { route: String },
}

/// Owns the auth token, refresh token, user id and tab session id.
#[derive(Clone)]
pub struct SessionManager {
    storage: Storage,
    clock: Clock,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    #[must_use]
    pub fn new(storage: Storage, clock: Clock) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            clock,
            events,
        }
    }

    /// Share an event channel with other managers over the same persistent
    /// scope, so a logout in one instance is seen by all of them.
    #[must_use]
    pub fn with_events(mut self, events: broadcast::Sender<SessionEvent>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn events(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    //
    // ─── TAB SESSION ──────────────────────────────────────────────────────────
    //

    /// Reuse the tab session id if one exists, otherwise issue one.
    ///
    /// Returns `None` when the tab scope is unavailable.
    pub async fn register_tab(&self) -> Option<SessionId> {
        if let Some(existing) = read(self.storage.tab.as_ref(), SESSION_ID).await {
            return Some(SessionId::from_stored(existing));
        }
        let id = SessionId::generate(&self.clock);
        if write(self.storage.tab.as_ref(), SESSION_ID, id.as_str()).await {
            tracing::debug!(session_id = %id, "registered tab session");
            Some(id)
        } else {
            None
        }
    }

    /// Always issue a fresh tab session id and announce it.
    pub async fn create_session(&self) -> Option<SessionId> {
        let id = SessionId::generate(&self.clock);
        if !write(self.storage.tab.as_ref(), SESSION_ID, id.as_str()).await {
            return None;
        }
        tracing::debug!(session_id = %id, "created session");
        self.publish(SessionEvent::Created(id.clone()));
        Some(id)
    }

    pub async fn session_id(&self) -> Option<SessionId> {
        read(self.storage.tab.as_ref(), SESSION_ID)
            .await
            .map(SessionId::from_stored)
    }

    //
    // ─── AUTH ─────────────────────────────────────────────────────────────────
    //

    /// Persist the credentials from a successful login and start a new session.
    pub async fn store_login(&self, login: &LoginResponse) {
        let persistent = self.storage.persistent.as_ref();
        write(persistent, AUTH_TOKEN, &login.token).await;
        match &login.refresh_token {
            Some(refresh) => {
                write(persistent, REFRESH_TOKEN, refresh).await;
            }
            None => remove(persistent, REFRESH_TOKEN).await,
        }

        let user_id = login.user_id.or_else(|| {
            TokenClaims::decode(&login.token)
                .ok()
                .and_then(|claims| claims.uid)
        });
        match user_id {
            Some(id) => {
                write(persistent, USER_ID, &id.to_string()).await;
            }
            None => remove(persistent, USER_ID).await,
        }

        self.create_session().await;
        tracing::info!(user_id = ?user_id, "logged in");
        self.publish(SessionEvent::LoggedIn { user_id });
    }

    pub async fn token(&self) -> Option<AuthToken> {
        read(self.storage.persistent.as_ref(), AUTH_TOKEN)
            .await
            .filter(|raw| !raw.trim().is_empty())
            .map(AuthToken::new)
    }

    pub async fn refresh_token(&self) -> Option<String> {
        read(self.storage.persistent.as_ref(), REFRESH_TOKEN).await
    }

    pub async fn user_id(&self) -> Option<UserId> {
        let raw = read(self.storage.persistent.as_ref(), USER_ID).await?;
        match raw.parse() {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(error = %err, "stored user id is not a number");
                None
            }
        }
    }

    /// Role claim of the stored token.
    pub async fn role(&self) -> Option<Role> {
        self.token().await?.claims().ok()?.role()
    }

    /// Expiry check against this manager's clock; undecodable tokens are expired.
    #[must_use]
    pub fn is_token_expired(&self, token: &str) -> bool {
        is_token_expired(token, self.clock.now())
    }

    /// A token is stored and has not expired.
    pub async fn is_authenticated(&self) -> bool {
        match self.token().await {
            Some(token) => !self.is_token_expired(token.as_str()),
            None => false,
        }
    }

    /// Drop the stored credentials and the tab session, then announce it.
    pub async fn logout(&self) {
        for key in AUTH_KEYS {
            remove(self.storage.persistent.as_ref(), key).await;
        }
        if let Err(err) = self.storage.tab.clear().await {
            tracing::warn!(error = %err, "failed to clear tab storage");
        }
        tracing::info!("logged out");
        self.publish(SessionEvent::LoggedOut);
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

async fn read(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get(key).await {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(key, error = %err, "storage read failed");
            None
        }
    }
}

async fn write(store: &dyn KeyValueStore, key: &str, value: &str) -> bool {
    match store.set(key, value).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(key, error = %err, "storage write failed");
            false
        }
    }
}

async fn remove(store: &dyn KeyValueStore, key: &str) {
    if let Err(err) = store.remove(key).await {
        tracing::warn!(key, error = %err, "storage remove failed");
    }
}

//! Session Management
//!
//! Two pieces:
//! - [`SessionContext`]: the single owner of the current session. Holds the
//!   in-memory state, persists it, and broadcasts status changes.
//! - [`SessionStore`]: the login/validate/logout flows on top of the
//!   gateway API.
//!
//! Clearing is always total: token, user and expiry leave storage together.

mod storage;

pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::client::{ApiError, GatewayApi};
use smsgate_shared::{ErrorBody, LoginForm, Session, SessionUser, ValidationError};

pub const TOKEN_KEY: &str = "smsgate_token";
pub const USER_KEY: &str = "smsgate_user";
pub const EXPIRY_KEY: &str = "smsgate_token_expiry";

const SESSION_KEYS: [&str; 3] = [TOKEN_KEY, USER_KEY, EXPIRY_KEY];

// Keeps the computed expiry representable whatever the auth service sends
const MAX_TOKEN_LIFETIME_SECS: u64 = 365 * 24 * 3600;

// =============================================================================
// Session Context
// =============================================================================

/// Observable authentication status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Anonymous,
    Authenticating,
    Authenticated,
}

/// Why a session was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    LoggedOut,
    Expired,
    Unauthorized,
    ValidationFailed,
    Corrupt,
}

/// Broadcast on every status transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub status: AuthStatus,
    pub reason: Option<ClearReason>,
}

enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated(Session),
}

struct ContextInner {
    state: RwLock<SessionState>,
    storage: Arc<dyn KeyValueStorage>,
    events: watch::Sender<AuthEvent>,
}

/// Shared handle on the current session
///
/// Cloning is cheap; all clones see the same state.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<ContextInner>,
}

impl SessionContext {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        let (events, _) = watch::channel(AuthEvent {
            status: AuthStatus::Anonymous,
            reason: None,
        });
        Self {
            inner: Arc::new(ContextInner {
                state: RwLock::new(SessionState::Anonymous),
                storage,
                events,
            }),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Load the persisted session
    ///
    /// Returns the candidate session and moves to `Authenticating`; the
    /// caller confirms it with [`SessionContext::restore`] once the auth
    /// service accepts the token. Expired or unreadable records are cleared.
    pub async fn init(&self) -> Option<Session> {
        match self.load_persisted() {
            Ok(Some(session)) if !session.is_expired() => {
                debug!("Found persisted session for {}", session.user.username);
                self.set_state(SessionState::Authenticating, None).await;
                Some(session)
            }
            Ok(Some(_)) => {
                info!("Persisted session has expired");
                self.clear(ClearReason::Expired).await;
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Discarding unreadable session: {}", e);
                self.clear(ClearReason::Corrupt).await;
                None
            }
        }
    }

    /// Drop the in-memory session; the persisted record is left for the next `init`
    pub async fn teardown(&self) {
        let mut state = self.inner.state.write().await;
        *state = SessionState::Anonymous;
    }

    pub async fn status(&self) -> AuthStatus {
        match &*self.inner.state.read().await {
            SessionState::Anonymous => AuthStatus::Anonymous,
            SessionState::Authenticating => AuthStatus::Authenticating,
            SessionState::Authenticated(_) => AuthStatus::Authenticated,
        }
    }

    /// The live session, clearing it first if it has expired
    pub async fn current(&self) -> Option<Session> {
        {
            let state = self.inner.state.read().await;
            match &*state {
                SessionState::Authenticated(session) if !session.is_expired() => {
                    return Some(session.clone());
                }
                SessionState::Authenticated(_) => {}
                _ => return None,
            }
        }
        self.clear_expired().await
    }

    /// Re-check under the write lock so a session established since the
    /// read is kept
    async fn clear_expired(&self) -> Option<Session> {
        let mut state = self.inner.state.write().await;
        match &*state {
            SessionState::Authenticated(session) if !session.is_expired() => {
                return Some(session.clone());
            }
            SessionState::Authenticated(_) => {}
            _ => return None,
        }
        info!("Session expired");
        if let Err(e) = self.inner.storage.remove_many(&SESSION_KEYS) {
            warn!("Failed to remove persisted session: {}", e);
        }
        *state = SessionState::Anonymous;
        drop(state);
        self.inner.events.send_replace(AuthEvent {
            status: AuthStatus::Anonymous,
            reason: Some(ClearReason::Expired),
        });
        None
    }

    pub async fn token(&self) -> Option<String> {
        self.current().await.map(|session| session.token)
    }

    pub async fn user(&self) -> Option<SessionUser> {
        self.current().await.map(|session| session.user)
    }

    pub async fn begin_authentication(&self) {
        self.set_state(SessionState::Authenticating, None).await;
    }

    /// Back to anonymous if a login attempt did not complete
    pub async fn abort_authentication(&self) {
        let authenticating = matches!(
            &*self.inner.state.read().await,
            SessionState::Authenticating
        );
        if authenticating {
            self.set_state(SessionState::Anonymous, None).await;
        }
    }

    /// Persist a new session and make it current
    pub async fn establish(&self, session: Session) -> Result<(), StorageError> {
        let user = serde_json::to_string(&session.user)?;
        self.inner.storage.set_many(&[
            (TOKEN_KEY, session.token.clone()),
            (USER_KEY, user),
            (EXPIRY_KEY, session.expires_at.timestamp_millis().to_string()),
        ])?;
        self.restore(session).await;
        Ok(())
    }

    /// Make an already persisted session current
    pub async fn restore(&self, session: Session) {
        self.set_state(SessionState::Authenticated(session), None).await;
    }

    /// Remove the session from memory and storage
    ///
    /// Never fails: a storage error is logged and the in-memory state is
    /// cleared regardless.
    pub async fn clear(&self, reason: ClearReason) {
        if let Err(e) = self.inner.storage.remove_many(&SESSION_KEYS) {
            warn!("Failed to remove persisted session: {}", e);
        }
        self.set_state(SessionState::Anonymous, Some(reason)).await;
    }

    /// Called by the API client on any 401 response
    pub async fn handle_unauthorized(&self) {
        warn!("Gateway rejected the session, logging out");
        self.clear(ClearReason::Unauthorized).await;
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    async fn set_state(&self, next: SessionState, reason: Option<ClearReason>) {
        let status = match &next {
            SessionState::Anonymous => AuthStatus::Anonymous,
            SessionState::Authenticating => AuthStatus::Authenticating,
            SessionState::Authenticated(_) => AuthStatus::Authenticated,
        };
        {
            let mut state = self.inner.state.write().await;
            *state = next;
        }
        self.inner.events.send_replace(AuthEvent { status, reason });
    }

    fn load_persisted(&self) -> Result<Option<Session>, StorageError> {
        let storage = &self.inner.storage;
        let token = storage.get(TOKEN_KEY)?;
        let user = storage.get(USER_KEY)?;
        let expiry = storage.get(EXPIRY_KEY)?;

        let (token, user, expiry) = match (token, user, expiry) {
            (None, None, None) => return Ok(None),
            (Some(token), Some(user), Some(expiry)) => (token, user, expiry),
            _ => return Err(StorageError::Corrupt("incomplete session keys".to_string())),
        };

        let user: SessionUser = serde_json::from_str(&user)?;
        let millis: i64 = expiry
            .parse()
            .map_err(|_| StorageError::Corrupt(format!("invalid expiry: {}", expiry)))?;
        let expires_at = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| StorageError::Corrupt(format!("expiry out of range: {}", millis)))?;

        Ok(Some(Session { token, user, expires_at }))
    }
}

// =============================================================================
// Session Store
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    Rejected {
        message: String,
        #[source]
        source: ApiError,
    },

    #[error("Failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

/// Login, startup validation and logout
pub struct SessionStore {
    api: Arc<dyn GatewayApi>,
    context: SessionContext,
    error: RwLock<Option<String>>,
}

impl SessionStore {
    pub fn new(api: Arc<dyn GatewayApi>, context: SessionContext) -> Self {
        Self {
            api,
            context,
            error: RwLock::new(None),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Message of the last failed login, if any
    pub async fn error(&self) -> Option<String> {
        self.error.read().await.clone()
    }

    pub async fn login(&self, form: LoginForm) -> Result<Session, SessionError> {
        let request = form.into_request()?;
        *self.error.write().await = None;
        self.context.begin_authentication().await;

        let response = match self.api.login(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.context.abort_authentication().await;
                warn!("Login failed for {}: {}", request.username, e);
                let message = login_failure_message(&e);
                *self.error.write().await = Some(message.clone());
                return Err(SessionError::Rejected { message, source: e });
            }
        };

        let lifetime = Duration::seconds(response.expires_in.min(MAX_TOKEN_LIFETIME_SECS) as i64);
        let session = Session {
            token: response.token,
            user: response.user,
            expires_at: Utc::now() + lifetime,
        };

        if let Err(e) = self.context.establish(session.clone()).await {
            self.context.abort_authentication().await;
            return Err(e.into());
        }

        info!("Logged in as {}", session.user.username);
        Ok(session)
    }

    /// Startup check of the persisted session
    ///
    /// Any failure, network errors included, ends anonymous.
    pub async fn validate(&self) -> AuthStatus {
        let Some(session) = self.context.init().await else {
            return AuthStatus::Anonymous;
        };

        match self.api.validate_token(&session.token).await {
            Ok(()) => {
                debug!("Session for {} is valid", session.user.username);
                self.context.restore(session).await;
                AuthStatus::Authenticated
            }
            Err(e) => {
                warn!("Stored session failed validation: {}", e);
                self.context.clear(ClearReason::ValidationFailed).await;
                AuthStatus::Anonymous
            }
        }
    }

    /// Best-effort server logout, then a local clear that always happens
    pub async fn logout(&self) {
        if self.context.token().await.is_some() {
            if let Err(e) = self.api.logout().await {
                debug!("Logout request failed: {}", e);
            }
        }
        self.context.clear(ClearReason::LoggedOut).await;
        *self.error.write().await = None;
        info!("Logged out");
    }
}

fn login_failure_message(error: &ApiError) -> String {
    match error {
        ApiError::Http { status, body } if (400..500).contains(status) => {
            ErrorBody::message_from(body).unwrap_or_else(|| "Failed to login".to_string())
        }
        other => other.user_message(),
    }
}

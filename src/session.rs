//! Session lifecycle: credential verification, auto-login and logout.

use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::secrets::{CredentialStore, CREDENTIAL_SERVICE};
use jira_api::{JiraClient, TrackerConfig};
use log::{debug, info, warn};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// An authenticated Jira account. Only produced by a successful identity check, so
/// `display_name` is always set for values handed out.
#[derive(Clone)]
pub struct Session {
    pub base_url: String,
    pub username: String,
    secret: String,
    pub display_name: Option<String>,
    client: JiraClient,
}

impl Session {
    pub fn client(&self) -> &JiraClient {
        &self.client
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Name worklog authors are compared against.
    pub fn current_user(&self) -> &str {
        self.display_name.as_deref().unwrap_or_default()
    }

    fn same_credentials(&self, other: &Session) -> bool {
        self.base_url == other.base_url
            && self.username == other.username
            && self.secret == other.secret
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated(Session),
}

/// Owns the current session. Clones share state; logins are serialized.
#[derive(Clone, Default)]
pub struct SessionManager {
    state: Arc<Mutex<SessionState>>,
    login_lock: Arc<tokio::sync::Mutex<()>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        // State is only ever replaced wholesale, so a poisoned value is still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        *self.lock_state() = state;
    }

    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    pub fn current(&self) -> Option<Session> {
        match &*self.lock_state() {
            SessionState::Authenticated(session) => Some(session.clone()),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.lock_state(), SessionState::Authenticated(_))
    }

    /// Verifies credentials against `GET myself`. On any failure the manager ends up unauthenticated.
    pub async fn login(&self, base_url: &str, username: &str, secret: &str) -> SyncResult<Session> {
        let _guard = self.login_lock.lock().await;
        self.set_state(SessionState::Authenticating);

        match verify_credentials(base_url, username, secret).await {
            Ok(session) => {
                info!("Authenticated as {}", session.current_user());
                self.set_state(SessionState::Authenticated(session.clone()));
                Ok(session)
            }
            Err(err) => {
                warn!("Login failed: {}", err);
                self.set_state(SessionState::Unauthenticated);
                Err(err)
            }
        }
    }

    /// Replays the saved account from `config` with the secret held in `store`.
    /// Missing credentials are a silent no-op; a failed replay is logged and yields `None`.
    pub async fn try_auto_login(
        &self,
        store: &dyn CredentialStore,
        config: &Config,
    ) -> Option<Session> {
        let (base_url, username) = config.saved_account()?;
        let secret = match store.read(CREDENTIAL_SERVICE, username) {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                debug!("No stored secret for {}", username);
                return None;
            }
            Err(err) => {
                warn!("Auto-login skipped: {}", err);
                return None;
            }
        };
        self.login(base_url, username, &secret).await.ok()
    }

    /// Clears the in-memory session. Stored credentials are untouched; see [`forget_credentials`].
    pub fn logout(&self) {
        info!("Logged out");
        self.set_state(SessionState::Unauthenticated);
    }

    /// Drops `rejected` after the tracker refused its credentials mid-flight, but only while
    /// it is still the current session. Returns whether the manager signed out.
    pub fn invalidate_if_current(&self, rejected: &Session) -> bool {
        let mut state = self.lock_state();
        let is_current = matches!(
            &*state,
            SessionState::Authenticated(current) if current.same_credentials(rejected)
        );
        if is_current {
            warn!("Session for {} rejected by tracker, signing out", rejected.username);
            *state = SessionState::Unauthenticated;
        } else {
            debug!("Ignoring rejection of superseded session for {}", rejected.username);
        }
        is_current
    }
}

async fn verify_credentials(base_url: &str, username: &str, secret: &str) -> SyncResult<Session> {
    let base_url = base_url.trim();
    let username = username.trim();
    if base_url.is_empty() || username.is_empty() || secret.is_empty() {
        return Err(SyncError::Auth(
            "URL, username and password are required".to_string(),
        ));
    }

    let client = JiraClient::new(TrackerConfig::new(base_url, username, secret))
        .map_err(|err| SyncError::Auth(err.to_string()))?;
    let me = client
        .get_myself()
        .await
        .map_err(|err| SyncError::Auth(err.to_string()))?;
    let display_name = me
        .display_name()
        .ok_or_else(|| SyncError::Auth("Identity response carried no display name".to_string()))?
        .to_string();

    Ok(Session {
        base_url: base_url.to_string(),
        username: username.to_string(),
        secret: secret.to_string(),
        display_name: Some(display_name),
        client,
    })
}

/// Stores the session's secret and records its account in `config` for the next auto-login.
pub fn remember_credentials(
    store: &dyn CredentialStore,
    config: &mut Config,
    session: &Session,
) -> SyncResult<()> {
    store.save(CREDENTIAL_SERVICE, &session.username, session.secret())?;
    config.base_url = Some(session.base_url.clone());
    config.username = Some(session.username.clone());
    Ok(())
}

pub fn forget_credentials(store: &dyn CredentialStore, username: &str) -> SyncResult<()> {
    store.delete(CREDENTIAL_SERVICE, username)
}

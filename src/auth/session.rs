//! Session state machine for the Virsaa admin client.
//!
//! The `SessionManager` is the single authority over the client session:
//! it owns the login, refresh, and logout protocols, enforces the admin
//! predicate on freshly authenticated users, and keeps the in-memory
//! session synchronized with the `CredentialStore`. Exactly one manager
//! exists per client runtime; consumers receive it through an `Arc`
//! rather than ambient globals, and every mutation goes through the
//! transitions defined here.

use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::error::{self, ADMIN_REQUIRED_MESSAGE, SESSION_EXPIRED_MESSAGE};
use crate::api::transport::{ApiRequest, Transport};
use crate::api::ApiError;
use crate::models::UserProfile;

use super::CredentialStore;

const LOGIN_PATH: &str = "/api/auth/login/";
const REFRESH_PATH: &str = "/api/auth/token/refresh/";
const LOGOUT_PATH: &str = "/api/auth/logout/";

/// The authoritative "am I logged in, as whom" snapshot.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    /// Absent when the persisted refresh entry expired while the access
    /// token was still valid. The next 401 then forces a full re-login.
    pub refresh_token: Option<String>,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
}

/// Success body of the login endpoint.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
    user: UserProfile,
}

/// Success body of the refresh endpoint.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

struct SessionInner {
    state: SessionState,
    session: Option<Session>,
    /// Bumped whenever the session is replaced or cleared. An in-flight
    /// refresh whose epoch no longer matches discards its result instead
    /// of resurrecting a dead session.
    epoch: u64,
}

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    inner: RwLock<SessionInner>,
    /// Single-flight gate: concurrent refresh triggers serialize here,
    /// and late arrivals reuse the token the winner minted.
    refresh_gate: Mutex<()>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>, store: CredentialStore) -> Self {
        Self {
            transport,
            store,
            inner: RwLock::new(SessionInner {
                state: SessionState::Anonymous,
                session: None,
                epoch: 0,
            }),
            refresh_gate: Mutex::new(()),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    pub async fn current_user(&self) -> Option<UserProfile> {
        self.inner.read().await.session.as_ref().map(|s| s.user.clone())
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// True iff a session is held and its user satisfies the admin
    /// predicate. A refresh in flight does not read as logged-out; the
    /// swap is invisible to dependents unless it fails.
    pub async fn is_authenticated(&self) -> bool {
        let inner = self.inner.read().await;
        matches!(
            inner.state,
            SessionState::Authenticated | SessionState::Refreshing
        ) && inner
            .session
            .as_ref()
            .map(|s| s.user.is_admin())
            .unwrap_or(false)
    }

    /// Rebuild the session from the credential store at startup.
    ///
    /// A persisted access token plus an admin user restores directly to
    /// `Authenticated`. If only the refresh token survived, one refresh
    /// attempt is made; any other partial leftover is cleared.
    pub async fn restore(&self) -> SessionState {
        let snapshot = self.store.load();
        let is_admin = snapshot.user.as_ref().map(UserProfile::is_admin).unwrap_or(false);
        let flagged = snapshot.authenticated.unwrap_or(false);

        if snapshot.access_token.is_none()
            && snapshot.refresh_token.is_none()
            && snapshot.user.is_none()
        {
            return SessionState::Anonymous;
        }

        if !is_admin || !flagged {
            debug!("Persisted session is partial or non-admin, clearing");
            self.force_clear().await;
            return SessionState::Anonymous;
        }

        let user = match snapshot.user {
            Some(user) => user,
            None => {
                self.force_clear().await;
                return SessionState::Anonymous;
            }
        };
        match snapshot.access_token {
            Some(access_token) => {
                let mut inner = self.inner.write().await;
                inner.epoch += 1;
                inner.session = Some(Session {
                    access_token,
                    refresh_token: snapshot.refresh_token,
                    user,
                });
                inner.state = SessionState::Authenticated;
                info!("Session restored from store");
                SessionState::Authenticated
            }
            None if snapshot.refresh_token.is_some() => {
                debug!("Access token expired on disk, attempting refresh");
                match self.refresh_if_stale(None).await {
                    Ok(_) => SessionState::Authenticated,
                    Err(e) => {
                        debug!(error = %e, "Startup refresh failed");
                        SessionState::Anonymous
                    }
                }
            }
            None => {
                self.force_clear().await;
                SessionState::Anonymous
            }
        }
    }

    /// Exchange credentials for a session.
    ///
    /// The login endpoint may authenticate a non-admin user; those tokens
    /// are discarded on the spot and never persisted. Only after the
    /// admin predicate passes does the session transition to
    /// `Authenticated` and reach the store.
    pub async fn login(&self, login: &str, password: &str) -> Result<UserProfile, ApiError> {
        self.set_state(SessionState::Authenticating).await;

        let request = ApiRequest::new(Method::POST, LOGIN_PATH)
            .json(serde_json::json!({ "login": login, "password": password }));
        let response = match self.transport.execute(request).await {
            Ok(r) => r,
            Err(e) => {
                self.force_clear().await;
                return Err(e);
            }
        };

        if !response.is_success() {
            self.force_clear().await;
            return Err(ApiError::from_login_failure(response.status, &response.body));
        }

        let body: LoginResponse = match response.json() {
            Ok(b) => b,
            Err(e) => {
                self.force_clear().await;
                return Err(e);
            }
        };

        if !body.user.is_admin() {
            warn!(username = %body.user.username, "Backend authenticated a non-admin user, rejecting");
            self.force_clear().await;
            return Err(ApiError::AccessDenied(ADMIN_REQUIRED_MESSAGE.to_string()));
        }

        let session = Session {
            access_token: body.access,
            refresh_token: Some(body.refresh),
            user: body.user.clone(),
        };
        if let Err(e) = self.store.save(&session) {
            warn!(error = %e, "Failed to persist session to store");
        }

        let mut inner = self.inner.write().await;
        inner.epoch += 1;
        inner.session = Some(session);
        inner.state = SessionState::Authenticated;
        info!(username = %body.user.username, "Logged in");
        Ok(body.user)
    }

    /// Mint a new access token from the held refresh token.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let observed = self.access_token().await;
        self.refresh_if_stale(observed.as_deref()).await
    }

    /// Refresh, coalescing with any refresh already in flight.
    ///
    /// `observed` is the access token the caller last saw (the one that
    /// just drew a 401). If the current token already differs once the
    /// gate is acquired, another caller finished the exchange first and
    /// that token is returned without a second network call.
    pub(crate) async fn refresh_if_stale(
        &self,
        observed: Option<&str>,
    ) -> Result<String, ApiError> {
        let epoch_at_start = self.inner.read().await.epoch;

        let _gate = self.refresh_gate.lock().await;

        let refresh_token = {
            let inner = self.inner.read().await;
            if inner.epoch != epoch_at_start {
                return Err(ApiError::RefreshRejected(SESSION_EXPIRED_MESSAGE.to_string()));
            }
            match inner.session {
                Some(ref session) => {
                    if observed.is_some() && observed != Some(session.access_token.as_str()) {
                        debug!("Coalesced with an already-completed refresh");
                        return Ok(session.access_token.clone());
                    }
                    session.refresh_token.clone()
                }
                // Restore path: no in-memory session yet, the refresh
                // token lives only in the store.
                None => self.store.load().refresh_token,
            }
        };

        let Some(refresh_token) = refresh_token else {
            self.force_clear().await;
            return Err(ApiError::NoRefreshToken);
        };

        self.set_state(SessionState::Refreshing).await;

        let request = ApiRequest::new(Method::POST, REFRESH_PATH)
            .json(serde_json::json!({ "refresh": refresh_token }));
        let response = match self.transport.execute(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Refresh exchange failed, clearing session");
                self.force_clear().await;
                return Err(e);
            }
        };

        if !response.is_success() {
            // The refresh token itself may be expired or revoked; there
            // is nothing left to retry with.
            let message = response
                .json_value()
                .as_ref()
                .and_then(error::extract_message)
                .unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string());
            warn!(status = %response.status, "Refresh rejected, clearing session");
            self.force_clear().await;
            return Err(ApiError::RefreshRejected(message));
        }

        let body: RefreshResponse = match response.json() {
            Ok(b) => b,
            Err(e) => {
                self.force_clear().await;
                return Err(e);
            }
        };

        let mut inner = self.inner.write().await;
        if inner.epoch != epoch_at_start {
            debug!("Session changed during refresh, discarding minted token");
            return Err(ApiError::RefreshRejected(SESSION_EXPIRED_MESSAGE.to_string()));
        }

        if let Some(ref mut session) = inner.session {
            session.access_token = body.access.clone();
        } else {
            // Completing a startup refresh: assemble the session from
            // what the store still holds.
            let snapshot = self.store.load();
            match snapshot.user {
                Some(user) if user.is_admin() => {
                    inner.session = Some(Session {
                        access_token: body.access.clone(),
                        refresh_token: Some(refresh_token),
                        user,
                    });
                }
                _ => {
                    drop(inner);
                    self.force_clear().await;
                    return Err(ApiError::RefreshRejected(SESSION_EXPIRED_MESSAGE.to_string()));
                }
            }
        }
        inner.state = SessionState::Authenticated;
        drop(inner);

        if let Err(e) = self.store.replace_access(&body.access) {
            warn!(error = %e, "Failed to persist refreshed access token");
        }
        debug!("Access token refreshed");
        Ok(body.access)
    }

    /// Best-effort server-side revoke, then an unconditional local clear.
    /// A failed revoke call is logged, never surfaced.
    pub async fn logout(&self) {
        let session = self.inner.read().await.session.clone();
        if let Some(session) = session {
            if let Some(ref refresh) = session.refresh_token {
                let request = ApiRequest::new(Method::POST, LOGOUT_PATH)
                    .bearer(&session.access_token)
                    .json(serde_json::json!({ "refresh_token": refresh }));
                match self.transport.execute(request).await {
                    Ok(response) if !response.is_success() => {
                        warn!(status = %response.status, "Server-side revoke failed, clearing locally anyway");
                    }
                    Err(e) => {
                        warn!(error = %e, "Server-side revoke failed, clearing locally anyway");
                    }
                    Ok(_) => debug!("Refresh token revoked"),
                }
            }
        }
        self.force_clear().await;
        info!("Logged out");
    }

    /// Tear the session down: bump the epoch, drop the in-memory session,
    /// and empty the store. Used by logout, failed logins and refreshes,
    /// and the request wrapper when a replayed request still draws a 401.
    pub(crate) async fn force_clear(&self) {
        {
            let mut inner = self.inner.write().await;
            inner.epoch += 1;
            inner.session = None;
            inner.state = SessionState::Anonymous;
        }
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear credential store");
        }
    }

    async fn set_state(&self, state: SessionState) {
        self.inner.write().await.state = state;
    }
}

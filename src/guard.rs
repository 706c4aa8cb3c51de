//! Admission checks for protected views.
//!
//! The guard is consulted before every navigation, not once at startup;
//! a failed refresh can invalidate the session mid-visit, and the next
//! check must see that.

use std::sync::Arc;

use tracing::debug;

use crate::auth::SessionManager;
use crate::models::UserFilter;

/// The views the admin client exposes, mirroring the dashboard's route
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    Users(UserFilter),
    Authors,
    UploadEbooks,
    UploadAudiobooks,
    UploadAuthors,
}

impl Route {
    /// Every route except the login entry point requires a session.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::Login)
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    RedirectToLogin,
}

/// Gates access to protected views on the current session state and the
/// admin predicate of the cached user snapshot.
pub struct RouteGuard {
    session: Arc<SessionManager>,
}

impl RouteGuard {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub async fn admit(&self, route: Route) -> Admission {
        if !route.requires_auth() {
            return Admission::Granted;
        }
        if self.session.is_authenticated().await {
            Admission::Granted
        } else {
            debug!(?route, "Admission denied, redirecting to login");
            Admission::RedirectToLogin
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::testing::FakeTransport;
    use crate::api::Transport;
    use crate::auth::CredentialStore;

    const LOGIN_PATH: &str = "/api/auth/login/";

    const ADMIN_LOGIN_BODY: &str = r#"{
        "access": "acc-1",
        "refresh": "ref-1",
        "user": {"id": 1, "username": "admin", "email": "admin@virsaa.com",
                 "is_staff": false, "is_superuser": true}
    }"#;

    fn test_guard(name: &str) -> (Arc<FakeTransport>, Arc<SessionManager>, RouteGuard) {
        let transport = Arc::new(FakeTransport::new());
        let dir = std::env::temp_dir().join(format!(
            "virsaa-admin-guard-test-{}-{}",
            std::process::id(),
            name
        ));
        let _ = std::fs::remove_dir_all(&dir);
        let store = CredentialStore::new(dir).unwrap();
        let session = Arc::new(SessionManager::new(
            transport.clone() as Arc<dyn Transport>,
            store,
        ));
        let guard = RouteGuard::new(session.clone());
        (transport, session, guard)
    }

    #[tokio::test]
    async fn test_login_route_always_admitted() {
        let (_transport, _session, guard) = test_guard("login-open");
        assert_eq!(guard.admit(Route::Login).await, Admission::Granted);
    }

    #[tokio::test]
    async fn test_protected_routes_denied_when_anonymous() {
        let (_transport, _session, guard) = test_guard("anon-denied");
        for route in [
            Route::Dashboard,
            Route::Users(UserFilter::All),
            Route::Authors,
            Route::UploadEbooks,
            Route::UploadAudiobooks,
            Route::UploadAuthors,
        ] {
            assert_eq!(guard.admit(route).await, Admission::RedirectToLogin);
        }
    }

    #[tokio::test]
    async fn test_protected_routes_admitted_when_authenticated() {
        let (transport, session, guard) = test_guard("admin-granted");
        transport.script(LOGIN_PATH, 200, ADMIN_LOGIN_BODY);
        session.login("admin@virsaa.com", "pw").await.unwrap();

        assert_eq!(guard.admit(Route::Dashboard).await, Admission::Granted);
        assert_eq!(
            guard.admit(Route::Users(UserFilter::Premium)).await,
            Admission::Granted
        );
    }

    #[tokio::test]
    async fn test_admission_revoked_after_session_clear() {
        // The guard re-evaluates on every navigation: a session torn
        // down by a failed refresh denies the next check
        let (transport, session, guard) = test_guard("revoked-mid-visit");
        transport.script(LOGIN_PATH, 200, ADMIN_LOGIN_BODY);
        session.login("admin@virsaa.com", "pw").await.unwrap();
        assert_eq!(guard.admit(Route::Dashboard).await, Admission::Granted);

        session.force_clear().await;
        assert_eq!(
            guard.admit(Route::Dashboard).await,
            Admission::RedirectToLogin
        );
    }
}

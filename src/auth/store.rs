use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::UserProfile;

use super::Session;

/// Access token entry lifetime. The server issues access tokens valid
/// for one day.
const ACCESS_TOKEN_TTL_HOURS: i64 = 24;

/// Refresh token, user snapshot, and authenticated flag lifetime.
/// Matches the server-side refresh token validity of seven days.
const PERSISTENT_TTL_DAYS: i64 = 7;

const ACCESS_TOKEN_FILE: &str = "access_token";
const REFRESH_TOKEN_FILE: &str = "refresh_token";
const USER_FILE: &str = "user";
const AUTHENTICATED_FILE: &str = "authenticated";

/// One persisted value with its own expiration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T> StoredEntry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Utc::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Partial snapshot of what the store currently holds. Any entry that is
/// missing, unreadable, or past its expiration loads as `None`.
#[derive(Debug, Clone, Default)]
pub struct StoredSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
    pub authenticated: Option<bool>,
}

/// Durable persistence for the four session fields, each as its own
/// JSON file with an independent expiration. Never performs network I/O.
pub struct CredentialStore {
    store_dir: PathBuf,
}

impl CredentialStore {
    pub fn new(store_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&store_dir)
            .with_context(|| format!("Failed to create store directory {:?}", store_dir))?;
        Ok(Self { store_dir })
    }

    fn entry_path(&self, name: &str) -> PathBuf {
        self.store_dir.join(format!("{}.json", name))
    }

    fn write_entry<T: Serialize>(&self, name: &str, value: &T, ttl: Duration) -> Result<()> {
        let entry = StoredEntry::new(value, ttl);
        let contents = serde_json::to_string_pretty(&entry)?;
        std::fs::write(self.entry_path(name), contents)
            .with_context(|| format!("Failed to write store entry: {}", name))?;
        Ok(())
    }

    fn read_entry<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.entry_path(name);
        if !path.exists() {
            return None;
        }
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                debug!(entry = name, error = %e, "Failed to read store entry");
                return None;
            }
        };
        let entry: StoredEntry<T> = match serde_json::from_str(&contents) {
            Ok(e) => e,
            Err(e) => {
                debug!(entry = name, error = %e, "Failed to parse store entry");
                return None;
            }
        };
        if entry.is_expired() {
            debug!(entry = name, "Store entry expired");
            return None;
        }
        Some(entry.value)
    }

    fn remove_entry(&self, name: &str) -> Result<()> {
        let path = self.entry_path(name);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove store entry: {}", name))?;
        }
        Ok(())
    }

    /// Persist all four session fields. The access token gets the short
    /// TTL; refresh token, user snapshot, and flag get the long one.
    pub fn save(&self, session: &Session) -> Result<()> {
        self.write_entry(
            ACCESS_TOKEN_FILE,
            &session.access_token,
            Duration::hours(ACCESS_TOKEN_TTL_HOURS),
        )?;
        if let Some(ref refresh) = session.refresh_token {
            self.write_entry(
                REFRESH_TOKEN_FILE,
                refresh,
                Duration::days(PERSISTENT_TTL_DAYS),
            )?;
        }
        self.write_entry(USER_FILE, &session.user, Duration::days(PERSISTENT_TTL_DAYS))?;
        self.write_entry(
            AUTHENTICATED_FILE,
            &true,
            Duration::days(PERSISTENT_TTL_DAYS),
        )?;
        Ok(())
    }

    /// Rewrite only the access token entry. Used when a refresh succeeds;
    /// refresh token and user snapshot stay untouched.
    pub fn replace_access(&self, access_token: &str) -> Result<()> {
        self.write_entry(
            ACCESS_TOKEN_FILE,
            &access_token,
            Duration::hours(ACCESS_TOKEN_TTL_HOURS),
        )
    }

    /// Load whatever is currently persisted. Missing or expired entries
    /// come back as `None`; the caller decides what the partial snapshot
    /// amounts to.
    pub fn load(&self) -> StoredSession {
        StoredSession {
            access_token: self.read_entry(ACCESS_TOKEN_FILE),
            refresh_token: self.read_entry(REFRESH_TOKEN_FILE),
            user: self.read_entry(USER_FILE),
            authenticated: self.read_entry(AUTHENTICATED_FILE),
        }
    }

    /// Remove all four entries unconditionally. Idempotent.
    pub fn clear(&self) -> Result<()> {
        self.remove_entry(ACCESS_TOKEN_FILE)?;
        self.remove_entry(REFRESH_TOKEN_FILE)?;
        self.remove_entry(USER_FILE)?;
        self.remove_entry(AUTHENTICATED_FILE)?;
        Ok(())
    }

    /// True when no entry file is present at all.
    pub fn is_empty(&self) -> bool {
        [
            ACCESS_TOKEN_FILE,
            REFRESH_TOKEN_FILE,
            USER_FILE,
            AUTHENTICATED_FILE,
        ]
        .iter()
        .all(|name| !self.entry_path(name).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store(name: &str) -> CredentialStore {
        let dir = std::env::temp_dir().join(format!(
            "virsaa-admin-store-test-{}-{}",
            std::process::id(),
            name
        ));
        let _ = std::fs::remove_dir_all(&dir);
        CredentialStore::new(dir).expect("Failed to create test store")
    }

    fn admin_session() -> Session {
        Session {
            access_token: "acc-1".to_string(),
            refresh_token: Some("ref-1".to_string()),
            user: UserProfile {
                id: 1,
                username: "admin".to_string(),
                email: "admin@virsaa.com".to_string(),
                is_staff: true,
                is_superuser: false,
                membership_level: None,
                theme_preference: None,
            },
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let store = test_store("roundtrip");
        store.save(&admin_session()).unwrap();

        let snapshot = store.load();
        assert_eq!(snapshot.access_token.as_deref(), Some("acc-1"));
        assert_eq!(snapshot.refresh_token.as_deref(), Some("ref-1"));
        assert_eq!(snapshot.authenticated, Some(true));
        assert_eq!(snapshot.user.unwrap().username, "admin");
    }

    #[test]
    fn test_replace_access_leaves_rest_untouched() {
        let store = test_store("replace");
        store.save(&admin_session()).unwrap();
        store.replace_access("acc-2").unwrap();

        let snapshot = store.load();
        assert_eq!(snapshot.access_token.as_deref(), Some("acc-2"));
        assert_eq!(snapshot.refresh_token.as_deref(), Some("ref-1"));
        assert_eq!(snapshot.user.unwrap().username, "admin");
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = test_store("clear");
        store.save(&admin_session()).unwrap();
        assert!(!store.is_empty());

        store.clear().unwrap();
        assert!(store.is_empty());
        // Clearing an already-empty store must not fail
        store.clear().unwrap();
        assert!(store.is_empty());

        let snapshot = store.load();
        assert!(snapshot.access_token.is_none());
        assert!(snapshot.refresh_token.is_none());
        assert!(snapshot.user.is_none());
        assert!(snapshot.authenticated.is_none());
    }

    #[test]
    fn test_expired_entry_loads_as_none() {
        let store = test_store("expired");
        store.save(&admin_session()).unwrap();

        // Rewrite the access entry with an expiration in the past
        let expired = StoredEntry {
            value: "acc-1".to_string(),
            expires_at: Utc::now() - Duration::hours(1),
        };
        std::fs::write(
            store.entry_path(ACCESS_TOKEN_FILE),
            serde_json::to_string(&expired).unwrap(),
        )
        .unwrap();

        let snapshot = store.load();
        assert!(snapshot.access_token.is_none());
        // The longer-lived entries are independent and still valid
        assert_eq!(snapshot.refresh_token.as_deref(), Some("ref-1"));
    }

    #[test]
    fn test_corrupt_entry_loads_as_none() {
        let store = test_store("corrupt");
        store.save(&admin_session()).unwrap();
        std::fs::write(store.entry_path(USER_FILE), "garbage").unwrap();

        let snapshot = store.load();
        assert!(snapshot.user.is_none());
        assert_eq!(snapshot.access_token.as_deref(), Some("acc-1"));
    }
}

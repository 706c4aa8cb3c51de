use std::fmt;

use serde::{Deserialize, Serialize};

/// Profile snapshot returned by the login endpoint and cached for the
/// lifetime of the session. It is not re-fetched automatically; a fresh
/// snapshot arrives with the next login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub membership_level: Option<String>,
    #[serde(default)]
    pub theme_preference: Option<String>,
}

impl UserProfile {
    /// Admin predicate: only staff or superuser accounts may hold an
    /// authenticated admin session. Enforced client-side even when the
    /// backend accepted the credentials.
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

/// Filter segment for the user list endpoint:
/// `GET /api/auth/users/{filter}/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFilter {
    All,
    Basic,
    Premium,
}

impl UserFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserFilter::All => "all",
            UserFilter::Basic => "basic",
            UserFilter::Premium => "premium",
        }
    }

    /// Parse a CLI argument or route segment into a filter.
    pub fn from_arg(s: &str) -> Option<Self> {
        match s {
            "all" => Some(UserFilter::All),
            "basic" => Some(UserFilter::Basic),
            "premium" => Some(UserFilter::Premium),
            _ => None,
        }
    }
}

impl fmt::Display for UserFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the user list endpoint. The backend returns a wider shape
/// than the profile snapshot; unknown fields are ignored and sparsely
/// populated ones default to None.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub membership_level: Option<String>,
    #[serde(default)]
    pub about_me: Option<String>,
    #[serde(default)]
    pub joined_date: Option<String>,
    #[serde(default)]
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub preferred_content: Vec<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

impl AccountUser {
    /// Display name: "First Last" when both are present, username otherwise.
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{} {}", first, last)
            }
            _ => self.username.clone(),
        }
    }
}

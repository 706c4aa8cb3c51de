use serde_json::Value;
use thiserror::Error;

/// Fixed fallback when no extraction rule matches the error body.
pub const FALLBACK_MESSAGE: &str = "An error occurred. Please try again.";

/// Surfaced when the login endpoint rejects the credentials.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials. Please try again.";

/// Surfaced when the identity is unknown to the backend.
pub const EMAIL_NOT_FOUND_MESSAGE: &str = "Email not found.";

/// Surfaced when the admin predicate rejects a backend-authenticated user.
pub const ADMIN_REQUIRED_MESSAGE: &str = "Access denied. Only admin users can log in.";

/// Surfaced on a 403 from an authenticated endpoint.
pub const ADMIN_PRIVILEGES_MESSAGE: &str = "Access denied. Admin privileges required.";

/// Surfaced when the session is torn down after a failed refresh.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

#[derive(Error, Debug)]
pub enum ApiError {
    /// Login/password pair rejected by the backend.
    #[error("{0}")]
    InvalidCredentials(String),

    /// Authorization failure: the role predicate failed client-side, or
    /// the server answered 403. Refreshing the token cannot repair it.
    #[error("{0}")]
    AccessDenied(String),

    /// Unknown identity (404, or a "no user matches" detail body).
    #[error("{0}")]
    NotFound(String),

    /// A refresh was required but no refresh token is held.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// The refresh exchange was rejected; the session has been cleared.
    #[error("{0}")]
    RefreshRejected(String),

    /// Unclassified 4xx/5xx response.
    #[error("{0}")]
    ServerRejected(String),

    /// Transport failure, no response received.
    #[error("Network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape. Local failure,
    /// does not touch session state.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// The backend reports the same conceptual error under several JSON
/// shapes. Extraction rules are tried in order; first match wins.
///   {"login": ["msg"]}  - field-level login errors
///   {"error": "msg"}    - generic error wrapper
///   {"detail": "msg"}   - DRF-style detail
const MESSAGE_RULES: &[fn(&Value) -> Option<String>] = &[
    |body| {
        body.get("login")?
            .as_array()?
            .first()?
            .as_str()
            .map(String::from)
    },
    |body| body.get("error")?.as_str().map(String::from),
    |body| body.get("detail")?.as_str().map(String::from),
];

/// Extract a human-readable message from an error body, trying each
/// known shape in sequence.
pub fn extract_message(body: &Value) -> Option<String> {
    MESSAGE_RULES.iter().find_map(|rule| rule(body))
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        // Walk back to a char boundary so multibyte bodies do not panic
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..end],
            body.len()
        )
    }

    /// Classify a non-success response from a generic authenticated
    /// endpoint. 401 never reaches here; the request wrapper consumes it.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| extract_message(&value));

        match status.as_u16() {
            403 => ApiError::AccessDenied(
                message.unwrap_or_else(|| ADMIN_PRIVILEGES_MESSAGE.to_string()),
            ),
            404 => {
                ApiError::NotFound(message.unwrap_or_else(|| Self::truncate_body(body)))
            }
            _ => ApiError::ServerRejected(
                message.unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
            ),
        }
    }

    /// Classify a non-success response from the login endpoint.
    ///
    /// A `login` field in the body means the credential pair itself was
    /// rejected; 404 (or a "no user matches" detail) means the identity
    /// is unknown; everything else is an unclassified rejection carrying
    /// whatever message the body yields.
    pub fn from_login_failure(status: reqwest::StatusCode, body: &str) -> Self {
        let value = serde_json::from_str::<Value>(body).ok();

        if let Some(ref value) = value {
            if value.get("login").is_some() {
                return ApiError::InvalidCredentials(INVALID_CREDENTIALS_MESSAGE.to_string());
            }
        }

        let detail_says_no_user = value
            .as_ref()
            .and_then(|v| v.get("detail"))
            .and_then(Value::as_str)
            .map(|d| d.contains("No User matches"))
            .unwrap_or(false);

        if status.as_u16() == 404 || detail_says_no_user {
            return ApiError::NotFound(EMAIL_NOT_FOUND_MESSAGE.to_string());
        }

        let message = value
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
        ApiError::ServerRejected(message)
    }
}

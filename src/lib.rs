//! Virsaa admin client library.
//!
//! A thin client for the Virsaa media platform's admin API: session and
//! token management with transparent refresh-on-expiry, durable
//! credential storage, a route guard for protected views, and typed
//! calls for the user-list and content-upload endpoints.

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;

pub use api::{ApiClient, ApiError, HttpTransport, Transport};
pub use auth::{CredentialStore, Session, SessionManager, SessionState};
pub use config::Config;
pub use guard::{Admission, Route, RouteGuard};

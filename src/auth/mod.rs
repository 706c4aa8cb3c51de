//! Authentication module: session lifecycle and credential persistence.
//!
//! This module provides:
//! - `SessionManager`: the login/refresh/logout state machine
//! - `CredentialStore`: durable storage for the four session fields,
//!   each with its own expiration
//!
//! Access tokens persist for one day, refresh tokens for seven.

pub mod session;
pub mod store;

pub use session::{Session, SessionManager, SessionState};
pub use store::{CredentialStore, StoredSession};

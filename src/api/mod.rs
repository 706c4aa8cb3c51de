//! REST API client module for the Virsaa backend.
//!
//! This module provides the `ApiClient` for authenticated calls, the
//! `Transport` seam it runs over, and the error taxonomy shared by the
//! session machine and the request wrapper.
//!
//! Authentication uses short-lived bearer access tokens minted from a
//! longer-lived refresh token; a 401 triggers one refresh-and-replay.

pub mod client;
pub mod error;
pub mod transport;

pub use client::ApiClient;
pub use error::ApiError;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, RequestBody, Transport};

//! Data models for the Virsaa admin client.
//!
//! These structs represent the JSON shapes exchanged with the Virsaa
//! backend: user profiles and account listings from the auth endpoints,
//! and content payloads for the collections upload endpoints.

pub mod content;
pub mod user;

pub use content::{Author, NewAudiobook, NewAuthor, NewEbook};
pub use user::{AccountUser, UserFilter, UserProfile};

//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`CredentialStore`] - Shared credential persistence with change notifications
//! - [`HttpClient`] - HTTP client operations (GET, POST)
//! - [`HistorySource`] - Recent browsing history
//! - [`AttentionIndicator`] - User-visible "needs attention" signal

pub mod credentials;
pub mod history;
pub mod http;
pub mod indicator;

pub use credentials::{ContextId, CredentialChange, CredentialStore, StoreError};
pub use history::{HistoryItem, HistoryQuery, HistorySource, SourceError};
pub use http::{bearer_headers, json_headers, Headers, HttpClient, HttpError, Response};
pub use indicator::AttentionIndicator;

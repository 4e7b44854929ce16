//! Mock implementations for testing.
//!
//! Test doubles for every trait seam, so the engine can be exercised
//! without network access or the file system.
//!
//! # Available Mocks
//!
//! - [`InMemoryStore`] - Credential Store, shareable between simulated contexts
//! - [`MockHttpClient`] - HTTP client with per-URL response queues
//! - [`StaticHistory`] - Fixed browsing history
//! - [`RecordingIndicator`] - Attention indicator that records raises
//! - [`InMemoryCache`] - Local token cache

pub mod cache;
pub mod credentials;
pub mod history;
pub mod http;
pub mod indicator;

pub use cache::InMemoryCache;
pub use credentials::InMemoryStore;
pub use history::StaticHistory;
pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use indicator::RecordingIndicator;

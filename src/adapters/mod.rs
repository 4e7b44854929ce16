//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`FileCredentialStore`] - Shared JSON Credential Store with change watching
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`JsonHistorySource`] - Browsing history from a JSON export
//! - [`FileIndicator`] - Attention indicator as a status file
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles for every trait.

pub mod file_indicator;
pub mod file_store;
pub mod history_file;
pub mod mock;
pub mod reqwest_http;

pub use file_indicator::{FileIndicator, IndicatorStatus};
pub use file_store::FileCredentialStore;
pub use history_file::JsonHistorySource;
pub use reqwest_http::ReqwestHttpClient;

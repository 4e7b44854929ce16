//! Authentication against the DevChronicles backend.
//!
//! - [`Credentials`] and [`UserProfile`]: what the Credential Store holds
//! - [`AuthorityClient`]: the remote authority's endpoints
//! - [`TokenService`]: authenticate, refresh, and persist

pub mod central_api;
pub mod credentials;
pub mod token_service;

pub use central_api::{api_url, AuthorityClient, TokenResponse, DEFAULT_BACKEND_URL};
pub use credentials::{preview, Credentials, UserProfile};
pub use token_service::TokenService;

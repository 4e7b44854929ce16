//! Crate-wide error type.

use thiserror::Error;

use super::category::ErrorCategory;
use crate::traits::{HttpError, SourceError, StoreError};

/// Errors produced by the credential lifecycle and sync engine.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Transport failure. Surfaced to the caller, never retried here.
    #[error("network error: {0}")]
    Network(#[from] HttpError),

    /// The remote authority refused the identity assertion.
    #[error("authentication denied: {0}")]
    AuthDenied(String),

    /// The remote authority refused the refresh token. Terminal.
    #[error("refresh denied: {0}")]
    RefreshDenied(String),

    /// The one permitted refresh-and-reissue was spent, or there was no token.
    #[error("authorization exhausted, re-authentication required")]
    Exhausted,

    /// An external credential offer could not be parsed.
    #[error("malformed credential offer: {0}")]
    MalformedOffer(String),

    /// The credential store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The history source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The backend answered with a status this engine does not handle.
    #[error("unexpected response ({status}): {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// The backend answered with a body that could not be decoded.
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

impl SyncError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::Network(_) => ErrorCategory::Network,
            SyncError::AuthDenied(_) | SyncError::RefreshDenied(_) | SyncError::Exhausted => {
                ErrorCategory::Auth
            }
            SyncError::MalformedOffer(_) => ErrorCategory::Client,
            SyncError::Store(_) | SyncError::Source(_) => ErrorCategory::Storage,
            SyncError::UnexpectedStatus { .. } | SyncError::InvalidBody(_) => {
                ErrorCategory::Server
            }
        }
    }

    /// Check if the operation may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Check if the user must sign in again.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            SyncError::AuthDenied(_) | SyncError::RefreshDenied(_) | SyncError::Exhausted
        )
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Network(_) => "E_NET",
            SyncError::AuthDenied(_) => "E_AUTH_DENIED",
            SyncError::RefreshDenied(_) => "E_AUTH_REFRESH_DENIED",
            SyncError::Exhausted => "E_AUTH_EXHAUSTED",
            SyncError::MalformedOffer(_) => "E_OFFER_MALFORMED",
            SyncError::Store(_) => "E_STORE",
            SyncError::Source(_) => "E_SOURCE",
            SyncError::UnexpectedStatus { .. } => "E_SERVER_STATUS",
            SyncError::InvalidBody(_) => "E_SERVER_BODY",
        }
    }

    /// Get a user-friendly error message.
    ///
    /// Transient errors get a generic message; only auth errors ask the user
    /// to act.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Network(_) => "Could not reach DevChronicles. Will try again later.".to_string(),
            SyncError::AuthDenied(_) => "Sign-in was refused. Please try again.".to_string(),
            SyncError::RefreshDenied(_) | SyncError::Exhausted => {
                "Your session has expired. Please sign in again.".to_string()
            }
            SyncError::MalformedOffer(_) => "The sign-in link could not be read.".to_string(),
            SyncError::Store(e) => format!("Local storage problem: {}", e),
            SyncError::Source(e) => format!("Could not read browsing history: {}", e),
            SyncError::UnexpectedStatus { status, .. } => {
                format!("DevChronicles returned an error ({}).", status)
            }
            SyncError::InvalidBody(_) => "DevChronicles returned an unexpected reply.".to_string(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::InvalidBody(e.to_string())
    }
}

//! Error category classification.
//!
//! Categories drive the propagation policy: transient categories are
//! surfaced to the immediate caller and retried on the next pass, auth
//! categories drive session transitions.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection, DNS, timeout. Transient.
    Network,

    /// Credential-level failures that drive state transitions.
    Auth,

    /// Unexpected responses from the backend (HTTP 5xx, bad bodies).
    Server,

    /// Malformed input from a side channel or a programming error.
    Client,

    /// Local persistence failures (credential store, history source).
    Storage,

    /// Missing or invalid configuration.
    Configuration,
}

impl ErrorCategory {
    /// Returns true if errors in this category are transient and the
    /// operation can be attempted again on the next interval.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Server => "server",
            ErrorCategory::Client => "client",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Check your internet connection and try again",
            ErrorCategory::Auth => "Sign in again with `chronicle login`",
            ErrorCategory::Server => {
                "The server may be experiencing issues. Please try again later"
            }
            ErrorCategory::Client => "The link or input could not be understood",
            ErrorCategory::Storage => "Check file permissions and available disk space",
            ErrorCategory::Configuration => "Check your CHRONICLE_* environment settings",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

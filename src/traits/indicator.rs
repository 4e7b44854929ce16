//! User-visible attention indicator abstraction.
//!
//! A binary signal (the extension badge in the browser build) toggled only by
//! the terminal outcomes of guarded requests.

use async_trait::async_trait;

/// Title shown while sync is healthy.
pub const TITLE_RUNNING: &str = "DevChronicles - Running";

/// Title shown when the user must sign in again.
pub const TITLE_REAUTH_REQUIRED: &str =
    "DevChronicles - Authentication required. Click to sign in again.";

/// Trait for the "needs attention" indicator.
///
/// Failures to update the indicator are logged by implementations and never
/// propagated; the indicator is a display concern.
#[async_trait]
pub trait AttentionIndicator: Send + Sync {
    /// Show the "re-authentication required" signal.
    async fn raise(&self);

    /// Clear any previously raised signal.
    async fn clear(&self);

    /// Whether the signal is currently raised.
    async fn is_raised(&self) -> bool;
}

//! Error handling for the sync engine.
//!
//! | Kind | Category | Handling |
//! |------|----------|----------|
//! | `Network` | Network | surfaced to the caller, next pass tries again |
//! | `AuthDenied` / `RefreshDenied` | Auth | drive session transitions |
//! | `Exhausted` | Auth | always deauthorizes the session |
//! | `MalformedOffer` | Client | offer discarded, reconciliation continues |
//! | `Store` / `Source` | Storage | surfaced to the caller |

mod category;
mod sync_error;

pub use category::ErrorCategory;
pub use sync_error::SyncError;

/// Result alias used across the crate.
pub type SyncResult<T> = Result<T, SyncError>;

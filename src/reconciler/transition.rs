//! Classification of Credential Store changes.
//!
//! | old access token | new access token | transition |
//! |---|---|---|
//! | absent | present | `SignedIn` |
//! | present | absent | `SignedOut` |
//! | `a` | `b`, `a != b` | `Rotated` |
//! | otherwise | | `Unchanged` |

use crate::auth::Credentials;

/// What a store change means for this context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTransition {
    /// Another context signed in.
    SignedIn { token: String },
    /// Another context signed out or a refresh failed elsewhere.
    SignedOut,
    /// Another context refreshed.
    Rotated { token: String },
    /// Nothing this context has to act on.
    Unchanged,
}

impl StoreTransition {
    pub fn classify(old: &Credentials, new: &Credentials) -> Self {
        match (old.access_token.as_deref(), new.access_token.as_deref()) {
            (None, Some(token)) => StoreTransition::SignedIn {
                token: token.to_string(),
            },
            (Some(_), None) => StoreTransition::SignedOut,
            (Some(before), Some(after)) if before != after => StoreTransition::Rotated {
                token: after.to_string(),
            },
            _ => StoreTransition::Unchanged,
        }
    }
}

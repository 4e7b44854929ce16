//! Session states and the transition table.

use std::fmt;

use crate::auth::Credentials;

/// Authentication state of this context.
///
/// Derived from the Credential Store, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No credentials.
    Unauthenticated,
    /// An access token is present in the store.
    Authenticated,
    /// A request was rejected and a refresh is pending, or only a refresh
    /// token is stored.
    Refreshing,
    /// Refresh failed. Requires the user to sign in again.
    Unauthorized,
}

/// Inputs that move the session between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// `authenticate` succeeded in this context.
    SignedIn,
    /// A guarded request got the unauthorized status.
    RequestRejected,
    /// A refresh (or adoption of a refreshed token) succeeded.
    RefreshSucceeded,
    /// A refresh failed terminally, or a guarded call was exhausted.
    RefreshFailed,
    /// Another context wrote an access token.
    ExternalSignIn,
    /// Another context removed the access token.
    ExternalSignOut,
}

impl SessionState {
    /// Derive the state from a credential record.
    pub fn derive(creds: &Credentials) -> Self {
        if creds.has_token() {
            SessionState::Authenticated
        } else if creds.is_awaiting_refresh() {
            SessionState::Refreshing
        } else {
            SessionState::Unauthenticated
        }
    }

    /// Apply `event`, returning the next state, or `None` if the event has
    /// no meaning in this state.
    pub fn apply(self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent as E;
        use SessionState as S;

        match (self, event) {
            (_, E::SignedIn) => Some(S::Authenticated),
            (_, E::ExternalSignIn) => Some(S::Authenticated),
            (_, E::ExternalSignOut) => Some(S::Unauthenticated),
            (_, E::RefreshFailed) => Some(S::Unauthorized),

            (S::Authenticated | S::Refreshing, E::RequestRejected) => Some(S::Refreshing),
            (S::Authenticated | S::Refreshing, E::RefreshSucceeded) => Some(S::Authenticated),

            (S::Unauthenticated | S::Unauthorized, E::RequestRejected | E::RefreshSucceeded) => {
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }

    /// Whether the user has to act before collection can resume.
    pub fn needs_sign_in(&self) -> bool {
        matches!(
            self,
            SessionState::Unauthenticated | SessionState::Unauthorized
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticated => "authenticated",
            SessionState::Refreshing => "refreshing",
            SessionState::Unauthorized => "unauthorized",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

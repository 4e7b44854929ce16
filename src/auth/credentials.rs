//! Credential record and user profile types.
//!
//! The credential record is the only thing the Credential Store holds that
//! drives session state. Both tokens are written and cleared together.

use serde::{Deserialize, Serialize};

/// Number of leading characters shown when a token is logged.
const TOKEN_PREVIEW_LEN: usize = 8;

/// A pair of opaque tokens issued by the remote authority.
///
/// An absent access token with a present refresh token means the record is
/// awaiting refresh. It is never treated as authenticated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// Bearer token attached to authenticated requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Token exchanged for a new access token when the current one is rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credentials {
    /// Create a record holding both tokens.
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token,
        }
    }

    /// Create an empty record.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if the record has an access token.
    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Check if only a refresh token is present.
    pub fn is_awaiting_refresh(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_some()
    }

    /// Check if neither token is present.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// Short, loggable preview of the access token.
    pub fn token_preview(&self) -> String {
        match self.access_token.as_deref() {
            Some(token) => preview(token),
            None => "None".to_string(),
        }
    }
}

/// Short, loggable preview of an arbitrary token.
pub fn preview(token: &str) -> String {
    let end = token
        .char_indices()
        .nth(TOKEN_PREVIEW_LEN)
        .map(|(idx, _)| idx)
        .unwrap_or(token.len());
    format!("{}...", &token[..end])
}

/// Profile of the signed-in user, shared with the dashboard handoff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserProfile {
    /// Display name, falling back to the email and then to "User".
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("User")
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: Some("User".to_string()),
            email: Some("user@example.com".to_string()),
        }
    }
}

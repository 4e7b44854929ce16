//! Client for the DevChronicles authentication endpoints.
//!
//! Handles the identity-assertion exchange, refresh, and token validation.
//! Status codes are mapped onto [`SyncError`] here so callers only see the
//! outcomes the session state machine cares about.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::UserProfile;
use crate::error::{SyncError, SyncResult};
use crate::traits::{bearer_headers, json_headers, HttpClient, Response};

/// Default origin of the DevChronicles backend.
pub const DEFAULT_BACKEND_URL: &str = "https://api.devchronicles.xyz";

/// Path prefix every API endpoint lives under.
pub const API_PREFIX: &str = "/backend-api";

/// Build the full URL of an API endpoint.
pub fn api_url(base_url: &str, path: &str) -> String {
    format!("{}{}{}", base_url.trim_end_matches('/'), API_PREFIX, path)
}

/// Response from the token endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    /// Absent on refresh when the authority does not rotate refresh tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, alias = "user_data")]
    pub user: Option<UserProfile>,
}

/// Client for the remote authority.
pub struct AuthorityClient {
    /// Backend origin, without the API prefix
    pub base_url: String,
    http: Arc<dyn HttpClient>,
}

impl AuthorityClient {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    /// Create a client pointing at the production backend.
    pub fn with_default_url(http: Arc<dyn HttpClient>) -> Self {
        Self::new(http, DEFAULT_BACKEND_URL)
    }

    /// Exchange an identity assertion for a credential pair.
    ///
    /// POST /backend-api/auth/extension-token
    pub async fn exchange_identity(&self, assertion: &str) -> SyncResult<TokenResponse> {
        let url = api_url(&self.base_url, "/auth/extension-token");
        let body = serde_json::json!({ "google_token": assertion });

        let response = self
            .http
            .post(&url, &body.to_string(), &json_headers())
            .await?;

        if is_denied(&response) {
            return Err(SyncError::AuthDenied(error_message(&response)));
        }
        parse_token_response(&response)
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// POST /backend-api/auth/refresh
    pub async fn refresh(&self, refresh_token: &str) -> SyncResult<TokenResponse> {
        let url = api_url(&self.base_url, "/auth/refresh");
        let body = serde_json::json!({ "refresh_token": refresh_token });

        let response = self
            .http
            .post(&url, &body.to_string(), &json_headers())
            .await?;

        if is_denied(&response) {
            return Err(SyncError::RefreshDenied(error_message(&response)));
        }
        parse_token_response(&response)
    }

    /// Check whether the authority accepts `token`.
    ///
    /// GET /backend-api/chrome/test. Returns `Ok(false)` when the token is
    /// rejected; transport failures are errors.
    pub async fn validate(&self, token: &str) -> SyncResult<bool> {
        let url = api_url(&self.base_url, "/chrome/test");
        let response = self.http.get(&url, &bearer_headers(token)).await?;

        if response.is_success() {
            Ok(true)
        } else if is_denied(&response) {
            Ok(false)
        } else {
            Err(unexpected(&response))
        }
    }
}

fn is_denied(response: &Response) -> bool {
    matches!(response.status, 401 | 403)
}

fn error_message(response: &Response) -> String {
    let text = response.text().unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| {
            if text.is_empty() {
                format!("HTTP {}", response.status)
            } else {
                text
            }
        })
}

/// Build the error for a status no caller handles.
pub(crate) fn unexpected(response: &Response) -> SyncError {
    SyncError::UnexpectedStatus {
        status: response.status,
        message: error_message(response),
    }
}

fn parse_token_response(response: &Response) -> SyncResult<TokenResponse> {
    if !response.is_success() {
        return Err(unexpected(response));
    }
    let token: TokenResponse = response.json()?;
    if token.access_token.is_empty() {
        return Err(SyncError::InvalidBody("empty access_token".to_string()));
    }
    Ok(token)
}

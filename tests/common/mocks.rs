//! Mock implementations for test fixtures.
//!
//! This module re-exports the mock implementations from
//! `chronicle::adapters::mock` and provides a builder for backend routes.

pub use chronicle::adapters::mock::{
    InMemoryCache, InMemoryStore, MockHttpClient, MockResponse, RecordedRequest,
    RecordingIndicator, StaticHistory,
};
pub use chronicle::traits::{HttpClient, HttpError, Response};

use chronicle::auth::api_url;
use serde_json::{json, Value};

use super::BASE;

/// Endpoint paths under `/backend-api`.
pub const EXCHANGE: &str = "/auth/extension-token";
pub const REFRESH: &str = "/auth/refresh";
pub const HISTORY: &str = "/chrome/history";
pub const VALIDATE: &str = "/chrome/test";
pub const STATS: &str = "/chrome/stats";

/// Full mocked URL for `path`.
pub fn url(path: &str) -> String {
    api_url(BASE, path)
}

/// Configuration for setting up mock backend responses.
pub struct MockBackend {
    client: MockHttpClient,
}

impl MockBackend {
    /// Routes on a new client.
    pub fn new() -> Self {
        Self::on(MockHttpClient::new())
    }

    /// Routes on an existing client.
    pub fn on(client: MockHttpClient) -> Self {
        Self { client }
    }

    /// Sticky JSON response for `path`.
    pub fn with_json(self, path: &str, status: u16, body: Value) -> Self {
        self.client
            .set_response(&url(path), MockResponse::json(status, body));
        self
    }

    /// Sticky empty response for `path`.
    pub fn with_status(self, path: &str, status: u16) -> Self {
        self.client.set_response(&url(path), MockResponse::status(status));
        self
    }

    /// One-shot empty response for `path`, served before the sticky one.
    pub fn then_status(self, path: &str, status: u16) -> Self {
        self.client.push_response(&url(path), MockResponse::status(status));
        self
    }

    /// Refresh answers with `access` and no new refresh token.
    pub fn refresh_grants(self, access: &str) -> Self {
        self.with_json(REFRESH, 200, json!({ "access_token": access }))
    }

    /// Refresh answers with the unauthorized status.
    pub fn refresh_denies(self) -> Self {
        self.with_json(REFRESH, 401, json!({ "detail": "Invalid refresh token" }))
    }

    /// Exchange answers with `{access, refresh}`.
    pub fn exchange_grants(self, access: &str, refresh: &str) -> Self {
        self.with_json(
            EXCHANGE,
            200,
            json!({ "access_token": access, "refresh_token": refresh }),
        )
    }

    /// Builds the configured MockHttpClient.
    pub fn build(self) -> MockHttpClient {
        self.client
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

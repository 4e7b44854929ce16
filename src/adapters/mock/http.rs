//! Mock HTTP client for testing.
//!
//! Responses are configured per URL. Queued responses are served once, in
//! order, before falling back to the sticky response for that URL and then
//! to the default.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::traits::{Headers, HttpClient, HttpError, Response};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method (GET or POST)
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Request body (for POST requests)
    pub body: Option<String>,
}

impl RecordedRequest {
    /// Bearer token carried by the request, if any.
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get("Authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a response with any status
    Success(Response),
    /// Return a transport error
    Error(HttpError),
}

impl MockResponse {
    /// A response with the given status and JSON body.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        MockResponse::Success(Response::new(status, Bytes::from(body.to_string())))
    }

    /// A response with the given status and an empty body.
    pub fn status(status: u16) -> Self {
        MockResponse::Success(Response::new(status, Bytes::new()))
    }
}

#[derive(Debug, Default)]
struct Routes {
    queued: HashMap<String, VecDeque<MockResponse>>,
    sticky: HashMap<String, MockResponse>,
    default: Option<MockResponse>,
}

/// Mock HTTP client for testing.
///
/// # Example
///
/// ```ignore
/// use chronicle::adapters::mock::{MockHttpClient, MockResponse};
///
/// let client = MockHttpClient::new();
/// client.push_response("https://api/chrome/history", MockResponse::status(401));
/// client.set_response("https://api/chrome/history", MockResponse::status(200));
///
/// // First call sees 401, every later call sees 200
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    routes: Arc<Mutex<Routes>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response returned for `url` whenever its queue is empty.
    ///
    /// Matched exactly first, then as a prefix.
    pub fn set_response(&self, url: &str, response: MockResponse) {
        lock(&self.routes)
            .sticky
            .insert(url.to_string(), response);
    }

    /// Queue a one-shot response for `url`.
    pub fn push_response(&self, url: &str, response: MockResponse) {
        lock(&self.routes)
            .queued
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// Set a default response for URLs without specific matches.
    pub fn set_default_response(&self, response: MockResponse) {
        lock(&self.routes).default = Some(response);
    }

    /// Delay every response, to hold requests in flight.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Recorded requests whose URL starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.url.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        lock(&self.requests).clear();
    }

    fn record_request(&self, method: &str, url: &str, headers: &Headers, body: Option<String>) {
        lock(&self.requests).push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body,
        });
    }

    fn next_response(&self, url: &str) -> Option<MockResponse> {
        let mut routes = lock(&self.routes);

        if let Some(response) = routes.queued.get_mut(url).and_then(VecDeque::pop_front) {
            return Some(response);
        }
        if let Some(response) = routes.sticky.get(url) {
            return Some(response.clone());
        }
        let prefixed = routes
            .sticky
            .iter()
            .filter(|(pattern, _)| url.starts_with(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, response)| response.clone());
        prefixed.or_else(|| routes.default.clone())
    }

    async fn respond(&self, url: &str) -> Result<Response, HttpError> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_response(url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("GET", url, headers, None);
        self.respond(url).await
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("POST", url, headers, Some(body.to_string()));
        self.respond(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::bearer_headers;

    #[tokio::test]
    async fn test_queued_responses_precede_sticky() {
        let client = MockHttpClient::new();
        client.push_response("https://example.com/a", MockResponse::status(401));
        client.set_response("https://example.com/a", MockResponse::status(200));

        let first = client.get("https://example.com/a", &Headers::new()).await.unwrap();
        let second = client.get("https://example.com/a", &Headers::new()).await.unwrap();
        let third = client.get("https://example.com/a", &Headers::new()).await.unwrap();

        assert_eq!(first.status, 401);
        assert_eq!(second.status, 200);
        assert_eq!(third.status, 200);
    }

    #[tokio::test]
    async fn test_prefix_match_prefers_longest() {
        let client = MockHttpClient::new();
        client.set_response("https://example.com/", MockResponse::status(500));
        client.set_response("https://example.com/chrome/", MockResponse::status(204));

        let response = client
            .get("https://example.com/chrome/stats", &Headers::new())
            .await
            .unwrap();
        assert_eq!(response.status, 204);
    }

    #[tokio::test]
    async fn test_error_and_missing_route() {
        let client = MockHttpClient::new();
        client.set_response(
            "https://example.com/down",
            MockResponse::Error(HttpError::ConnectionFailed("refused".to_string())),
        );

        assert!(matches!(
            client.get("https://example.com/down", &Headers::new()).await,
            Err(HttpError::ConnectionFailed(_))
        ));
        assert!(matches!(
            client.get("https://other.com", &Headers::new()).await,
            Err(HttpError::Other(_))
        ));
    }

    #[tokio::test]
    async fn test_records_requests_with_bearer() {
        let client = MockHttpClient::new();
        client.set_default_response(MockResponse::status(200));

        client
            .post("https://example.com/h", "[]", &bearer_headers("T1"))
            .await
            .unwrap();

        let requests = client.requests_to("https://example.com/h");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].body.as_deref(), Some("[]"));
        assert_eq!(requests[0].bearer(), Some("T1"));

        client.clear_requests();
        assert!(client.get_requests().is_empty());
    }
}

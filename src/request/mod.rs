//! Bearer-authenticated requests with a single refresh-and-reissue.
//!
//! Every authenticated call goes through [`RetryOnce`]. A call costs at
//! most one refresh and one reissue, whatever the server answers.

pub mod api;

use std::future::Future;
use std::sync::Arc;

use crate::auth::preview;
use crate::error::{SyncError, SyncResult};
use crate::session::SessionMachine;
use crate::traits::{HttpError, Response};

pub use api::{Activity, ChronicleApi, HistoryEntry, Stats};

/// Retry-once wrapper around a request parameterized by bearer token.
#[derive(Clone)]
pub struct RetryOnce {
    session: Arc<SessionMachine>,
}

impl RetryOnce {
    pub fn new(session: Arc<SessionMachine>) -> Self {
        Self { session }
    }

    /// Issue `issue` with the current token.
    ///
    /// On the unauthorized status the token is refreshed and the request is
    /// reissued exactly once; the reissue's response is returned whatever
    /// it is. A missing token or a failed refresh yields
    /// [`SyncError::Exhausted`] and deauthorizes the session. Transport
    /// errors are returned as-is.
    pub async fn call<F, Fut>(&self, issue: F) -> SyncResult<Response>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Response, HttpError>>,
    {
        let Some(token) = self.session.current_token().await? else {
            self.session.deauthorize("no access token").await;
            return Err(SyncError::Exhausted);
        };

        let response = issue(token.clone()).await?;
        if !response.is_unauthorized() {
            return self.finish(response).await;
        }

        tracing::info!("Request rejected with {}, refreshing", preview(&token));
        self.session.request_rejected();

        let fresh = match self.session.refresh_after_rejection(&token).await {
            Ok(fresh) => fresh,
            Err(e) if e.requires_reauth() => {
                self.session.deauthorize(&e.to_string()).await;
                return Err(SyncError::Exhausted);
            }
            Err(e) => return Err(e),
        };

        let response = issue(fresh).await?;
        if response.is_unauthorized() {
            tracing::warn!("Reissued request also rejected, not refreshing again");
        }
        self.finish(response).await
    }

    async fn finish(&self, response: Response) -> SyncResult<Response> {
        if response.is_success() {
            self.session.mark_healthy().await;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{InMemoryStore, MockHttpClient, MockResponse, RecordingIndicator};
    use crate::auth::{api_url, AuthorityClient, Credentials, TokenService};
    use crate::session::SessionState;
    use crate::traits::{bearer_headers, AttentionIndicator, HttpClient};

    const BASE: &str = "https://api.test";
    const TARGET: &str = "https://api.test/backend-api/chrome/stats";

    struct Fixture {
        http: MockHttpClient,
        store: InMemoryStore,
        indicator: RecordingIndicator,
        session: Arc<SessionMachine>,
        retry: RetryOnce,
    }

    async fn fixture(creds: Credentials) -> Fixture {
        let http = MockHttpClient::new();
        let store = InMemoryStore::with_credentials(creds);
        let indicator = RecordingIndicator::new();
        let authority = Arc::new(AuthorityClient::new(Arc::new(http.clone()), BASE));
        let tokens = Arc::new(TokenService::new(authority, Arc::new(store.clone())));
        let session = Arc::new(SessionMachine::new(
            Arc::new(store.clone()),
            tokens,
            Arc::new(indicator.clone()),
        ));
        session.initialize().await.unwrap();
        let retry = RetryOnce::new(Arc::clone(&session));
        Fixture {
            http,
            store,
            indicator,
            session,
            retry,
        }
    }

    async fn get(f: &Fixture) -> SyncResult<Response> {
        let http = f.http.clone();
        f.retry
            .call(|token| {
                let http = http.clone();
                async move { http.get(TARGET, &bearer_headers(&token)).await }
            })
            .await
    }

    #[tokio::test]
    async fn test_no_token_is_exhausted_without_network() {
        let f = fixture(Credentials::empty()).await;

        assert!(matches!(get(&f).await, Err(SyncError::Exhausted)));
        assert!(f.http.get_requests().is_empty());
        assert!(f.indicator.raised());
        assert_eq!(f.session.state(), SessionState::Unauthorized);
    }

    #[tokio::test]
    async fn test_success_passes_through_and_clears_indicator() {
        let f = fixture(Credentials::new("T1", Some("R1".to_string()))).await;
        f.http.set_response(TARGET, MockResponse::status(200));
        f.indicator.raise().await;

        let response = get(&f).await.unwrap();
        assert_eq!(response.status, 200);
        assert!(!f.indicator.raised());
        assert_eq!(f.http.get_requests()[0].bearer(), Some("T1"));
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_and_reissues_once() {
        let f = fixture(Credentials::new("T1", Some("R1".to_string()))).await;
        f.http.push_response(TARGET, MockResponse::status(401));
        f.http.set_response(TARGET, MockResponse::status(200));
        f.http.set_response(
            &api_url(BASE, "/auth/refresh"),
            MockResponse::json(200, serde_json::json!({"access_token": "T2"})),
        );

        let response = get(&f).await.unwrap();

        assert_eq!(response.status, 200);
        let calls = f.http.requests_to(TARGET);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].bearer(), Some("T2"));
        assert_eq!(
            f.store.snapshot(),
            Credentials::new("T2", Some("R1".to_string()))
        );
        assert_eq!(f.session.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_rejected_reissue_is_returned_without_second_refresh() {
        let f = fixture(Credentials::new("T1", Some("R1".to_string()))).await;
        f.http.set_response(TARGET, MockResponse::status(401));
        f.http.set_response(
            &api_url(BASE, "/auth/refresh"),
            MockResponse::json(200, serde_json::json!({"access_token": "T2"})),
        );

        let response = get(&f).await.unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(f.http.requests_to(TARGET).len(), 2);
        assert_eq!(f.http.requests_to(&api_url(BASE, "/auth/refresh")).len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_denied_is_exhausted() {
        let f = fixture(Credentials::new("T1", Some("R1".to_string()))).await;
        f.http.set_response(TARGET, MockResponse::status(401));
        f.http
            .set_response(&api_url(BASE, "/auth/refresh"), MockResponse::status(401));

        assert!(matches!(get(&f).await, Err(SyncError::Exhausted)));
        assert_eq!(f.http.requests_to(TARGET).len(), 1);
        assert!(f.store.snapshot().is_empty());
        assert!(f.indicator.raised());
        assert_eq!(f.session.state(), SessionState::Unauthorized);
    }

    #[tokio::test]
    async fn test_other_errors_do_not_refresh() {
        let f = fixture(Credentials::new("T1", Some("R1".to_string()))).await;
        f.http.push_response(TARGET, MockResponse::status(500));
        f.http.push_response(
            TARGET,
            MockResponse::Error(HttpError::ConnectionFailed("down".to_string())),
        );

        assert_eq!(get(&f).await.unwrap().status, 500);
        assert!(matches!(get(&f).await, Err(SyncError::Network(_))));
        assert!(f.http.requests_to(&api_url(BASE, "/auth/refresh")).is_empty());
        assert_eq!(f.session.state(), SessionState::Authenticated);
    }
}

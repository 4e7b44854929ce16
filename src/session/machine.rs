//! The session state machine.
//!
//! Holds the current [`SessionState`] of this context and the side effects
//! of moving between states. The state is re-derived from the Credential
//! Store on initialization and whenever a caller asks for revalidation.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::state::{SessionEvent, SessionState};
use crate::auth::{Credentials, TokenService};
use crate::error::{SyncError, SyncResult};
use crate::traits::{AttentionIndicator, CredentialStore};

/// Notified synchronously after every state change.
pub trait SessionObserver: Send + Sync {
    fn on_session_change(&self, from: SessionState, to: SessionState);
}

/// Derives and drives the authentication state of this context.
pub struct SessionMachine {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    indicator: Arc<dyn AttentionIndicator>,
    state: Mutex<SessionState>,
    observers: Mutex<Vec<Weak<dyn SessionObserver>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionMachine {
    /// Create a machine in `Unauthenticated`. Call [`initialize`](Self::initialize)
    /// before relying on the state.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenService>,
        indicator: Arc<dyn AttentionIndicator>,
    ) -> Self {
        Self {
            store,
            tokens,
            indicator,
            state: Mutex::new(SessionState::Unauthenticated),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Register an observer. Dropped observers are pruned on the next change.
    pub fn add_observer(&self, observer: Weak<dyn SessionObserver>) {
        lock(&self.observers).push(observer);
    }

    /// State as of the last transition.
    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Compute the state from the store's current contents.
    pub async fn initialize(&self) -> SyncResult<SessionState> {
        let creds = self.store.load().await?;
        self.tokens.adopt(&creds);
        let derived = SessionState::derive(&creds);
        tracing::info!(
            "Session initialized as {} ({})",
            derived,
            creds.token_preview()
        );
        self.set_state(derived);
        Ok(derived)
    }

    /// Re-read the store and correct the state if it went stale.
    ///
    /// `Unauthorized` is kept over an empty store so the re-authentication
    /// prompt survives until the user acts.
    pub async fn revalidate(&self) -> SyncResult<SessionState> {
        let creds = self.store.load().await?;
        self.tokens.adopt(&creds);
        let derived = SessionState::derive(&creds);
        let current = self.state();

        if current == SessionState::Unauthorized && derived == SessionState::Unauthenticated {
            return Ok(current);
        }
        if current != derived {
            tracing::info!("Revalidated session: {} -> {}", current, derived);
            self.set_state(derived);
        }
        Ok(derived)
    }

    /// The access token currently in the store.
    pub async fn current_token(&self) -> SyncResult<Option<String>> {
        let creds = self.store.load().await?;
        self.tokens.adopt(&creds);
        Ok(creds.access_token)
    }

    /// Exchange an identity assertion and move to `Authenticated`.
    pub async fn authenticate(&self, assertion: &str) -> SyncResult<Credentials> {
        let creds = self.tokens.authenticate(assertion).await?;
        self.signed_in().await;
        Ok(creds)
    }

    /// Record that this context installed fresh credentials.
    pub async fn signed_in(&self) {
        self.fire(SessionEvent::SignedIn);
        self.indicator.clear().await;
    }

    /// Record that a guarded request was rejected.
    pub fn request_rejected(&self) {
        self.fire(SessionEvent::RequestRejected);
    }

    /// Recover from the rejection of `rejected` and return the token to reissue with.
    ///
    /// On a terminal failure the store is already cleared and the session
    /// is left for the caller to deauthorize. On a transient failure the
    /// state is re-derived from the store.
    pub async fn refresh_after_rejection(&self, rejected: &str) -> SyncResult<String> {
        match self.tokens.refresh_rejected(rejected).await {
            Ok(creds) => match creds.access_token {
                Some(token) => {
                    self.fire(SessionEvent::RefreshSucceeded);
                    Ok(token)
                }
                None => Err(SyncError::RefreshDenied("refresh returned no token".to_string())),
            },
            Err(e) if e.requires_reauth() => Err(e),
            Err(e) => {
                if let Err(store_err) = self.revalidate().await {
                    tracing::warn!("Could not re-derive session: {}", store_err);
                }
                Err(e)
            }
        }
    }

    /// Attempt the refresh a lone stored refresh token is waiting for.
    pub async fn refresh_on_startup(&self) -> SyncResult<SessionState> {
        let creds = self.store.load().await?;
        match self.tokens.refresh(&creds).await {
            Ok(_) => {
                self.fire(SessionEvent::RefreshSucceeded);
                self.indicator.clear().await;
            }
            Err(e) if e.requires_reauth() => {
                self.deauthorize(&e.to_string()).await;
            }
            Err(e) => return Err(e),
        }
        Ok(self.state())
    }

    /// Clear the store, move to `Unauthorized`, and raise the indicator.
    pub async fn deauthorize(&self, reason: &str) {
        tracing::warn!("Deauthorizing session: {}", reason);
        if let Err(e) = self.tokens.clear().await {
            tracing::error!("Failed to clear credentials: {}", e);
        }
        self.fire(SessionEvent::RefreshFailed);
        self.indicator.raise().await;
    }

    /// A guarded request completed successfully.
    pub async fn mark_healthy(&self) {
        if self.indicator.is_raised().await {
            self.indicator.clear().await;
        }
    }

    /// Another context stored an access token.
    pub fn external_sign_in(&self) {
        self.fire(SessionEvent::ExternalSignIn);
    }

    /// Another context removed the access token.
    pub fn external_sign_out(&self) {
        self.tokens.drop_cache();
        self.fire(SessionEvent::ExternalSignOut);
    }

    fn fire(&self, event: SessionEvent) {
        let current = self.state();
        match current.apply(event) {
            Some(next) => self.set_state(next),
            None => tracing::debug!("Ignoring {:?} in state {}", event, current),
        }
    }

    fn set_state(&self, next: SessionState) {
        let previous = {
            let mut state = lock(&self.state);
            std::mem::replace(&mut *state, next)
        };
        if previous == next {
            return;
        }
        tracing::info!("Session state: {} -> {}", previous, next);

        let observers: Vec<Arc<dyn SessionObserver>> = {
            let mut observers = lock(&self.observers);
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in observers {
            observer.on_session_change(previous, next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{InMemoryStore, MockHttpClient, MockResponse, RecordingIndicator};
    use crate::auth::{api_url, AuthorityClient};

    const BASE: &str = "https://api.test";

    #[derive(Default)]
    struct Transitions(Mutex<Vec<(SessionState, SessionState)>>);

    impl SessionObserver for Transitions {
        fn on_session_change(&self, from: SessionState, to: SessionState) {
            lock(&self.0).push((from, to));
        }
    }

    struct Fixture {
        http: MockHttpClient,
        store: InMemoryStore,
        indicator: RecordingIndicator,
        machine: SessionMachine,
    }

    fn fixture(creds: Credentials) -> Fixture {
        let http = MockHttpClient::new();
        let store = InMemoryStore::with_credentials(creds);
        let indicator = RecordingIndicator::new();
        let authority = Arc::new(AuthorityClient::new(Arc::new(http.clone()), BASE));
        let tokens = Arc::new(TokenService::new(authority, Arc::new(store.clone())));
        let machine = SessionMachine::new(
            Arc::new(store.clone()),
            tokens,
            Arc::new(indicator.clone()),
        );
        Fixture {
            http,
            store,
            indicator,
            machine,
        }
    }

    #[tokio::test]
    async fn test_initialize_reads_store() {
        let f = fixture(Credentials::new("T1", Some("R1".to_string())));
        assert_eq!(f.machine.state(), SessionState::Unauthenticated);
        assert_eq!(
            f.machine.initialize().await.unwrap(),
            SessionState::Authenticated
        );
        assert_eq!(f.machine.tokens().cached_token().as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_observers_see_each_change_once() {
        let f = fixture(Credentials::new("T1", None));
        let observer = Arc::new(Transitions::default());
        let weak: Weak<dyn SessionObserver> = Arc::downgrade(&observer) as Weak<dyn SessionObserver>;
        f.machine.add_observer(weak);

        f.machine.initialize().await.unwrap();
        f.machine.initialize().await.unwrap();
        f.machine.request_rejected();

        assert_eq!(
            *lock(&observer.0),
            vec![
                (SessionState::Unauthenticated, SessionState::Authenticated),
                (SessionState::Authenticated, SessionState::Refreshing),
            ]
        );
    }

    #[tokio::test]
    async fn test_revalidate_corrects_stale_state() {
        let f = fixture(Credentials::empty());
        f.machine.initialize().await.unwrap();
        f.store.foreign_handle().save(&Credentials::new("T1", None)).await.unwrap();

        assert_eq!(
            f.machine.revalidate().await.unwrap(),
            SessionState::Authenticated
        );
    }

    #[tokio::test]
    async fn test_deauthorize_clears_and_raises() {
        let f = fixture(Credentials::new("T1", Some("R1".to_string())));
        f.machine.initialize().await.unwrap();

        f.machine.deauthorize("test").await;

        assert_eq!(f.machine.state(), SessionState::Unauthorized);
        assert!(f.store.snapshot().is_empty());
        assert!(f.indicator.raised());

        // An empty store does not erase the prompt
        assert_eq!(
            f.machine.revalidate().await.unwrap(),
            SessionState::Unauthorized
        );
    }

    #[tokio::test]
    async fn test_transient_refresh_failure_rederives() {
        let f = fixture(Credentials::new("T1", Some("R1".to_string())));
        f.http.set_response(
            &api_url(BASE, "/auth/refresh"),
            MockResponse::Error(crate::traits::HttpError::Timeout("slow".to_string())),
        );
        f.machine.initialize().await.unwrap();
        f.machine.request_rejected();

        let err = f.machine.refresh_after_rejection("T1").await.unwrap_err();

        assert!(matches!(err, SyncError::Network(_)));
        assert_eq!(f.machine.state(), SessionState::Authenticated);
        assert_eq!(f.store.snapshot().access_token.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_startup_refresh_for_lone_refresh_token() {
        let lone = Credentials {
            access_token: None,
            refresh_token: Some("R1".to_string()),
        };
        let f = fixture(lone);
        f.http.set_response(
            &api_url(BASE, "/auth/refresh"),
            MockResponse::json(200, serde_json::json!({"access_token": "T2"})),
        );

        assert_eq!(f.machine.initialize().await.unwrap(), SessionState::Refreshing);
        assert_eq!(
            f.machine.refresh_on_startup().await.unwrap(),
            SessionState::Authenticated
        );
        assert_eq!(
            f.store.snapshot(),
            Credentials::new("T2", Some("R1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_startup_refresh_denied_is_unauthorized() {
        let lone = Credentials {
            access_token: None,
            refresh_token: Some("R1".to_string()),
        };
        let f = fixture(lone);
        f.http
            .set_response(&api_url(BASE, "/auth/refresh"), MockResponse::status(401));

        f.machine.initialize().await.unwrap();
        assert_eq!(
            f.machine.refresh_on_startup().await.unwrap(),
            SessionState::Unauthorized
        );
        assert!(f.store.snapshot().is_empty());
        assert!(f.indicator.raised());
    }
}

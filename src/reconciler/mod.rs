//! Folding credentials from outside this context into its session.
//!
//! Three sources can disagree at initialization. Precedence, highest first:
//!
//! 1. the Credential Store (shared, canonical)
//! 2. an offer carried by the URL this context was opened with
//! 3. the purely local token cache, only after the authority accepts it
//!
//! After initialization the reconciler follows the store's change
//! notifications and applies the [`StoreTransition`] table to every write
//! made by another context.

pub mod cache;
pub mod offer;
pub mod transition;

use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::auth::{AuthorityClient, Credentials};
use crate::error::{SyncError, SyncResult};
use crate::session::SessionMachine;
use crate::traits::CredentialChange;

pub use cache::{FileLocalCache, LocalCache};
pub use offer::{ExternalOffer, OfferOrigin, StaticLocation};
pub use transition::StoreTransition;

/// What happened to a URL-borne offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    NoOffer,
    /// Written to the store; the session is authenticated with it.
    Applied,
    /// Already consumed by some context.
    AlreadyConsumed,
    /// The store already held an access token.
    Superseded,
    /// The offer did not parse.
    Discarded,
}

/// Which source the session was initialized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSource {
    Store,
    /// Only a refresh token is stored.
    AwaitingRefresh,
    Offer,
    LocalCache,
    Nothing,
}

/// Reconciles store changes, URL offers, and the local cache.
pub struct Reconciler {
    session: Arc<SessionMachine>,
    authority: Arc<AuthorityClient>,
    cache: Arc<dyn LocalCache>,
}

impl Reconciler {
    pub fn new(
        session: Arc<SessionMachine>,
        authority: Arc<AuthorityClient>,
        cache: Arc<dyn LocalCache>,
    ) -> Self {
        Self {
            session,
            authority,
            cache,
        }
    }

    /// Derive the session for a cold start, applying source precedence.
    pub async fn initialize(&self, origin: Option<&dyn OfferOrigin>) -> SyncResult<InitSource> {
        let store = self.session.store();
        let creds = store.load().await?;
        self.session.initialize().await?;

        if let Some(token) = creds.access_token.as_deref() {
            self.cache.store(token).await;
            if let Some(origin) = origin {
                // Consumed and scrubbed even though the store wins
                self.accept_offer(origin).await?;
            }
            return Ok(InitSource::Store);
        }
        if creds.is_awaiting_refresh() {
            return Ok(InitSource::AwaitingRefresh);
        }

        if let Some(origin) = origin {
            if self.accept_offer(origin).await? == OfferOutcome::Applied {
                return Ok(InitSource::Offer);
            }
        }

        if self.adopt_local_cache().await? {
            return Ok(InitSource::LocalCache);
        }
        Ok(InitSource::Nothing)
    }

    async fn adopt_local_cache(&self) -> SyncResult<bool> {
        let Some(token) = self.cache.load().await else {
            return Ok(false);
        };

        match self.authority.validate(&token).await {
            Ok(true) => {
                tracing::info!("Local token cache accepted by the authority");
                let creds = Credentials::new(token, None);
                self.session.tokens().install(&creds, None).await?;
                self.session.signed_in().await;
                Ok(true)
            }
            Ok(false) => {
                tracing::info!("Local token cache rejected, discarding");
                self.cache.clear().await;
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("Could not revalidate local token cache: {}", e);
                Ok(false)
            }
        }
    }

    /// Consume the offer carried by `origin`, if any.
    ///
    /// Every offer found is scrubbed from its origin, whatever the outcome.
    pub async fn accept_offer(&self, origin: &dyn OfferOrigin) -> SyncResult<OfferOutcome> {
        let Some(url) = origin.current() else {
            return Ok(OfferOutcome::NoOffer);
        };

        let offer = match ExternalOffer::from_url(&url) {
            Ok(Some(offer)) => offer,
            Ok(None) => return Ok(OfferOutcome::NoOffer),
            Err(SyncError::MalformedOffer(reason)) => {
                tracing::warn!("Discarding malformed credential offer: {}", reason);
                origin.replace(ExternalOffer::scrub(&url));
                return Ok(OfferOutcome::Discarded);
            }
            Err(e) => return Err(e),
        };

        let store = self.session.store();
        let outcome = if !store.mark_offer_consumed(&offer.fingerprint()).await? {
            tracing::info!("Credential offer already consumed, ignoring");
            OfferOutcome::AlreadyConsumed
        } else if store.load().await?.has_token() {
            tracing::info!("Store already holds a token, ignoring credential offer");
            OfferOutcome::Superseded
        } else {
            let creds = Credentials::new(offer.token.clone(), None);
            self.session
                .tokens()
                .install(&creds, offer.profile.as_ref())
                .await?;
            self.session.signed_in().await;
            self.cache.store(&offer.token).await;
            tracing::info!("Applied credential offer ({})", creds.token_preview());
            OfferOutcome::Applied
        };

        origin.replace(ExternalOffer::scrub(&url));
        Ok(outcome)
    }

    /// Keep `token` in the local cache after a sign-in made by this context.
    pub async fn remember(&self, token: &str) {
        self.cache.store(token).await;
    }

    /// Drop the local cache after a sign-out made by this context.
    pub async fn forget(&self) {
        self.cache.clear().await;
    }

    /// Apply one store change. Changes written by this context are ignored.
    pub async fn apply_change(&self, change: &CredentialChange) -> StoreTransition {
        if change.is_from(self.session.store().context_id()) {
            return StoreTransition::Unchanged;
        }

        let transition = StoreTransition::classify(&change.old, &change.new);
        match &transition {
            StoreTransition::SignedIn { token } => {
                tracing::info!("External sign-in observed");
                self.session.tokens().adopt(&change.new);
                self.session.external_sign_in();
                self.cache.store(token).await;
            }
            StoreTransition::SignedOut => {
                tracing::info!("External sign-out observed");
                self.session.external_sign_out();
                self.cache.clear().await;
            }
            StoreTransition::Rotated { token } => {
                tracing::debug!("Adopting token rotated by another context");
                self.session.tokens().adopt(&change.new);
                self.session.external_sign_in();
                self.cache.store(token).await;
            }
            StoreTransition::Unchanged => {}
        }
        transition
    }

    /// Follow store changes until the channel closes.
    ///
    /// Subscribe before [`initialize`](Self::initialize) so no write falls
    /// between the two.
    pub fn spawn(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<CredentialChange>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        self.apply_change(&change).await;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("Missed {} store changes, re-deriving session", missed);
                        if let Err(e) = self.session.revalidate().await {
                            tracing::error!("Failed to re-derive session: {}", e);
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Store change stream closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{
        InMemoryCache, InMemoryStore, MockHttpClient, MockResponse, RecordingIndicator,
    };
    use crate::auth::{api_url, TokenService};
    use crate::session::SessionState;
    use crate::traits::CredentialStore;

    const BASE: &str = "https://api.test";

    struct Fixture {
        http: MockHttpClient,
        store: InMemoryStore,
        cache: InMemoryCache,
        session: Arc<SessionMachine>,
        reconciler: Reconciler,
    }

    fn fixture(creds: Credentials, cache: InMemoryCache) -> Fixture {
        let http = MockHttpClient::new();
        let store = InMemoryStore::with_credentials(creds);
        let authority = Arc::new(AuthorityClient::new(Arc::new(http.clone()), BASE));
        let tokens = Arc::new(TokenService::new(
            Arc::clone(&authority),
            Arc::new(store.clone()),
        ));
        let session = Arc::new(SessionMachine::new(
            Arc::new(store.clone()),
            tokens,
            Arc::new(RecordingIndicator::new()),
        ));
        let reconciler = Reconciler::new(
            Arc::clone(&session),
            authority,
            Arc::new(cache.clone()),
        );
        Fixture {
            http,
            store,
            cache,
            session,
            reconciler,
        }
    }

    #[tokio::test]
    async fn test_own_writes_are_ignored() {
        let f = fixture(Credentials::empty(), InMemoryCache::default());
        let mut rx = f.store.subscribe();
        f.store.save(&Credentials::new("T1", None)).await.unwrap();
        let change = rx.recv().await.unwrap();

        assert_eq!(
            f.reconciler.apply_change(&change).await,
            StoreTransition::Unchanged
        );
        assert_eq!(f.session.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_foreign_sign_in_and_out() {
        let f = fixture(Credentials::empty(), InMemoryCache::default());
        f.session.initialize().await.unwrap();
        let popup = f.store.foreign_handle();
        let mut rx = f.store.subscribe();

        popup.save(&Credentials::new("T1", Some("R1".to_string()))).await.unwrap();
        let change = rx.recv().await.unwrap();
        f.reconciler.apply_change(&change).await;
        assert_eq!(f.session.state(), SessionState::Authenticated);
        assert_eq!(f.cache.peek().as_deref(), Some("T1"));

        popup.clear().await.unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(
            f.reconciler.apply_change(&change).await,
            StoreTransition::SignedOut
        );
        assert_eq!(f.session.state(), SessionState::Unauthenticated);
        assert!(f.session.tokens().cached_token().is_none());
        assert_eq!(f.cache.peek(), None);
    }

    #[tokio::test]
    async fn test_offer_applied_once() {
        let f = fixture(Credentials::empty(), InMemoryCache::default());
        f.session.initialize().await.unwrap();
        let origin = StaticLocation::parse("https://dash.test/?token=T1").unwrap();

        assert_eq!(
            f.reconciler.accept_offer(&origin).await.unwrap(),
            OfferOutcome::Applied
        );
        assert_eq!(f.store.snapshot(), Credentials::new("T1", None));
        assert_eq!(origin.current().unwrap().as_str(), "https://dash.test/");
        assert_eq!(f.session.state(), SessionState::Authenticated);

        // Logout, then the same link shows up again
        f.store.clear().await.unwrap();
        let replay = StaticLocation::parse("https://dash.test/?token=T1").unwrap();
        assert_eq!(
            f.reconciler.accept_offer(&replay).await.unwrap(),
            OfferOutcome::AlreadyConsumed
        );
        assert!(f.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_store_beats_offer() {
        let f = fixture(
            Credentials::new("T0", Some("R0".to_string())),
            InMemoryCache::default(),
        );
        let origin = StaticLocation::parse("https://dash.test/?token=T1").unwrap();

        assert_eq!(
            f.reconciler.initialize(Some(&origin)).await.unwrap(),
            InitSource::Store
        );
        assert_eq!(f.store.snapshot().access_token.as_deref(), Some("T0"));
        assert_eq!(origin.current().unwrap().as_str(), "https://dash.test/");
    }

    #[tokio::test]
    async fn test_malformed_offer_is_discarded() {
        let f = fixture(Credentials::empty(), InMemoryCache::default());
        let origin = StaticLocation::parse("https://dash.test/?token=T1&user=%7Bbad").unwrap();

        assert_eq!(
            f.reconciler.accept_offer(&origin).await.unwrap(),
            OfferOutcome::Discarded
        );
        assert!(f.store.snapshot().is_empty());
        assert_eq!(origin.current().unwrap().as_str(), "https://dash.test/");
    }

    #[tokio::test]
    async fn test_local_cache_requires_revalidation() {
        let f = fixture(Credentials::empty(), InMemoryCache::with_token("C1"));
        f.http
            .set_response(&api_url(BASE, "/chrome/test"), MockResponse::status(200));

        assert_eq!(
            f.reconciler.initialize(None).await.unwrap(),
            InitSource::LocalCache
        );
        assert_eq!(f.store.snapshot().access_token.as_deref(), Some("C1"));
        assert_eq!(f.http.get_requests()[0].bearer(), Some("C1"));
    }

    #[tokio::test]
    async fn test_rejected_local_cache_is_dropped() {
        let f = fixture(Credentials::empty(), InMemoryCache::with_token("C1"));
        f.http
            .set_response(&api_url(BASE, "/chrome/test"), MockResponse::status(401));

        assert_eq!(
            f.reconciler.initialize(None).await.unwrap(),
            InitSource::Nothing
        );
        assert!(f.store.snapshot().is_empty());
        assert_eq!(f.cache.peek(), None);
        assert_eq!(f.session.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_lone_refresh_token_waits_for_refresh() {
        let lone = Credentials {
            access_token: None,
            refresh_token: Some("R1".to_string()),
        };
        let f = fixture(lone, InMemoryCache::with_token("C1"));

        assert_eq!(
            f.reconciler.initialize(None).await.unwrap(),
            InitSource::AwaitingRefresh
        );
        assert_eq!(f.session.state(), SessionState::Refreshing);
        assert!(f.http.get_requests().is_empty());
    }
}

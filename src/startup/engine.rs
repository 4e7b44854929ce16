//! Wiring for one running context.
//!
//! [`Engine`] builds the session machine, the guarded API client, the
//! collector, the scheduler, and the reconciler from an [`EngineParts`]
//! bundle, so tests can swap every adapter for a mock.

use std::future::Future;
use std::sync::Arc;

use super::config::EngineConfig;
use crate::adapters::file_indicator::FileIndicator;
use crate::adapters::file_store::FileCredentialStore;
use crate::adapters::history_file::JsonHistorySource;
use crate::adapters::reqwest_http::ReqwestHttpClient;
use crate::auth::{AuthorityClient, TokenService};
use crate::error::SyncResult;
use crate::reconciler::{FileLocalCache, InitSource, LocalCache, OfferOrigin, Reconciler};
use crate::request::{ChronicleApi, RetryOnce};
use crate::session::{SessionMachine, SessionObserver, SessionState};
use crate::sync::{HistoryCollector, SyncScheduler};
use crate::traits::{AttentionIndicator, CredentialStore, HistorySource, HttpClient};

/// The adapters an engine runs on.
#[derive(Clone)]
pub struct EngineParts {
    pub store: Arc<dyn CredentialStore>,
    pub http: Arc<dyn HttpClient>,
    pub history: Arc<dyn HistorySource>,
    pub indicator: Arc<dyn AttentionIndicator>,
    pub cache: Arc<dyn LocalCache>,
}

impl EngineParts {
    /// Production adapters for `config`. The store is watched for foreign writes.
    pub fn from_config(config: &EngineConfig) -> SyncResult<Self> {
        let store = FileCredentialStore::open(config.store_path())?;
        store.watch()?;

        Ok(Self {
            store: Arc::new(store),
            http: Arc::new(ReqwestHttpClient::new()),
            history: Arc::new(JsonHistorySource::new(&config.history_file)),
            indicator: Arc::new(FileIndicator::new(config.indicator_path())),
            cache: Arc::new(FileLocalCache::new(config.cache_path())),
        })
    }
}

/// A fully wired context.
pub struct Engine {
    config: EngineConfig,
    authority: Arc<AuthorityClient>,
    session: Arc<SessionMachine>,
    api: ChronicleApi,
    collector: Arc<HistoryCollector>,
    scheduler: Arc<SyncScheduler>,
    reconciler: Arc<Reconciler>,
    indicator: Arc<dyn AttentionIndicator>,
}

impl Engine {
    pub fn new(config: EngineConfig, parts: EngineParts) -> Self {
        let authority = Arc::new(AuthorityClient::new(
            Arc::clone(&parts.http),
            config.backend_url.clone(),
        ));
        let tokens = Arc::new(TokenService::new(
            Arc::clone(&authority),
            Arc::clone(&parts.store),
        ));
        let session = Arc::new(SessionMachine::new(
            Arc::clone(&parts.store),
            tokens,
            Arc::clone(&parts.indicator),
        ));
        let api = ChronicleApi::new(
            Arc::clone(&parts.http),
            config.backend_url.clone(),
            RetryOnce::new(Arc::clone(&session)),
        );
        let collector = Arc::new(HistoryCollector::new(
            parts.history,
            api.clone(),
            Arc::clone(&session),
            config.window,
        ));
        let scheduler = Arc::new(SyncScheduler::new(
            Arc::clone(&collector),
            config.sync_interval,
        ));
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&session),
            Arc::clone(&authority),
            parts.cache,
        ));

        Self {
            config,
            authority,
            session,
            api,
            collector,
            scheduler,
            reconciler,
            indicator: parts.indicator,
        }
    }

    /// Engine on the production adapters.
    pub fn from_config(config: EngineConfig) -> SyncResult<Self> {
        let parts = EngineParts::from_config(&config)?;
        Ok(Self::new(config, parts))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn authority(&self) -> &Arc<AuthorityClient> {
        &self.authority
    }

    pub fn session(&self) -> &Arc<SessionMachine> {
        &self.session
    }

    pub fn api(&self) -> &ChronicleApi {
        &self.api
    }

    pub fn collector(&self) -> &Arc<HistoryCollector> {
        &self.collector
    }

    pub fn scheduler(&self) -> &Arc<SyncScheduler> {
        &self.scheduler
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn indicator(&self) -> &Arc<dyn AttentionIndicator> {
        &self.indicator
    }

    /// Let session transitions start and stop the scheduler.
    ///
    /// Only the long-running context does this; one-shot commands never
    /// arm a timer.
    pub fn attach_scheduler(&self) {
        let scheduler = Arc::clone(&self.scheduler);
        let observer: Arc<dyn SessionObserver> = scheduler;
        self.session.add_observer(Arc::downgrade(&observer));
    }

    /// Derive the session from every credential source.
    ///
    /// A lone refresh token is spent immediately. A transport failure
    /// there leaves the session in `Refreshing` and is only logged; the
    /// next collection pass retries it.
    pub async fn cold_start(&self, origin: Option<&dyn OfferOrigin>) -> SyncResult<SessionState> {
        let source = self.reconciler.initialize(origin).await?;
        tracing::info!(
            "Session initialized from {:?}: {}",
            source,
            self.session.state()
        );

        if source == InitSource::AwaitingRefresh {
            if let Err(e) = self.session.refresh_on_startup().await {
                tracing::warn!("Startup refresh failed [{}]: {}", e.error_code(), e);
            }
        }
        Ok(self.session.state())
    }

    /// Sign in with an identity assertion.
    pub async fn sign_in(&self, assertion: &str) -> SyncResult<SessionState> {
        let creds = self.session.authenticate(assertion).await?;
        if let Some(token) = creds.access_token.as_deref() {
            self.reconciler.remember(token).await;
        }
        Ok(self.session.state())
    }

    /// Sign out everywhere: clear the store and the local cache.
    pub async fn sign_out(&self) -> SyncResult<()> {
        self.session.tokens().clear().await?;
        self.reconciler.forget().await;
        self.session.external_sign_out();
        Ok(())
    }

    /// Run until `shutdown` resolves, following store changes and syncing
    /// on schedule while authenticated.
    pub async fn run<F>(&self, origin: Option<&dyn OfferOrigin>, shutdown: F) -> SyncResult<()>
    where
        F: Future<Output = ()>,
    {
        self.attach_scheduler();

        let changes = self.session.store().subscribe();
        let follower = Arc::clone(&self.reconciler).spawn(changes);

        let state = self.cold_start(origin).await?;
        // Refreshing here means the startup refresh could not reach the
        // authority; passes keep retrying it.
        if matches!(state, SessionState::Authenticated | SessionState::Refreshing)
            && !self.scheduler.is_running()
        {
            self.scheduler.start();
        }
        if state.needs_sign_in() {
            tracing::info!("Waiting for sign-in from another context");
        }

        shutdown.await;

        tracing::info!("Shutting down");
        self.scheduler.stop();
        follower.abort();
        Ok(())
    }
}

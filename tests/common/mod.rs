//! Common test utilities for integration tests.
//!
//! This module provides reusable fixtures and a [`TestContext`] that wires
//! an [`Engine`] onto in-memory adapters, so a test can simulate several
//! contexts sharing one Credential Store.
//!
//! # Example
//!
//! ```ignore
//! let daemon = TestContext::new(test_credentials());
//! let popup = daemon.sibling();
//! popup.engine.sign_out().await?;
//! ```

#![allow(dead_code)]

pub mod mocks;

pub use mocks::*;

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use chronicle::auth::Credentials;
use chronicle::startup::{Engine, EngineConfig, EngineParts};
use chronicle::traits::HistoryItem;

/// Backend origin used by every mocked context.
pub const BASE: &str = "https://api.test";

/// Interval used by scheduler tests.
pub const TEST_INTERVAL: Duration = Duration::from_secs(3600);

/// Credentials holding both tokens.
pub fn test_credentials() -> Credentials {
    Credentials::new("T1", Some("R1".to_string()))
}

/// Credentials holding only a refresh token.
pub fn refresh_only_credentials() -> Credentials {
    Credentials {
        access_token: None,
        refresh_token: Some("R1".to_string()),
    }
}

/// `count` history items visited within the last hour, newest first.
pub fn recent_items(count: usize) -> Vec<HistoryItem> {
    (0..count)
        .map(|i| HistoryItem {
            url: format!("https://docs.example.com/page/{}", i),
            title: Some(format!("Page {}", i)),
            last_visit_time: Utc::now() - ChronoDuration::minutes(i as i64 + 1),
            visit_count: Some(i as u32 + 1),
        })
        .collect()
}

/// One context (daemon, popup, dashboard) on in-memory adapters.
pub struct TestContext {
    pub store: InMemoryStore,
    pub http: MockHttpClient,
    pub history: StaticHistory,
    pub indicator: RecordingIndicator,
    pub cache: InMemoryCache,
    pub engine: Engine,
}

impl TestContext {
    /// A context over a fresh store holding `creds`.
    pub fn new(creds: Credentials) -> Self {
        Self::on_store(InMemoryStore::with_credentials(creds), MockHttpClient::new())
    }

    /// A context over an empty store.
    pub fn empty() -> Self {
        Self::new(Credentials::empty())
    }

    /// Another context sharing this one's store and backend.
    pub fn sibling(&self) -> Self {
        Self::on_store(self.store.foreign_handle(), self.http.clone())
    }

    fn on_store(store: InMemoryStore, http: MockHttpClient) -> Self {
        let history = StaticHistory::new(recent_items(3));
        let indicator = RecordingIndicator::new();
        let cache = InMemoryCache::default();
        let config = EngineConfig::with_home("/tmp/chronicle-integration")
            .with_backend_url(BASE)
            .with_sync_interval(TEST_INTERVAL);

        let engine = Engine::new(
            config,
            EngineParts {
                store: Arc::new(store.clone()),
                http: Arc::new(http.clone()),
                history: Arc::new(history.clone()),
                indicator: Arc::new(indicator.clone()),
                cache: Arc::new(cache.clone()),
            },
        );

        Self {
            store,
            http,
            history,
            indicator,
            cache,
            engine,
        }
    }

    /// Attach the scheduler and start following store changes, as `run` does.
    pub fn follow_store(&self) -> tokio::task::JoinHandle<()> {
        self.engine.attach_scheduler();
        let changes = self.engine.session().store().subscribe();
        Arc::clone(self.engine.reconciler()).spawn(changes)
    }
}

/// Let spawned tasks run to their next suspension point.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Poll `condition` on the real clock until it holds or two seconds pass.
///
/// For flows that touch the blocking pool, where yielding alone is not
/// enough.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

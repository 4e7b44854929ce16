//! One collection pass: read recent history and submit it.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::SyncResult;
use crate::request::{ChronicleApi, HistoryEntry};
use crate::session::{SessionMachine, SessionState};
use crate::traits::{CredentialStore, HistoryItem, HistoryQuery, HistorySource};

/// Bounds of the history collected in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionWindow {
    pub days: u32,
    pub max_items: usize,
}

impl Default for CollectionWindow {
    fn default() -> Self {
        Self {
            days: 7,
            max_items: 10,
        }
    }
}

impl CollectionWindow {
    fn query(&self) -> HistoryQuery {
        HistoryQuery {
            start_time: Utc::now() - ChronoDuration::days(i64::from(self.days)),
            max_results: self.max_items,
        }
    }
}

/// Why a pass did not submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another pass was still running.
    Overlap,
    /// No access token, even after re-reading the store.
    NotAuthenticated(SessionState),
    /// The window was empty.
    NothingCollected,
}

/// Result of a collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The batch was accepted.
    Submitted(usize),
    Skipped(SkipReason),
    /// The batch was sent but the session changed while it was in flight.
    Discarded,
}

impl From<&HistoryItem> for HistoryEntry {
    fn from(item: &HistoryItem) -> Self {
        HistoryEntry {
            link: item.url.clone(),
            title: item.title.clone().unwrap_or_default(),
            visited_at: item.last_visit_time.to_rfc3339(),
            visit_count: item.visit_count.unwrap_or(1).max(1),
        }
    }
}

/// Runs collection passes. At most one pass runs at a time.
pub struct HistoryCollector {
    source: Arc<dyn HistorySource>,
    api: ChronicleApi,
    session: Arc<SessionMachine>,
    store: Arc<dyn CredentialStore>,
    window: CollectionWindow,
    in_flight: Mutex<()>,
}

impl HistoryCollector {
    pub fn new(
        source: Arc<dyn HistorySource>,
        api: ChronicleApi,
        session: Arc<SessionMachine>,
        window: CollectionWindow,
    ) -> Self {
        let store = Arc::clone(session.store());
        Self {
            source,
            api,
            session,
            store,
            window,
            in_flight: Mutex::new(()),
        }
    }

    pub fn window(&self) -> CollectionWindow {
        self.window
    }

    /// Run one pass.
    ///
    /// If the session is not `Authenticated`, the store is re-read before
    /// deciding to skip. A record holding only a refresh token is refreshed
    /// first; a transport failure there fails the pass so the next interval
    /// tries again. Errors from the submission are returned; an
    /// `Exhausted` has already deauthorized the session.
    pub async fn run_pass(&self) -> SyncResult<PassOutcome> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("Collection pass already running, skipping");
            return Ok(PassOutcome::Skipped(SkipReason::Overlap));
        };

        let mut state = self.session.state();
        if !state.is_authenticated() {
            state = self.session.revalidate().await?;
            if state == SessionState::Refreshing {
                // A lone refresh token left by a failed startup refresh
                state = self.session.refresh_on_startup().await?;
            }
            if !state.is_authenticated() {
                tracing::debug!("Skipping collection pass, session is {}", state);
                return Ok(PassOutcome::Skipped(SkipReason::NotAuthenticated(state)));
            }
        }

        let items = self.source.search(&self.window.query()).await?;
        let entries: Vec<HistoryEntry> = items.iter().map(HistoryEntry::from).collect();
        if entries.is_empty() {
            tracing::debug!("No history in the last {} days", self.window.days);
            return Ok(PassOutcome::Skipped(SkipReason::NothingCollected));
        }

        self.api.submit_history(&entries).await?;

        if !self.session.state().is_authenticated() {
            tracing::info!("Session changed during submission, discarding pass result");
            return Ok(PassOutcome::Discarded);
        }
        self.store.set_history_length(entries.len()).await?;
        Ok(PassOutcome::Submitted(entries.len()))
    }
}

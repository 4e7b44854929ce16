//! Recurring collection, started and stopped by session transitions.
//!
//! The timer task is the only thing `stop` cancels. Each tick spawns its
//! pass as a separate task, so a pass already talking to the backend runs
//! to completion after the timer is gone.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::collector::{HistoryCollector, PassOutcome};
use crate::session::{SessionObserver, SessionState};

/// Default time between collection passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Owns the single recurring collection timer of this process.
pub struct SyncScheduler {
    collector: Arc<HistoryCollector>,
    interval: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    passes_started: Arc<AtomicUsize>,
}

impl SyncScheduler {
    pub fn new(collector: Arc<HistoryCollector>, interval: Duration) -> Self {
        Self {
            collector,
            interval,
            timer: Mutex::new(None),
            passes_started: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Arm the timer, replacing any existing one, and run a pass now.
    ///
    /// Must be called from within a tokio runtime; outside one it logs and
    /// does nothing.
    pub fn start(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Cannot start sync scheduler outside a tokio runtime");
            return;
        };

        let mut timer = self.timer();
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let collector = Arc::clone(&self.collector);
        let passes_started = Arc::clone(&self.passes_started);
        let interval = self.interval;
        tracing::info!("Starting sync scheduler (every {:?})", interval);

        *timer = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                passes_started.fetch_add(1, Ordering::SeqCst);
                let collector = Arc::clone(&collector);
                tokio::spawn(async move {
                    match collector.run_pass().await {
                        Ok(PassOutcome::Submitted(n)) => {
                            tracing::info!("Collection pass submitted {} entries", n)
                        }
                        Ok(outcome) => tracing::debug!("Collection pass: {:?}", outcome),
                        Err(e) if e.requires_reauth() => {
                            tracing::warn!("Collection pass needs re-authentication: {}", e)
                        }
                        Err(e) => tracing::warn!(
                            "Collection pass failed [{}], retrying next interval: {}",
                            e.error_code(),
                            e
                        ),
                    }
                });
            }
        }));
    }

    /// Cancel the timer. In-flight passes are left to finish.
    pub fn stop(&self) {
        if let Some(handle) = self.timer().take() {
            handle.abort();
            tracing::info!("Sync scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Number of ticks that have launched a pass since creation.
    pub fn passes_started(&self) -> usize {
        self.passes_started.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl SessionObserver for SyncScheduler {
    fn on_session_change(&self, _from: SessionState, to: SessionState) {
        match to {
            SessionState::Authenticated if !self.is_running() => self.start(),
            SessionState::Unauthenticated | SessionState::Unauthorized => self.stop(),
            // Refreshing keeps the cadence; passes revalidate on their own.
            _ => {}
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.timer().take() {
            handle.abort();
        }
    }
}

//! Scheduled history collection.
//!
//! [`SyncScheduler`] owns the recurring timer; [`HistoryCollector`] runs
//! each pass.

pub mod collector;
pub mod scheduler;

pub use collector::{CollectionWindow, HistoryCollector, PassOutcome, SkipReason};
pub use scheduler::{SyncScheduler, DEFAULT_SYNC_INTERVAL};

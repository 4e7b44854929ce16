//! Fixed-content history source for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::traits::{HistoryItem, HistoryQuery, HistorySource, SourceError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// History source returning a fixed set of items.
///
/// Applies the query window the same way the file source does, and records
/// every query it receives.
#[derive(Debug, Clone, Default)]
pub struct StaticHistory {
    items: Arc<Mutex<Vec<HistoryItem>>>,
    queries: Arc<Mutex<Vec<HistoryQuery>>>,
    fail: Arc<Mutex<bool>>,
}

impl StaticHistory {
    /// Create a source with the given items.
    pub fn new(items: Vec<HistoryItem>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
            ..Self::default()
        }
    }

    /// Replace the items.
    pub fn set_items(&self, items: Vec<HistoryItem>) {
        *lock(&self.items) = items;
    }

    /// Configure whether search should fail.
    pub fn set_should_fail(&self, fail: bool) {
        *lock(&self.fail) = fail;
    }

    /// Number of searches performed.
    pub fn search_count(&self) -> usize {
        lock(&self.queries).len()
    }

    /// The most recent query.
    pub fn last_query(&self) -> Option<HistoryQuery> {
        lock(&self.queries).last().cloned()
    }
}

#[async_trait]
impl HistorySource for StaticHistory {
    async fn search(&self, query: &HistoryQuery) -> Result<Vec<HistoryItem>, SourceError> {
        lock(&self.queries).push(query.clone());
        if *lock(&self.fail) {
            return Err(SourceError::Unavailable("Mock history failure".to_string()));
        }

        let mut items: Vec<HistoryItem> = lock(&self.items)
            .iter()
            .filter(|item| item.last_visit_time >= query.start_time)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.last_visit_time.cmp(&a.last_visit_time));
        items.truncate(query.max_results);
        Ok(items)
    }
}

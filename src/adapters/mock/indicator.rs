//! Attention indicator that records its transitions.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::traits::AttentionIndicator;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Indicator that keeps its current value and counts raises.
#[derive(Debug, Clone, Default)]
pub struct RecordingIndicator {
    raised: Arc<Mutex<bool>>,
    raise_count: Arc<Mutex<usize>>,
}

impl RecordingIndicator {
    /// Create a cleared indicator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, without going through the trait.
    pub fn raised(&self) -> bool {
        *lock(&self.raised)
    }

    /// Number of times `raise` was called.
    pub fn raise_count(&self) -> usize {
        *lock(&self.raise_count)
    }
}

#[async_trait]
impl AttentionIndicator for RecordingIndicator {
    async fn raise(&self) {
        *lock(&self.raised) = true;
        *lock(&self.raise_count) += 1;
    }

    async fn clear(&self) {
        *lock(&self.raised) = false;
    }

    async fn is_raised(&self) -> bool {
        self.raised()
    }
}

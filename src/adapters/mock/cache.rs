//! In-memory local token cache for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::reconciler::LocalCache;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Local cache held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    token: Arc<Mutex<Option<String>>>,
}

impl InMemoryCache {
    /// Create a cache holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token.into()))),
        }
    }

    /// Current cached token, without going through the trait.
    pub fn peek(&self) -> Option<String> {
        lock(&self.token).clone()
    }
}

#[async_trait]
impl LocalCache for InMemoryCache {
    async fn load(&self) -> Option<String> {
        self.peek()
    }

    async fn store(&self, token: &str) {
        *lock(&self.token) = Some(token.to_string());
    }

    async fn clear(&self) {
        *lock(&self.token) = None;
    }
}

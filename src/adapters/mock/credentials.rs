//! In-memory Credential Store for testing.
//!
//! Several handles can share one backing record, each writing as its own
//! context. This stands in for the daemon, popup, and dashboard all looking
//! at the same file.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::auth::{Credentials, UserProfile};
use crate::traits::{ContextId, CredentialChange, CredentialStore, StoreError};

#[derive(Debug, Default)]
struct Backing {
    credentials: Credentials,
    profile: Option<UserProfile>,
    history_length: usize,
    consumed_offers: HashSet<String>,
    save_count: usize,
    clear_count: usize,
    save_should_fail: bool,
    profile_save_should_fail: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory Credential Store for testing.
///
/// # Example
///
/// ```ignore
/// use chronicle::adapters::mock::InMemoryStore;
///
/// let daemon = InMemoryStore::new();
/// let popup = daemon.foreign_handle();
///
/// popup.save(&Credentials::new("T1", None)).await?;
/// // daemon's subscribers see the change with popup's context id
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    backing: Arc<Mutex<Backing>>,
    changes: broadcast::Sender<CredentialChange>,
    context: ContextId,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            backing: Arc::new(Mutex::new(Backing::default())),
            changes,
            context: ContextId::new(),
        }
    }

    /// Create a store holding `creds`.
    pub fn with_credentials(creds: Credentials) -> Self {
        let store = Self::new();
        lock(&store.backing).credentials = creds;
        store
    }

    /// Another handle on the same record, writing as a different context.
    pub fn foreign_handle(&self) -> Self {
        Self {
            backing: Arc::clone(&self.backing),
            changes: self.changes.clone(),
            context: ContextId::new(),
        }
    }

    /// Configure whether save should fail.
    pub fn set_save_should_fail(&self, should_fail: bool) {
        lock(&self.backing).save_should_fail = should_fail;
    }

    /// Configure whether save_profile should fail.
    pub fn set_profile_save_should_fail(&self, should_fail: bool) {
        lock(&self.backing).profile_save_should_fail = should_fail;
    }

    /// Current record, without going through the trait.
    pub fn snapshot(&self) -> Credentials {
        lock(&self.backing).credentials.clone()
    }

    /// Number of successful saves across all handles.
    pub fn save_count(&self) -> usize {
        lock(&self.backing).save_count
    }

    /// Number of clears across all handles.
    pub fn clear_count(&self) -> usize {
        lock(&self.backing).clear_count
    }

    fn replace(&self, creds: Credentials) {
        let old = {
            let mut backing = lock(&self.backing);
            std::mem::replace(&mut backing.credentials, creds.clone())
        };
        if old != creds {
            let _ = self.changes.send(CredentialChange {
                old,
                new: creds,
                origin: Some(self.context),
            });
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    fn context_id(&self) -> ContextId {
        self.context
    }

    async fn load(&self) -> Result<Credentials, StoreError> {
        Ok(self.snapshot())
    }

    async fn save(&self, creds: &Credentials) -> Result<(), StoreError> {
        {
            let mut backing = lock(&self.backing);
            if backing.save_should_fail {
                return Err(StoreError::SaveFailed("Mock save failure".to_string()));
            }
            backing.save_count += 1;
        }
        self.replace(creds.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        lock(&self.backing).clear_count += 1;
        self.replace(Credentials::empty());
        Ok(())
    }

    async fn load_profile(&self) -> Result<Option<UserProfile>, StoreError> {
        Ok(lock(&self.backing).profile.clone())
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let mut backing = lock(&self.backing);
        if backing.profile_save_should_fail {
            return Err(StoreError::SaveFailed("Mock profile save failure".to_string()));
        }
        backing.profile = Some(profile.clone());
        Ok(())
    }

    async fn set_history_length(&self, len: usize) -> Result<(), StoreError> {
        lock(&self.backing).history_length = len;
        Ok(())
    }

    async fn history_length(&self) -> Result<usize, StoreError> {
        Ok(lock(&self.backing).history_length)
    }

    async fn mark_offer_consumed(&self, fingerprint: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.backing)
            .consumed_offers
            .insert(fingerprint.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<CredentialChange> {
        self.changes.subscribe()
    }
}

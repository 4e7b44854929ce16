//! File-based Credential Store adapter.
//!
//! The store is a single JSON document shared by every context on the
//! machine (`~/.chronicle/store.json` by default). Writes go to a temporary
//! file that is renamed over the document, so readers never observe a
//! half-written record. Foreign writes are detected with a `notify`
//! watcher on the parent directory and re-broadcast as [`CredentialChange`]s.

use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::{Credentials, UserProfile};
use crate::traits::{ContextId, CredentialChange, CredentialStore, StoreError};

/// The store file name inside the chronicle home directory.
pub const STORE_FILE: &str = "store.json";

/// Capacity of the change notification channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// On-disk layout of the shared store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct StoreDocument {
    #[serde(flatten)]
    credentials: Credentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_data: Option<UserProfile>,
    #[serde(default)]
    history_length: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    consumed_offers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_writer: Option<Uuid>,
}

/// State shared between the store handle and its watcher callback.
#[derive(Debug)]
struct Shared {
    path: PathBuf,
    /// Credentials as last observed by this handle. Guards every read-modify-write.
    last_seen: Mutex<Credentials>,
    changes: broadcast::Sender<CredentialChange>,
}

impl Shared {
    fn read_document(&self) -> Result<StoreDocument, StoreError> {
        if !self.path.exists() {
            return Ok(StoreDocument::default());
        }

        let file = File::open(&self.path).map_err(|e| StoreError::LoadFailed(e.to_string()))?;
        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                // A corrupt document reads as signed out rather than wedging every context.
                tracing::warn!("Credential store unreadable, treating as empty: {}", e);
                Ok(StoreDocument::default())
            }
        }
    }

    fn write_document(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let file = File::create(&tmp_path).map_err(|e| StoreError::SaveFailed(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, doc)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| StoreError::SaveFailed(e.to_string()))?;
        drop(writer);

        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::SaveFailed(e.to_string()))
    }

    /// Apply `edit` to the document under the handle lock and broadcast any
    /// credential change it caused.
    fn modify<F>(&self, writer: ContextId, edit: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoreDocument),
    {
        let mut last_seen = self
            .last_seen
            .lock()
            .map_err(|_| StoreError::Other("store lock poisoned".to_string()))?;

        let mut doc = self.read_document()?;
        let before = doc.credentials.clone();
        let foreign_writer = doc.last_writer.map(ContextId);
        edit(&mut doc);
        doc.last_writer = Some(writer.0);
        self.write_document(&doc)?;

        // A foreign write the watcher has not delivered yet is announced
        // under its own writer before this one.
        if *last_seen != before {
            let observed = std::mem::replace(&mut *last_seen, before.clone());
            let _ = self.changes.send(CredentialChange {
                old: observed,
                new: before.clone(),
                origin: foreign_writer,
            });
        }

        let after = doc.credentials.clone();
        *last_seen = after.clone();
        if before != after {
            let _ = self.changes.send(CredentialChange {
                old: before,
                new: after,
                origin: Some(writer),
            });
        }
        Ok(())
    }

    /// Called from the watcher thread when the document may have changed.
    fn on_file_event(&self) {
        let Ok(mut last_seen) = self.last_seen.lock() else {
            return;
        };
        let doc = match self.read_document() {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!("Ignoring store event, read failed: {}", e);
                return;
            }
        };

        if doc.credentials == *last_seen {
            return;
        }

        let old = std::mem::replace(&mut *last_seen, doc.credentials.clone());
        tracing::debug!(
            "Credential store changed on disk ({} -> {})",
            old.token_preview(),
            doc.credentials.token_preview()
        );
        let _ = self.changes.send(CredentialChange {
            old,
            new: doc.credentials,
            origin: doc.last_writer.map(ContextId),
        });
    }
}

/// Credential Store backed by a shared JSON file.
///
/// # Example
///
/// ```ignore
/// use chronicle::adapters::FileCredentialStore;
/// use chronicle::traits::CredentialStore;
///
/// let store = FileCredentialStore::open(home.join("store.json"))?;
/// store.watch()?;
/// let mut changes = store.subscribe();
/// ```
pub struct FileCredentialStore {
    shared: Arc<Shared>,
    context: ContextId,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FileCredentialStore {
    /// Open the store at `path` with a fresh context id.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            path: path.into(),
            last_seen: Mutex::new(Credentials::empty()),
            changes,
        });
        let initial = shared.read_document()?.credentials;
        if let Ok(mut last_seen) = shared.last_seen.lock() {
            *last_seen = initial;
        }

        Ok(Self {
            shared,
            context: ContextId::new(),
            watcher: Mutex::new(None),
        })
    }

    /// Get the path to the store file.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Start watching the store file for writes from other contexts.
    ///
    /// Idempotent. The watcher lives as long as this handle.
    pub fn watch(&self) -> Result<(), StoreError> {
        let mut slot = self
            .watcher
            .lock()
            .map_err(|_| StoreError::Other("watcher lock poisoned".to_string()))?;
        if slot.is_some() {
            return Ok(());
        }

        let dir = self
            .shared
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir).map_err(|e| StoreError::Io(e.to_string()))?;

        let shared = Arc::clone(&self.shared);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) if event.paths.iter().any(|p| p == &shared.path) => {
                    shared.on_file_event();
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Credential store watcher error: {}", e),
            }
        })
        .map_err(|e| StoreError::Other(format!("failed to create watcher: {}", e)))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| StoreError::Other(format!("failed to watch {}: {}", dir.display(), e)))?;

        tracing::info!("Watching credential store at {}", self.shared.path.display());
        *slot = Some(watcher);
        Ok(())
    }

    /// Re-read the document and broadcast a change if a foreign write was missed.
    pub fn poll(&self) {
        self.shared.on_file_event();
    }
}

impl std::fmt::Debug for FileCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCredentialStore")
            .field("path", &self.shared.path)
            .field("context", &self.context)
            .finish()
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    fn context_id(&self) -> ContextId {
        self.context
    }

    async fn load(&self) -> Result<Credentials, StoreError> {
        Ok(self.shared.read_document()?.credentials)
    }

    async fn save(&self, creds: &Credentials) -> Result<(), StoreError> {
        let creds = creds.clone();
        self.shared
            .modify(self.context, move |doc| doc.credentials = creds)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.shared
            .modify(self.context, |doc| doc.credentials = Credentials::empty())
            .map_err(|e| StoreError::ClearFailed(e.to_string()))
    }

    async fn load_profile(&self) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.shared.read_document()?.user_data)
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let profile = profile.clone();
        self.shared
            .modify(self.context, move |doc| doc.user_data = Some(profile))
    }

    async fn set_history_length(&self, len: usize) -> Result<(), StoreError> {
        self.shared
            .modify(self.context, move |doc| doc.history_length = len)
    }

    async fn history_length(&self) -> Result<usize, StoreError> {
        Ok(self.shared.read_document()?.history_length)
    }

    async fn mark_offer_consumed(&self, fingerprint: &str) -> Result<bool, StoreError> {
        let mut newly = false;
        self.shared.modify(self.context, |doc| {
            if !doc.consumed_offers.iter().any(|f| f == fingerprint) {
                newly = true;
                doc.consumed_offers.push(fingerprint.to_string());
            }
        })?;
        Ok(newly)
    }

    fn subscribe(&self) -> broadcast::Receiver<CredentialChange> {
        self.shared.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store(temp_dir: &TempDir) -> FileCredentialStore {
        FileCredentialStore::open(temp_dir.path().join(".chronicle").join(STORE_FILE)).unwrap()
    }

    #[tokio::test]
    async fn test_load_nonexistent_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);
        assert!(store.load().await.unwrap().is_empty());
        assert_eq!(store.history_length().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_creates_parent_dir_and_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);
        assert!(!store.path().parent().unwrap().exists());

        let creds = Credentials::new("T1", Some("R1".to_string()));
        store.save(&creds).await.unwrap();

        assert!(store.path().exists());
        assert_eq!(store.load().await.unwrap(), creds);
    }

    #[tokio::test]
    async fn test_clear_removes_both_tokens_and_keeps_other_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        store
            .save(&Credentials::new("T1", Some("R1".to_string())))
            .await
            .unwrap();
        store.set_history_length(7).await.unwrap();
        store.clear().await.unwrap();

        assert!(store.load().await.unwrap().is_empty());
        assert_eq!(store.history_length().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_document_uses_shared_key_names() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);
        store
            .save(&Credentials::new("T1", Some("R1".to_string())))
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["access_token"], "T1");
        assert_eq!(raw["refresh_token"], "R1");
    }

    #[tokio::test]
    async fn test_invalid_json_reads_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not valid json").unwrap();

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_own_write_is_broadcast_with_own_origin() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);
        let mut rx = store.subscribe();

        store.save(&Credentials::new("T1", None)).await.unwrap();

        let change = rx.recv().await.unwrap();
        assert!(change.old.is_empty());
        assert_eq!(change.new.access_token.as_deref(), Some("T1"));
        assert!(change.is_from(store.context_id()));
    }

    #[tokio::test]
    async fn test_non_credential_writes_are_not_broadcast() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);
        let mut rx = store.subscribe();

        store.set_history_length(3).await.unwrap();
        store.save_profile(&UserProfile::default()).await.unwrap();

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_foreign_write_detected_by_poll() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(STORE_FILE);
        let daemon = FileCredentialStore::open(&path).unwrap();
        let popup = FileCredentialStore::open(&path).unwrap();
        let mut rx = daemon.subscribe();

        popup.save(&Credentials::new("T1", None)).await.unwrap();
        daemon.poll();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.new.access_token.as_deref(), Some("T1"));
        assert!(change.is_from(popup.context_id()));
        assert!(!change.is_from(daemon.context_id()));

        // A second poll with no new write is silent
        daemon.poll();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mark_offer_consumed_once() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);

        assert!(store.mark_offer_consumed("abc").await.unwrap());
        assert!(!store.mark_offer_consumed("abc").await.unwrap());

        // Visible to another handle on the same file
        let other = FileCredentialStore::open(store.path()).unwrap();
        assert!(!other.mark_offer_consumed("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_old_offer_stays_consumed_after_many_newer() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_test_store(&temp_dir);
        assert!(store.mark_offer_consumed("fp-first").await.unwrap());
        for i in 0..100 {
            store.mark_offer_consumed(&format!("fp-{}", i)).await.unwrap();
        }

        let other = FileCredentialStore::open(store.path()).unwrap();
        assert!(!other.mark_offer_consumed("fp-first").await.unwrap());
        assert_eq!(store.shared.read_document().unwrap().consumed_offers.len(), 101);
    }

    #[tokio::test]
    async fn test_unseen_foreign_sign_out_survives_own_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(STORE_FILE);
        let daemon = FileCredentialStore::open(&path).unwrap();
        daemon
            .save(&Credentials::new("T1", Some("R1".to_string())))
            .await
            .unwrap();
        let mut rx = daemon.subscribe();

        // No watcher and no poll: the daemon writes before it sees the clear
        let popup = FileCredentialStore::open(&path).unwrap();
        popup.clear().await.unwrap();
        daemon.set_history_length(3).await.unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.old.access_token.as_deref(), Some("T1"));
        assert!(change.new.is_empty());
        assert!(change.is_from(popup.context_id()));
        assert!(!change.is_from(daemon.context_id()));

        assert!(rx.try_recv().is_err());
        daemon.poll();
        assert!(rx.try_recv().is_err());
        assert!(daemon.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_own_write_after_unseen_foreign_write_is_announced_separately() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(STORE_FILE);
        let daemon = FileCredentialStore::open(&path).unwrap();
        let mut rx = daemon.subscribe();

        let popup = FileCredentialStore::open(&path).unwrap();
        popup.save(&Credentials::new("T1", None)).await.unwrap();
        daemon.save(&Credentials::new("T2", None)).await.unwrap();

        let foreign = rx.recv().await.unwrap();
        assert!(foreign.is_from(popup.context_id()));
        assert_eq!(foreign.new.access_token.as_deref(), Some("T1"));

        let own = rx.recv().await.unwrap();
        assert!(own.is_from(daemon.context_id()));
        assert_eq!(own.old.access_token.as_deref(), Some("T1"));
        assert_eq!(own.new.access_token.as_deref(), Some("T2"));
    }
}

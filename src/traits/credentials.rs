//! Credential Store trait abstraction.
//!
//! The store is the single source of truth for tokens, shared by every
//! context (daemon, popup, dashboard). Readers re-derive session state from
//! it instead of trusting in-memory copies.

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::{Credentials, UserProfile};

/// Credential Store operation errors.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Failed to load the store contents
    LoadFailed(String),
    /// Failed to save credentials
    SaveFailed(String),
    /// Failed to clear credentials
    ClearFailed(String),
    /// IO error
    Io(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// Other error
    Other(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::LoadFailed(msg) => write!(f, "Failed to load credential store: {}", msg),
            StoreError::SaveFailed(msg) => write!(f, "Failed to save credentials: {}", msg),
            StoreError::ClearFailed(msg) => write!(f, "Failed to clear credentials: {}", msg),
            StoreError::Io(msg) => write!(f, "IO error: {}", msg),
            StoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StoreError::Other(msg) => write!(f, "Credential store error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Identifies the execution context that wrote to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub Uuid);

impl ContextId {
    /// Generate a fresh id for a new context.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A change to the credential keys of the store.
///
/// Only emitted when `access_token` or `refresh_token` actually changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialChange {
    /// Record before the write.
    pub old: Credentials,
    /// Record after the write.
    pub new: Credentials,
    /// Context that performed the write, when known.
    pub origin: Option<ContextId>,
}

impl CredentialChange {
    /// Check whether this change was written by the given context.
    pub fn is_from(&self, context: ContextId) -> bool {
        self.origin == Some(context)
    }
}

/// Durable, shared key-value persistence for credentials.
///
/// `save` replaces both tokens in one write and `clear` removes both. There
/// is no transactional merge between contexts: the last writer wins.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Id of the context this handle writes as.
    fn context_id(&self) -> ContextId;

    /// Load the credential record. Returns an empty record when none is stored.
    async fn load(&self) -> Result<Credentials, StoreError>;

    /// Atomically replace the credential record.
    async fn save(&self, creds: &Credentials) -> Result<(), StoreError>;

    /// Remove both tokens.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Load the stored user profile, if any.
    async fn load_profile(&self) -> Result<Option<UserProfile>, StoreError>;

    /// Store the user profile.
    async fn save_profile(&self, profile: &UserProfile) -> Result<(), StoreError>;

    /// Update the local count of collected history items.
    async fn set_history_length(&self, len: usize) -> Result<(), StoreError>;

    /// Read the local count of collected history items.
    async fn history_length(&self) -> Result<usize, StoreError>;

    /// Record that an external offer was consumed.
    ///
    /// Returns `false` when the fingerprint had already been recorded.
    async fn mark_offer_consumed(&self, fingerprint: &str) -> Result<bool, StoreError>;

    /// Subscribe to changes of the credential keys, from any context.
    fn subscribe(&self) -> broadcast::Receiver<CredentialChange>;
}

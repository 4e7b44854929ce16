//! Purely local copy of the last access token.
//!
//! Lowest-precedence credential source. A cached token is revalidated
//! against the remote authority before it is trusted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The cache file name inside the chronicle home directory.
pub const CACHE_FILE: &str = "token_cache.json";

/// A context-local token cache.
#[async_trait]
pub trait LocalCache: Send + Sync {
    async fn load(&self) -> Option<String>;

    async fn store(&self, token: &str);

    async fn clear(&self);
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    token: String,
}

/// Local cache in its own file, separate from the shared store.
#[derive(Debug, Clone)]
pub struct FileLocalCache {
    path: PathBuf,
}

impl FileLocalCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LocalCache for FileLocalCache {
    async fn load(&self) -> Option<String> {
        let bytes = tokio::fs::read(&self.path).await.ok()?;
        match serde_json::from_slice::<CacheFile>(&bytes) {
            Ok(file) if !file.token.is_empty() => Some(file.token),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Ignoring unreadable token cache: {}", e);
                None
            }
        }
    }

    async fn store(&self, token: &str) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!("Failed to create cache directory: {}", e);
                return;
            }
        }
        let file = CacheFile {
            token: token.to_string(),
        };
        match serde_json::to_vec(&file) {
            Ok(body) => {
                if let Err(e) = tokio::fs::write(&self.path, body).await {
                    tracing::warn!("Failed to write token cache: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to encode token cache: {}", e),
        }
    }

    async fn clear(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove token cache: {}", e),
        }
    }
}

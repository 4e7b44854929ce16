//! Attention indicator persisted as a small JSON status file.
//!
//! Other contexts (a shell prompt, the popup) read the file to render the
//! badge. Write failures are logged and swallowed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::traits::indicator::{TITLE_REAUTH_REQUIRED, TITLE_RUNNING};
use crate::traits::AttentionIndicator;

/// The indicator file name inside the chronicle home directory.
pub const INDICATOR_FILE: &str = "status.json";

/// On-disk indicator state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndicatorStatus {
    pub attention: bool,
    pub title: String,
}

impl IndicatorStatus {
    fn for_attention(attention: bool) -> Self {
        let title = if attention {
            TITLE_REAUTH_REQUIRED
        } else {
            TITLE_RUNNING
        };
        Self {
            attention,
            title: title.to_string(),
        }
    }
}

/// File-backed attention indicator.
#[derive(Debug, Clone)]
pub struct FileIndicator {
    path: PathBuf,
}

impl FileIndicator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current status. A missing or unreadable file reads as cleared.
    pub async fn status(&self) -> IndicatorStatus {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| IndicatorStatus::for_attention(false)),
            Err(_) => IndicatorStatus::for_attention(false),
        }
    }

    async fn write(&self, attention: bool) {
        let status = IndicatorStatus::for_attention(attention);
        if let Some(parent) = self.path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!("Failed to create indicator directory: {}", e);
                return;
            }
        }
        let body = match serde_json::to_vec_pretty(&status) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to encode indicator status: {}", e);
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&self.path, body).await {
            tracing::warn!("Failed to write indicator {}: {}", self.path.display(), e);
        }
    }
}

#[async_trait]
impl AttentionIndicator for FileIndicator {
    async fn raise(&self) {
        tracing::info!("Raising attention indicator");
        self.write(true).await;
    }

    async fn clear(&self) {
        self.write(false).await;
    }

    async fn is_raised(&self) -> bool {
        self.status().await.attention
    }
}

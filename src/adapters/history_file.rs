//! History source backed by a JSON export of browsing history.
//!
//! The file holds an array of [`HistoryItem`]s. It is re-read on every
//! search so an external exporter can rewrite it at any time.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::traits::{HistoryItem, HistoryQuery, HistorySource, SourceError};

/// Reads history items from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonHistorySource {
    path: PathBuf,
}

impl JsonHistorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistorySource for JsonHistorySource {
    async fn search(&self, query: &HistoryQuery) -> Result<Vec<HistoryItem>, SourceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No history export at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(SourceError::Unavailable(e.to_string())),
        };

        let items: Vec<HistoryItem> =
            serde_json::from_slice(&bytes).map_err(|e| SourceError::Parse(e.to_string()))?;

        let mut recent: Vec<HistoryItem> = items
            .into_iter()
            .filter(|item| item.last_visit_time >= query.start_time)
            .collect();
        recent.sort_by(|a, b| b.last_visit_time.cmp(&a.last_visit_time));
        recent.truncate(query.max_results);
        Ok(recent)
    }
}

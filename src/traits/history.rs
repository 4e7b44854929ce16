//! Browsing history source abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A visited page as reported by the history source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryItem {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Last visit time.
    pub last_visit_time: DateTime<Utc>,
    #[serde(default)]
    pub visit_count: Option<u32>,
}

/// Bounded window of history to collect.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    /// Only items visited at or after this instant.
    pub start_time: DateTime<Utc>,
    /// Maximum number of items, newest first.
    pub max_results: usize,
}

/// Errors reading the history source.
#[derive(Debug, Clone)]
pub enum SourceError {
    /// The source could not be read
    Unavailable(String),
    /// The source contents could not be parsed
    Parse(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Unavailable(msg) => write!(f, "History source unavailable: {}", msg),
            SourceError::Parse(msg) => write!(f, "History source unreadable: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// Trait for reading recent browsing history.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Return at most `query.max_results` items visited since `query.start_time`,
    /// newest first.
    async fn search(&self, query: &HistoryQuery) -> Result<Vec<HistoryItem>, SourceError>;
}

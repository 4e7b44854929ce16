//! DevChronicles data endpoints.
//!
//! All requests here are bearer-authenticated and go through [`RetryOnce`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::RetryOnce;
use crate::auth::api_url;
use crate::auth::central_api::unexpected;
use crate::error::SyncResult;
use crate::traits::{bearer_headers, HttpClient, Response};

/// One visited page in a submitted batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub link: String,
    pub title: String,
    /// RFC 3339 visit time.
    pub visited_at: String,
    /// Always at least 1.
    pub visit_count: u32,
}

/// Aggregate statistics for the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default)]
    pub bugs_fixed: u64,
    #[serde(default)]
    pub concepts_learned: u64,
    #[serde(default = "default_time_spent")]
    pub time_spent: String,
    #[serde(default)]
    pub total_entries: u64,
}

fn default_time_spent() -> String {
    "0h".to_string()
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            bugs_fixed: 0,
            concepts_learned: 0,
            time_spent: default_time_spent(),
            total_entries: 0,
        }
    }
}

/// A recent activity item as returned by the backend.
#[derive(Debug, Clone, Deserialize)]
struct RawActivity {
    #[serde(default)]
    title: String,
    #[serde(default)]
    main_category: Option<String>,
    #[serde(default)]
    link: String,
}

/// A recent activity item, ready for display.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Activity {
    pub title: String,
    pub category: String,
    /// Host of the visited link, empty if it does not parse.
    pub domain: String,
}

impl From<RawActivity> for Activity {
    fn from(raw: RawActivity) -> Self {
        let domain = url::Url::parse(&raw.link)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        Self {
            title: raw.title,
            category: raw.main_category.unwrap_or_else(|| "learning".to_string()),
            domain,
        }
    }
}

/// Client for the DevChronicles data endpoints.
#[derive(Clone)]
pub struct ChronicleApi {
    base_url: String,
    http: Arc<dyn HttpClient>,
    retry: RetryOnce,
}

impl ChronicleApi {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, retry: RetryOnce) -> Self {
        Self {
            base_url: base_url.into(),
            http,
            retry,
        }
    }

    async fn get(&self, path: &str) -> SyncResult<Response> {
        let url = api_url(&self.base_url, path);
        let response = self
            .retry
            .call(|token| {
                let http = Arc::clone(&self.http);
                let url = url.clone();
                async move { http.get(&url, &bearer_headers(&token)).await }
            })
            .await?;

        if !response.is_success() {
            return Err(unexpected(&response));
        }
        Ok(response)
    }

    /// Submit a batch of collected history.
    ///
    /// POST /backend-api/chrome/history
    pub async fn submit_history(&self, entries: &[HistoryEntry]) -> SyncResult<()> {
        let url = api_url(&self.base_url, "/chrome/history");
        let body = serde_json::to_string(entries)?;

        let response = self
            .retry
            .call(|token| {
                let http = Arc::clone(&self.http);
                let url = url.clone();
                let body = body.clone();
                async move { http.post(&url, &body, &bearer_headers(&token)).await }
            })
            .await?;

        if !response.is_success() {
            return Err(unexpected(&response));
        }
        tracing::info!("Submitted {} history entries", entries.len());
        Ok(())
    }

    /// GET /backend-api/chrome/stats
    pub async fn fetch_stats(&self) -> SyncResult<Stats> {
        let response = self.get("/chrome/stats").await?;
        Ok(response.json()?)
    }

    /// GET /backend-api/chrome/recent-activity
    pub async fn fetch_recent_activity(&self) -> SyncResult<Vec<Activity>> {
        let response = self.get("/chrome/recent-activity").await?;
        let raw: Vec<RawActivity> = response.json()?;
        Ok(raw.into_iter().map(Activity::from).collect())
    }

    /// GET /backend-api/chrome/category-wise-breakdown?days=N
    ///
    /// The breakdown's shape is owned by the dashboard, so it is returned raw.
    pub async fn fetch_category_breakdown(&self, days: u32) -> SyncResult<serde_json::Value> {
        let path = format!("/chrome/category-wise-breakdown?days={}", days);
        let response = self.get(&path).await?;
        Ok(response.json()?)
    }
}

//! Engine configuration.
//!
//! Built with defaults, overridden by `CHRONICLE_*` environment variables
//! in [`EngineConfig::from_env`], and adjusted with the `with_*` builders.

use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::file_indicator::INDICATOR_FILE;
use crate::adapters::file_store::STORE_FILE;
use crate::auth::DEFAULT_BACKEND_URL;
use crate::reconciler::cache::CACHE_FILE;
use crate::sync::{CollectionWindow, DEFAULT_SYNC_INTERVAL};

/// Default dashboard address for the handoff link.
pub const DEFAULT_DASHBOARD_URL: &str = "https://dashboard.devchronicles.xyz/";

/// Name of the chronicle home directory under the user's home.
const HOME_DIR_NAME: &str = ".chronicle";

/// History export file name inside the chronicle home directory.
const HISTORY_FILE: &str = "history.json";

/// Configuration for a sync engine.
///
/// # Example
///
/// ```ignore
/// use chronicle::startup::EngineConfig;
///
/// let config = EngineConfig::from_env()
///     .with_sync_interval(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Backend origin, without `/backend-api`
    pub backend_url: String,
    pub dashboard_url: String,
    /// Directory holding the store, indicator, and local cache
    pub home_dir: PathBuf,
    pub history_file: PathBuf,
    pub sync_interval: Duration,
    pub window: CollectionWindow,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|home| home.join(HOME_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(HOME_DIR_NAME));
        Self::with_home(home_dir)
    }
}

impl EngineConfig {
    /// Defaults, with every file under `home_dir`.
    pub fn with_home(home_dir: impl Into<PathBuf>) -> Self {
        let home_dir = home_dir.into();
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
            history_file: home_dir.join(HISTORY_FILE),
            home_dir,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            window: CollectionWindow::default(),
        }
    }

    /// Load from `CHRONICLE_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        let mut config = match env_string("CHRONICLE_HOME") {
            Some(home) => Self::with_home(home),
            None => Self::default(),
        };

        if let Some(url) = env_string("CHRONICLE_BACKEND_URL") {
            config.backend_url = url;
        }
        if let Some(url) = env_string("CHRONICLE_DASHBOARD_URL") {
            config.dashboard_url = url;
        }
        if let Some(path) = env_string("CHRONICLE_HISTORY_FILE") {
            config.history_file = PathBuf::from(path);
        }
        if let Some(secs) = env_number::<u64>("CHRONICLE_SYNC_INTERVAL_SECS") {
            config.sync_interval = Duration::from_secs(secs);
        }
        if let Some(days) = env_number::<u32>("CHRONICLE_HISTORY_DAYS") {
            config.window.days = days;
        }
        if let Some(max) = env_number::<usize>("CHRONICLE_HISTORY_MAX") {
            config.window.max_items = max;
        }
        config
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    pub fn with_dashboard_url(mut self, url: impl Into<String>) -> Self {
        self.dashboard_url = url.into();
        self
    }

    pub fn with_history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_file = path.into();
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_window(mut self, window: CollectionWindow) -> Self {
        self.window = window;
        self
    }

    pub fn store_path(&self) -> PathBuf {
        self.home_dir.join(STORE_FILE)
    }

    pub fn indicator_path(&self) -> PathBuf {
        self.home_dir.join(INDICATOR_FILE)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.home_dir.join(CACHE_FILE)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a positive number, warning and falling back on anything else.
fn env_number<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let raw = env_string(key)?;
    match raw.parse::<T>() {
        Ok(value) if value > T::default() => Some(value),
        _ => {
            tracing::warn!("Ignoring invalid {}={:?}, using default", key, raw);
            None
        }
    }
}

//! Startup: configuration, logging, and engine wiring.
//!
//! # Components
//!
//! - [`config`] - Engine configuration and `CHRONICLE_*` overrides
//! - [`logging`] - Tracing subscriber for the binary
//! - [`engine`] - Adapter wiring, cold start, and the long-running loop
//!
//! # Usage
//!
//! ```ignore
//! use chronicle::startup::{Engine, EngineConfig};
//!
//! let engine = Engine::from_config(EngineConfig::from_env())?;
//! engine.run(None, async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```

pub mod config;
pub mod engine;
pub mod logging;

pub use config::{EngineConfig, DEFAULT_DASHBOARD_URL};
pub use engine::{Engine, EngineParts};
pub use logging::init_tracing;

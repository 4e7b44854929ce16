//! Chronicle - background credential lifecycle and history sync for DevChronicles
//!
//! This library exposes modules for use in integration tests.

pub mod adapters;
pub mod auth;
pub mod cli;
pub mod error;
pub mod reconciler;
pub mod request;
pub mod session;
pub mod startup;
pub mod sync;
pub mod traits;

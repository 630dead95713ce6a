//! Service-health monitoring engine.
//!
//! Targets are probed on their own interval, every result is persisted and
//! transitions into or out of `down` trigger notifications.

pub mod config;
pub mod database;
pub mod error;
pub mod monitoring;
pub mod notifications;
pub mod orchestrator;
pub mod pool;
pub mod validation;

pub use error::{Result, WatchdogError};
pub use orchestrator::Watchdog;

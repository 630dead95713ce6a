//! Shared tracing setup for the watchdog binaries.

mod subscriber;

pub use subscriber::{init_tracing, try_init_tracing};
pub use tracing::level_filters::LevelFilter;

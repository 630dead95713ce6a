use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
    util::TryInitError,
};

/// Install the global subscriber, panicking if one is already set.
pub fn init_tracing(level: LevelFilter) {
    if let Err(error) = try_init_tracing(level) {
        panic!("Failed to install tracing subscriber: {error}");
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `level`; `RUST_LOG_FORMAT=json` switches to JSON lines.
pub fn try_init_tracing(level: LevelFilter) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        "" | "compact" => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
        other => {
            let layer = tracing_subscriber::fmt::layer().compact().with_filter(env_filter).boxed();
            tracing_subscriber::registry().with(layer).try_init()?;
            warn!("Unknown RUST_LOG_FORMAT '{other}', falling back to compact output");
            return Ok(());
        }
    };

    tracing_subscriber::registry().with(log_layer).try_init()
}

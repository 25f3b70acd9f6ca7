use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Log to stderr so stdout stays clean JSON.
pub fn init(level: &str) {
    let default_level = level.parse::<LevelFilter>().unwrap_or(LevelFilter::WARN);

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let _ = tracing_subscriber::registry().with(layer).try_init();
}

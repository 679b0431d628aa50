//! provides logging helpers

use tracing_subscriber::filter::{self, EnvFilter};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::{prelude::*, registry};

/// initiate the global tracing subscriber
///
/// Logs go to stderr so they never interleave with listings on stdout.
/// `RUST_LOG` overrides the default `info` level.
pub fn init() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy();

    let fmt_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .with_filter(env_filter);

    registry().with(fmt_layer).init();
}

//! Tracing bootstrap.
//!
//! All diagnostics go to stderr. stdout belongs to the JSON-RPC transport:
//! a single stray log line there corrupts the framing a host process parses.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber at `level`, writing to stderr.
///
/// `RUST_LOG` takes precedence over the configured level when set. Calling
/// this more than once is a no-op.
pub fn init(level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

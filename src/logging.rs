//! Logging configuration for pgprobe.
//!
//! Stdout carries the report, so diagnostic logs always go to stderr. Only
//! errors are logged by default; failures already get an `Error:` line, so
//! most runs log nothing unless `RUST_LOG` asks for more.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "error";

/// Initializes logging to stderr.
///
/// `RUST_LOG` overrides the default level, e.g. `RUST_LOG=pgprobe=debug`.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

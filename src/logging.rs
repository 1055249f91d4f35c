//! Structured logging setup.
//!
//! Logs go to stderr so stdout stays free for JSON-lines events.
//! `RUST_LOG` takes precedence over the `-q`/`-v` flags.

use tracing_subscriber::EnvFilter;

/// Default filter directive for a verbosity level.
pub fn default_directive(quiet: bool, verbosity: u8) -> String {
    let level = if quiet {
        "error"
    } else {
        match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    format!("chunkwave={}", level)
}

/// Filter from `RUST_LOG`, or the flag-derived default when unset or invalid.
fn env_filter(quiet: bool, verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(quiet, verbosity)))
}

/// Initialize the global tracing subscriber.
///
/// Subsequent calls are no-ops.
pub fn init(quiet: bool, verbosity: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(quiet, verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .try_init()
        .ok();
}

//! chunkwave - chunked, order-preserving audio processing
//!
//! Splits decoded audio into a fixed number of chunks, transforms them on a
//! shared worker pool, and emits the results strictly in index order, with
//! cooperative per-task cancellation.

// Enforce error handling discipline in library code
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod daemon;
pub mod defaults;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod pipeline;
pub mod transform;

// Core traits (transform → sink)
pub use pipeline::sink::{BroadcastSink, ChunkSink, CollectorSink, JsonLinesSink};
pub use transform::ChunkTransform;

// Pipeline
pub use pipeline::orchestrator::{Pipeline, PipelineConfig, TaskHandle};
pub use pipeline::types::{ProcessedChunk, Resolution, SinkEvent, TaskId, TaskOutcome, TaskStatus};

// Error handling
pub use error::{ChunkwaveError, Result};
pub use pipeline::error::{ErrorReporter, LogReporter, PipelineFault};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}

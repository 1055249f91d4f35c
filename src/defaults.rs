//! Default configuration constants for chunkwave.
//!
//! Shared between the config file types and the pipeline so both agree on
//! the same baseline values.

/// Default number of worker threads in the shared chunk pool.
pub const WORKER_COUNT: usize = 4;

/// Interval at which the reassembly emitter re-checks cancellation while
/// waiting on its results channel.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Chunk count for the `fine` resolution.
pub const FINE_CHUNKS: usize = 200;

/// Chunk count for the `medium` resolution (also the fallback).
pub const MEDIUM_CHUNKS: usize = 100;

/// Chunk count for the `coarse` resolution.
pub const COARSE_CHUNKS: usize = 50;

/// Upper bound on the number of values a transform produces per chunk.
pub const MAX_POINTS_PER_CHUNK: usize = 256;

/// Log one line per this many in-order emissions.
pub const EMIT_LOG_EVERY: usize = 10;

/// Capacity of the daemon's event broadcast channel.
pub const EVENT_BROADCAST_CAPACITY: usize = 4096;

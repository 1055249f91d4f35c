//! Chunked processing pipeline.
//!
//! A task's samples are split into a fixed number of chunks, transformed
//! concurrently by a shared worker pool, and handed back to the sink in
//! strict index order by a per-task reassembly emitter. Threads communicate
//! over crossbeam channels; cancellation flows through the task registry.

pub mod emitter;
pub mod error;
pub mod orchestrator;
pub mod pool;
pub mod registry;
pub mod sink;
pub mod splitter;
pub mod types;
pub mod worker;

pub use emitter::ReassemblyEmitter;
pub use error::{ErrorReporter, LogReporter, PipelineFault};
pub use orchestrator::{Pipeline, PipelineConfig, TaskHandle};
pub use pool::WorkerPool;
pub use registry::{StopSignal, TaskInfo, TaskRegistry};
pub use sink::{BroadcastSink, ChunkSink, CollectorSink, JsonLinesSink};
pub use splitter::split;
pub use types::{
    Chunk, ChunkMetrics, ProcessedChunk, Resolution, SinkEvent, TaskId, TaskOutcome, TaskStatus,
};
pub use worker::{ChunkOutcome, ChunkWorker, SkipPoint};

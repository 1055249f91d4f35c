//! Per-chunk transform step with cooperative cancellation checkpoints.

use crate::error::ChunkwaveError;
use crate::pipeline::error::{ErrorReporter, PipelineFault};
use crate::pipeline::registry::TaskRegistry;
use crate::pipeline::types::{Chunk, ChunkMetrics, ProcessedChunk, TaskId};
use crate::transform::ChunkTransform;
use crossbeam_channel::Sender;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Where a cancelled chunk was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipPoint {
    /// The task was already cancelled; the transform never ran.
    BeforeTransform,
    /// The task was cancelled while the transform ran; its result was discarded.
    AfterTransform,
}

/// Result of processing one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Processed(ProcessedChunk),
    Skipped(SkipPoint),
}

/// Applies the transform to chunks on behalf of a task.
#[derive(Clone)]
pub struct ChunkWorker {
    registry: Arc<TaskRegistry>,
    transform: Arc<dyn ChunkTransform>,
    reporter: Arc<dyn ErrorReporter>,
}

impl ChunkWorker {
    pub fn new(
        registry: Arc<TaskRegistry>,
        transform: Arc<dyn ChunkTransform>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            registry,
            transform,
            reporter,
        }
    }

    /// Processes one chunk.
    ///
    /// Cancellation is checked before and after the transform. A failing or
    /// panicking transform yields a chunk with an empty payload and the error
    /// recorded in its metrics.
    pub fn process(&self, chunk: &Chunk, task_id: TaskId) -> ChunkOutcome {
        let worker = thread::current()
            .name()
            .unwrap_or("worker")
            .to_string();

        if self.registry.is_cancelled(task_id) {
            tracing::info!(%task_id, index = chunk.index, "Skipping chunk, task was stopped");
            return ChunkOutcome::Skipped(SkipPoint::BeforeTransform);
        }

        tracing::debug!(
            %task_id,
            index = chunk.index,
            len = chunk.samples.len(),
            worker = %worker,
            "Processing chunk"
        );

        let start = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.transform.transform(chunk)))
            .unwrap_or_else(|panic_info| {
                let msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(ChunkwaveError::Transform {
                    message: format!("transform panicked: {msg}"),
                })
            });
        let processing_ms = start.elapsed().as_secs_f64() * 1000.0;

        if self.registry.is_cancelled(task_id) {
            tracing::info!(
                %task_id,
                index = chunk.index,
                "Discarding chunk, task was stopped during processing"
            );
            return ChunkOutcome::Skipped(SkipPoint::AfterTransform);
        }

        let (payload, error) = match result {
            Ok(payload) => (payload, None),
            Err(e) => {
                let message = match e {
                    ChunkwaveError::Transform { message } => message,
                    other => other.to_string(),
                };
                self.reporter.report(
                    "worker",
                    &task_id.to_string(),
                    &PipelineFault::TransformFailed {
                        index: chunk.index,
                        message: message.clone(),
                    },
                );
                (Vec::new(), Some(message))
            }
        };

        tracing::debug!(
            %task_id,
            index = chunk.index,
            worker = %worker,
            processing_ms,
            "Finished chunk"
        );

        ChunkOutcome::Processed(ProcessedChunk::new(chunk.index, payload).with_metrics(
            ChunkMetrics {
                worker,
                input_len: chunk.samples.len(),
                processing_ms,
                error,
            },
        ))
    }

    /// Processes a chunk and enqueues the result on the task's results channel.
    ///
    /// Returns true if a result was enqueued.
    pub fn run(&self, chunk: Chunk, task_id: TaskId, results_tx: &Sender<ProcessedChunk>) -> bool {
        match self.process(&chunk, task_id) {
            ChunkOutcome::Processed(processed) => {
                // The emitter may already be gone after a stop; nothing to do then.
                results_tx.send(processed).is_ok()
            }
            ChunkOutcome::Skipped(_) => false,
        }
    }
}

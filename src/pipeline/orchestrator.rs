//! Task submission: split, register, dispatch, and start the emitter.

use crate::config::{Config, ResolutionConfig};
use crate::defaults;
use crate::error::{ChunkwaveError, Result};
use crate::pipeline::emitter::ReassemblyEmitter;
use crate::pipeline::error::{ErrorReporter, LogReporter};
use crate::pipeline::pool::WorkerPool;
use crate::pipeline::registry::{TaskInfo, TaskRegistry};
use crate::pipeline::sink::ChunkSink;
use crate::pipeline::splitter;
use crate::pipeline::types::{Resolution, TaskId, TaskOutcome};
use crate::pipeline::worker::ChunkWorker;
use crate::transform::ChunkTransform;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Configuration for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Worker threads shared by all tasks
    pub workers: usize,
    /// Bounded wait between the emitter's cancellation re-checks
    pub poll_interval: Duration,
    /// Resolution → chunk count table
    pub resolution: ResolutionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: defaults::WORKER_COUNT,
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
            resolution: ResolutionConfig::default(),
        }
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.pipeline.workers,
            poll_interval: Duration::from_millis(config.pipeline.poll_interval_ms),
            resolution: config.resolution.clone(),
        }
    }
}

/// Handle to a submitted task.
pub struct TaskHandle {
    task_id: TaskId,
    chunk_count: usize,
    emitter: JoinHandle<TaskOutcome>,
}

impl TaskHandle {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Blocks until the task reaches a terminal state.
    pub fn wait(self) -> Result<TaskOutcome> {
        self.emitter.join().map_err(|_| {
            ChunkwaveError::Other(format!("Emitter for task {} panicked", self.task_id))
        })
    }
}

/// Chunked processing pipeline: Splitter → WorkerPool → ReassemblyEmitter → ChunkSink.
pub struct Pipeline {
    config: PipelineConfig,
    registry: Arc<TaskRegistry>,
    pool: WorkerPool,
    reporter: Arc<dyn ErrorReporter>,
}

impl Pipeline {
    /// Creates a pipeline with the default error reporter.
    pub fn new(config: PipelineConfig, transform: Arc<dyn ChunkTransform>) -> Result<Self> {
        Self::with_error_reporter(config, transform, Arc::new(LogReporter))
    }

    /// Creates a pipeline with a custom error reporter.
    pub fn with_error_reporter(
        config: PipelineConfig,
        transform: Arc<dyn ChunkTransform>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        let registry = Arc::new(TaskRegistry::new());
        let worker = ChunkWorker::new(registry.clone(), transform, reporter.clone());
        let pool = WorkerPool::new(config.workers, worker)?;

        Ok(Self {
            config,
            registry,
            pool,
            reporter,
        })
    }

    /// Chunk count for a resolution.
    pub fn chunk_count(&self, resolution: Resolution) -> usize {
        self.config.resolution.chunk_count(resolution)
    }

    /// Submits samples at the given resolution.
    ///
    /// Returns once the chunks are queued; results arrive at `sink` in index order.
    pub fn submit(
        &self,
        samples: &[f32],
        resolution: Resolution,
        filename: &str,
        sink: Box<dyn ChunkSink>,
    ) -> Result<TaskHandle> {
        self.submit_with_chunk_count(samples, self.chunk_count(resolution), filename, sink)
    }

    /// Submits samples split into exactly `chunk_count` chunks.
    ///
    /// # Errors
    /// `EmptyInput` or `InvalidChunkCount` before any task is registered.
    pub fn submit_with_chunk_count(
        &self,
        samples: &[f32],
        chunk_count: usize,
        filename: &str,
        sink: Box<dyn ChunkSink>,
    ) -> Result<TaskHandle> {
        let chunks = splitter::split(samples, chunk_count)?;

        let task_id = self.registry.create(filename, chunk_count);
        tracing::info!(
            %task_id,
            filename,
            samples = samples.len(),
            chunks = chunk_count,
            workers = self.pool.size(),
            "Processing file"
        );

        let (results_tx, results_rx) = crossbeam_channel::unbounded();

        let emitter = ReassemblyEmitter::new(
            task_id,
            chunk_count,
            self.registry.clone(),
            results_rx,
            sink,
            self.reporter.clone(),
        )
        .with_poll_interval(self.config.poll_interval);

        let emitter = match emitter.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                self.registry.remove(task_id);
                return Err(e);
            }
        };

        if let Err(e) = self.pool.submit_all(chunks, task_id, results_tx) {
            // The emitter observes the stop and cleans up after itself.
            if self.registry.request_stop(task_id).is_err() {
                tracing::debug!(%task_id, "Task already gone after failed dispatch");
            }
            return Err(e);
        }

        Ok(TaskHandle {
            task_id,
            chunk_count,
            emitter,
        })
    }

    /// Requests cooperative cancellation of a task.
    pub fn request_stop(&self, task_id: TaskId) -> Result<()> {
        self.registry.request_stop(task_id)?;
        tracing::info!(%task_id, "Stop requested");
        Ok(())
    }

    /// Running tasks, oldest first.
    pub fn active_tasks(&self) -> Vec<TaskInfo> {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stops accepting work and joins the worker threads after the queue drains.
    pub fn shutdown(self) {
        tracing::info!("Shutting down worker pool");
        self.pool.shutdown();
    }
}

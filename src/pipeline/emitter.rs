//! Ordered reassembly of chunk results for one task.
//!
//! Workers finish chunks in any order. The emitter is the single consumer of
//! a task's results channel: it holds early arrivals in a pending buffer and
//! hands chunks to the sink strictly by increasing index, then emits exactly
//! one terminal event and removes the task from the registry.

use crate::defaults;
use crate::error::Result;
use crate::pipeline::error::{ErrorReporter, PipelineFault};
use crate::pipeline::registry::{StopSignal, TaskRegistry};
use crate::pipeline::sink::ChunkSink;
use crate::pipeline::types::{ProcessedChunk, TaskId, TaskOutcome, TaskStatus};
use crossbeam_channel::{Receiver, select};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Why the reassembly loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitReason {
    AllEmitted,
    Cancelled,
    /// Task removed from the registry by someone else.
    Deregistered,
    /// Every producer is gone but chunks are still missing.
    ProducersGone,
}

/// Single-consumer reassembly loop for one task.
pub struct ReassemblyEmitter {
    task_id: TaskId,
    chunk_count: usize,
    registry: Arc<TaskRegistry>,
    results_rx: Receiver<ProcessedChunk>,
    sink: Box<dyn ChunkSink>,
    reporter: Arc<dyn ErrorReporter>,
    poll_interval: Duration,
    stop: Option<StopSignal>,
    next_index: usize,
    pending: BTreeMap<usize, ProcessedChunk>,
    emitted: usize,
    discarded: usize,
}

impl ReassemblyEmitter {
    pub fn new(
        task_id: TaskId,
        chunk_count: usize,
        registry: Arc<TaskRegistry>,
        results_rx: Receiver<ProcessedChunk>,
        sink: Box<dyn ChunkSink>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let stop = registry.stop_signal(task_id);
        Self {
            task_id,
            chunk_count,
            registry,
            results_rx,
            sink,
            reporter,
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
            stop,
            next_index: 0,
            pending: BTreeMap::new(),
            emitted: 0,
            discarded: 0,
        }
    }

    /// Sets the bounded wait between cancellation re-checks.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Runs the loop on a dedicated thread named after the task.
    pub fn spawn(self) -> Result<JoinHandle<TaskOutcome>> {
        let handle = thread::Builder::new()
            .name(format!("emitter-{}", self.task_id))
            .spawn(move || self.run())?;
        Ok(handle)
    }

    /// Drains the results channel until every chunk is emitted or the task is stopped.
    pub fn run(mut self) -> TaskOutcome {
        let start = Instant::now();
        let task_id = self.task_id;
        tracing::info!(%task_id, chunks = self.chunk_count, "Emitter started");

        let reason = self.reassemble();
        let status = match reason {
            ExitReason::AllEmitted => TaskStatus::Complete,
            ExitReason::Cancelled | ExitReason::Deregistered | ExitReason::ProducersGone => {
                TaskStatus::Stopped
            }
        };

        let terminal = match status {
            TaskStatus::Complete => self.sink.emit_complete(task_id),
            TaskStatus::Stopped => self.sink.emit_stopped(task_id),
        };
        if let Err(e) = terminal {
            self.report_sink_failure(e.to_string());
        }

        self.registry.remove(task_id);

        let elapsed = start.elapsed();
        match status {
            TaskStatus::Complete => tracing::info!(
                %task_id,
                emitted = self.emitted,
                elapsed_ms = elapsed.as_millis() as u64,
                "Processing complete"
            ),
            TaskStatus::Stopped => tracing::info!(
                %task_id,
                emitted = self.emitted,
                chunks = self.chunk_count,
                reason = ?reason,
                "Processing stopped"
            ),
        }
        tracing::debug!(
            %task_id,
            pending = self.pending.len(),
            discarded = self.discarded,
            "Emitter finished"
        );

        TaskOutcome {
            task_id,
            status,
            emitted: self.emitted,
            chunk_count: self.chunk_count,
            pending_at_exit: self.pending.len(),
            discarded: self.discarded,
            elapsed,
        }
    }

    fn reassemble(&mut self) -> ExitReason {
        let never = crossbeam_channel::never::<()>();
        let mut producers_gone = false;

        while self.next_index < self.chunk_count {
            if !self.registry.contains(self.task_id) {
                return ExitReason::Deregistered;
            }
            if self.registry.is_cancelled(self.task_id) {
                return ExitReason::Cancelled;
            }
            if producers_gone {
                tracing::warn!(
                    task_id = %self.task_id,
                    next_index = self.next_index,
                    pending = self.pending.len(),
                    "Results channel closed with chunks missing"
                );
                return ExitReason::ProducersGone;
            }

            let results_rx = &self.results_rx;
            let stop_rx = self.stop.as_ref().map_or(&never, |s| s.receiver());

            let received = select! {
                recv(results_rx) -> msg => match msg {
                    Ok(chunk) => Some(chunk),
                    Err(_) => {
                        producers_gone = true;
                        None
                    }
                },
                // Fires on disconnect, i.e. when the task is stopped or removed.
                recv(stop_rx) -> _ => None,
                default(self.poll_interval) => None,
            };

            if let Some(chunk) = received {
                self.accept(chunk);
            }
        }

        ExitReason::AllEmitted
    }

    /// Places one received chunk: emit it, buffer it, or discard it.
    fn accept(&mut self, chunk: ProcessedChunk) {
        let index = chunk.index;

        if index == self.next_index {
            self.emit(chunk);
            while let Some(buffered) = self.pending.remove(&self.next_index) {
                tracing::debug!(
                    task_id = %self.task_id,
                    index = buffered.index,
                    "Emitting chunk from pending"
                );
                self.emit(buffered);
            }
        } else if index > self.next_index
            && index < self.chunk_count
            && !self.pending.contains_key(&index)
        {
            tracing::debug!(
                task_id = %self.task_id,
                index,
                waiting_for = self.next_index,
                "Received out-of-order chunk, storing for later"
            );
            self.pending.insert(index, chunk);
        } else {
            self.discarded += 1;
            self.reporter.report(
                "emitter",
                &self.task_id.to_string(),
                &PipelineFault::ProtocolViolation {
                    index,
                    next_index: self.next_index,
                    chunk_count: self.chunk_count,
                },
            );
        }
    }

    fn emit(&mut self, chunk: ProcessedChunk) {
        if let Err(e) = self.sink.emit_chunk(self.task_id, &chunk) {
            self.report_sink_failure(e.to_string());
        }
        self.emitted += 1;
        self.next_index += 1;

        if self.emitted % defaults::EMIT_LOG_EVERY == 0 {
            tracing::info!(
                task_id = %self.task_id,
                index = chunk.index,
                "Emitted {}/{} chunks",
                self.emitted,
                self.chunk_count
            );
        }
    }

    fn report_sink_failure(&self, message: String) {
        self.reporter.report(
            "emitter",
            &self.task_id.to_string(),
            &PipelineFault::SinkFailed {
                sink: self.sink.name().to_string(),
                message,
            },
        );
    }
}

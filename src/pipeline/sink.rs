use crate::error::{ChunkwaveError, Result};
use crate::ipc::protocol::TaskEvent;
use crate::pipeline::types::{ProcessedChunk, SinkEvent, TaskId};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Pluggable output for ordered chunk events.
///
/// The emitter calls `emit_chunk` in strict index order, then exactly one of
/// `emit_stopped` or `emit_complete`.
pub trait ChunkSink: Send + 'static {
    /// Deliver the next chunk in order.
    fn emit_chunk(&mut self, task_id: TaskId, chunk: &ProcessedChunk) -> Result<()>;

    /// Terminal event: the task was cancelled.
    fn emit_stopped(&mut self, task_id: TaskId) -> Result<()>;

    /// Terminal event: every chunk was delivered.
    fn emit_complete(&mut self, task_id: TaskId) -> Result<()>;

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Records events in memory for tests and library use.
#[derive(Clone, Default)]
pub struct CollectorSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Indices of the recorded chunk events, in emission order.
    pub fn chunk_indices(&self) -> Vec<usize> {
        self.events()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Chunk(chunk) => Some(chunk.index),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SinkEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

impl ChunkSink for CollectorSink {
    fn emit_chunk(&mut self, _task_id: TaskId, chunk: &ProcessedChunk) -> Result<()> {
        self.push(SinkEvent::Chunk(chunk.clone()));
        Ok(())
    }

    fn emit_stopped(&mut self, _task_id: TaskId) -> Result<()> {
        self.push(SinkEvent::Stopped);
        Ok(())
    }

    fn emit_complete(&mut self, _task_id: TaskId) -> Result<()> {
        self.push(SinkEvent::Complete);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

/// Writes one JSON object per event, newline-delimited.
pub struct JsonLinesSink<W: Write + Send + 'static> {
    writer: W,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_event(&mut self, event: &TaskEvent) -> Result<()> {
        let line = serde_json::to_string(event).map_err(|e| ChunkwaveError::Other(format!(
            "Failed to serialize event: {}",
            e
        )))?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl JsonLinesSink<std::io::Stdout> {
    /// Pipe mode sink: events to stdout.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + 'static> ChunkSink for JsonLinesSink<W> {
    fn emit_chunk(&mut self, task_id: TaskId, chunk: &ProcessedChunk) -> Result<()> {
        self.write_event(&TaskEvent::chunk(task_id, chunk))
    }

    fn emit_stopped(&mut self, task_id: TaskId) -> Result<()> {
        self.write_event(&TaskEvent::Stopped { task_id })
    }

    fn emit_complete(&mut self, task_id: TaskId) -> Result<()> {
        self.write_event(&TaskEvent::Complete { task_id })
    }

    fn name(&self) -> &'static str {
        "json-lines"
    }
}

/// Fans events out to every follower of the daemon.
///
/// Having no followers is not an error: events are simply dropped.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: tokio::sync::broadcast::Sender<TaskEvent>,
}

impl BroadcastSink {
    pub fn new(tx: tokio::sync::broadcast::Sender<TaskEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: TaskEvent) {
        // Err only means nobody is following right now.
        if self.tx.send(event).is_err() {
            tracing::trace!("No followers connected, event dropped");
        }
    }
}

impl ChunkSink for BroadcastSink {
    fn emit_chunk(&mut self, task_id: TaskId, chunk: &ProcessedChunk) -> Result<()> {
        self.send(TaskEvent::chunk(task_id, chunk));
        Ok(())
    }

    fn emit_stopped(&mut self, task_id: TaskId) -> Result<()> {
        self.send(TaskEvent::Stopped { task_id });
        Ok(())
    }

    fn emit_complete(&mut self, task_id: TaskId) -> Result<()> {
        self.send(TaskEvent::Complete { task_id });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "broadcast"
    }
}

//! Data types for the chunked processing pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Opaque identifier of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Allocates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Caller-facing granularity of a task: more chunks means smaller chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Coarse,
    #[default]
    Medium,
    Fine,
}

impl Resolution {
    /// Parses a resolution name, falling back to `Medium` for anything unrecognized.
    pub fn parse_or_medium(name: &str) -> Self {
        name.parse().unwrap_or(Resolution::Medium)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Coarse => "coarse",
            Resolution::Medium => "medium",
            Resolution::Fine => "fine",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coarse" => Ok(Resolution::Coarse),
            "medium" => Ok(Resolution::Medium),
            "fine" => Ok(Resolution::Fine),
            other => Err(format!("unknown resolution '{other}'")),
        }
    }
}

/// One contiguous, index-tagged slice of the submitted samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position of this chunk in the original sequence.
    pub index: usize,
    /// Samples covered by this chunk.
    pub samples: Vec<f32>,
}

impl Chunk {
    pub fn new(index: usize, samples: Vec<f32>) -> Self {
        Self { index, samples }
    }
}

/// Diagnostic record attached to a processed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetrics {
    /// Name of the worker thread that ran the transform.
    pub worker: String,
    /// Number of input samples.
    pub input_len: usize,
    /// Wall time spent in the transform, in milliseconds.
    pub processing_ms: f64,
    /// Set when the transform failed and the payload is degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Transform output for one chunk, ready for ordered emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedChunk {
    pub index: usize,
    pub payload: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ChunkMetrics>,
}

impl ProcessedChunk {
    pub fn new(index: usize, payload: Vec<f32>) -> Self {
        Self {
            index,
            payload,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ChunkMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns true when the transform failed for this chunk.
    pub fn is_degraded(&self) -> bool {
        self.metrics.as_ref().is_some_and(|m| m.error.is_some())
    }
}

/// Terminal state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Every chunk was emitted.
    Complete,
    /// The task was cancelled before all chunks were emitted.
    Stopped,
}

/// Summary returned by the emitter when a task terminates.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// Number of chunks handed to the sink.
    pub emitted: usize,
    /// Total number of chunks the task was split into.
    pub chunk_count: usize,
    /// Out-of-order chunks still buffered when the loop exited.
    pub pending_at_exit: usize,
    /// Chunks discarded as protocol violations.
    pub discarded: usize,
    pub elapsed: Duration,
}

/// Event delivered to a sink, used by sinks that record or forward events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkEvent {
    Chunk(ProcessedChunk),
    Stopped,
    Complete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ids_are_unique() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_task_id_parse_display() {
        let id = TaskId::new();
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<TaskId>().is_err());
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!("fine".parse::<Resolution>(), Ok(Resolution::Fine));
        assert_eq!(" Coarse ".parse::<Resolution>(), Ok(Resolution::Coarse));
        assert_eq!("MEDIUM".parse::<Resolution>(), Ok(Resolution::Medium));
        assert!("ultra".parse::<Resolution>().is_err());
        assert!("low".parse::<Resolution>().is_err());
        assert!("high".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_resolution_unknown_falls_back_to_medium() {
        assert_eq!(Resolution::parse_or_medium("ultra"), Resolution::Medium);
        assert_eq!(Resolution::parse_or_medium(""), Resolution::Medium);
        assert_eq!(Resolution::parse_or_medium("fine"), Resolution::Fine);
        assert_eq!(Resolution::parse_or_medium("high"), Resolution::Medium);
    }

    #[test]
    fn test_processed_chunk_degraded() {
        let ok = ProcessedChunk::new(0, vec![1.0]);
        assert!(!ok.is_degraded());

        let failed = ProcessedChunk::new(1, Vec::new()).with_metrics(ChunkMetrics {
            worker: "worker-0".to_string(),
            input_len: 10,
            processing_ms: 0.1,
            error: Some("boom".to_string()),
        });
        assert!(failed.is_degraded());
    }

    #[test]
    fn test_sink_event_json_is_tagged() {
        let json = serde_json::to_string(&SinkEvent::Complete).unwrap();
        assert_eq!(json, r#"{"type":"complete"}"#);

        let json = serde_json::to_string(&SinkEvent::Chunk(ProcessedChunk::new(3, vec![0.5])))
            .unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""index":3"#));
        assert!(!json.contains("metrics"));
    }
}

//! JSON message protocol for IPC communication between CLI and daemon.

use crate::pipeline::types::{ProcessedChunk, Resolution, TaskId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Commands sent by CLI to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Decode a WAV file on the daemon side and start processing it
    Submit {
        path: PathBuf,
        /// Resolution name; unknown or missing names use the configured default
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resolution: Option<String>,
    },
    /// Request cancellation of a running task
    Stop { task_id: TaskId },
    /// List running tasks
    Status,
    /// Keep the connection open and stream task events
    Follow,
    /// Shutdown the daemon
    Shutdown,
}

impl Command {
    /// Serialize command to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize command from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// One running task as reported by `Status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusEntry {
    pub task_id: TaskId,
    pub filename: String,
    pub chunks: usize,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl TaskStatusEntry {
    pub fn new(
        task_id: TaskId,
        filename: String,
        chunks: usize,
        cancelled: bool,
        elapsed: Duration,
    ) -> Self {
        Self {
            task_id,
            filename,
            chunks,
            cancelled,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Responses sent by daemon to CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Command succeeded
    Ok,
    /// Processing started
    Submitted {
        task_id: TaskId,
        chunks: usize,
        workers: usize,
    },
    /// Running tasks
    Status {
        tasks: Vec<TaskStatusEntry>,
        workers: usize,
    },
    /// Follow stream accepted; events follow on the same connection
    Following,
    /// Error occurred
    Error { message: String },
}

impl Response {
    /// Serialize response to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize response from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Ordered task output, as streamed to followers and printed in pipe mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Next chunk in index order
    Chunk {
        task_id: TaskId,
        index: usize,
        payload: Vec<f32>,
        /// Transform error for a degraded (empty) payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Task ended by cancellation
    Stopped { task_id: TaskId },
    /// Task ended after its last chunk
    Complete { task_id: TaskId },
}

impl TaskEvent {
    pub fn chunk(task_id: TaskId, chunk: &ProcessedChunk) -> Self {
        TaskEvent::Chunk {
            task_id,
            index: chunk.index,
            payload: chunk.payload.clone(),
            error: chunk.metrics.as_ref().and_then(|m| m.error.clone()),
        }
    }

    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::Chunk { task_id, .. }
            | TaskEvent::Stopped { task_id }
            | TaskEvent::Complete { task_id } => *task_id,
        }
    }

    /// Returns true for `Stopped` and `Complete`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskEvent::Chunk { .. })
    }

    /// Serialize event to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize event from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Resolve an optional resolution name against a default.
pub fn resolve_resolution(name: Option<&str>, default: Resolution) -> Resolution {
    match name {
        Some(name) if !name.trim().is_empty() => Resolution::parse_or_medium(name),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::ChunkMetrics;

    #[test]
    fn test_command_all_variants_serialize() {
        let commands = vec![
            Command::Submit {
                path: PathBuf::from("/tmp/a.wav"),
                resolution: Some("fine".to_string()),
            },
            Command::Submit {
                path: PathBuf::from("/tmp/b.wav"),
                resolution: None,
            },
            Command::Stop {
                task_id: TaskId::new(),
            },
            Command::Status,
            Command::Follow,
            Command::Shutdown,
        ];

        for cmd in commands {
            let json = cmd.to_json().expect("should serialize");
            let deserialized = Command::from_json(&json).expect("should deserialize");
            assert_eq!(cmd, deserialized, "roundtrip failed for {:?}", cmd);
        }
    }

    #[test]
    fn test_json_format_is_snake_case() {
        let json = Command::Status.to_json().expect("should serialize");
        assert_eq!(json, r#"{"type":"status"}"#);

        let json = Response::Error {
            message: "x".to_string(),
        }
        .to_json()
        .expect("should serialize");
        assert!(json.contains(r#""type":"error""#));
    }

    #[test]
    fn test_submit_without_resolution_parses() {
        let cmd = Command::from_json(r#"{"type":"submit","path":"song.wav"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Submit {
                path: PathBuf::from("song.wav"),
                resolution: None,
            }
        );
    }

    #[test]
    fn test_stop_with_bad_task_id_fails_to_parse() {
        assert!(Command::from_json(r#"{"type":"stop","task_id":"nope"}"#).is_err());
    }

    #[test]
    fn test_submitted_response_fields() {
        let task_id = TaskId::new();
        let json = Response::Submitted {
            task_id,
            chunks: 100,
            workers: 4,
        }
        .to_json()
        .unwrap();
        assert!(json.contains(&format!(r#""task_id":"{}""#, task_id)));
        assert!(json.contains(r#""chunks":100"#));
    }

    #[test]
    fn test_status_entry_elapsed_ms() {
        let entry = TaskStatusEntry::new(
            TaskId::new(),
            "a.wav".to_string(),
            50,
            false,
            Duration::from_millis(1500),
        );
        assert_eq!(entry.elapsed_ms, 1500);
    }

    #[test]
    fn test_task_event_from_chunk_carries_error() {
        let task_id = TaskId::new();
        let chunk = ProcessedChunk::new(4, Vec::new()).with_metrics(ChunkMetrics {
            worker: "worker-1".to_string(),
            input_len: 10,
            processing_ms: 0.5,
            error: Some("bad".to_string()),
        });

        let event = TaskEvent::chunk(task_id, &chunk);
        assert_eq!(event.task_id(), task_id);
        assert!(!event.is_terminal());
        match event {
            TaskEvent::Chunk { index, error, .. } => {
                assert_eq!(index, 4);
                assert_eq!(error.as_deref(), Some("bad"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_task_event_terminal_json() {
        let task_id = TaskId::new();
        let event = TaskEvent::Complete { task_id };
        assert!(event.is_terminal());
        let json = event.to_json().unwrap();
        assert_eq!(json, format!(r#"{{"type":"complete","task_id":"{}"}}"#, task_id));
        assert_eq!(TaskEvent::from_json(&json).unwrap(), event);
    }

    #[test]
    fn test_resolve_resolution() {
        assert_eq!(resolve_resolution(None, Resolution::Fine), Resolution::Fine);
        assert_eq!(resolve_resolution(Some(" "), Resolution::Coarse), Resolution::Coarse);
        assert_eq!(
            resolve_resolution(Some("coarse"), Resolution::Fine),
            Resolution::Coarse
        );
        assert_eq!(
            resolve_resolution(Some("ultra"), Resolution::Fine),
            Resolution::Medium
        );
    }
}

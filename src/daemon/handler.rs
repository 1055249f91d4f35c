//! Command handler implementation for the daemon.

use crate::audio::wav;
use crate::daemon::DaemonState;
use crate::ipc::protocol::{Command, Response, TaskEvent, TaskStatusEntry, resolve_resolution};
use crate::ipc::server::CommandHandler;
use crate::pipeline::sink::BroadcastSink;
use crate::pipeline::types::TaskId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Command handler for daemon IPC commands.
pub struct DaemonCommandHandler {
    state: Arc<DaemonState>,
}

impl DaemonCommandHandler {
    /// Creates a new command handler.
    pub fn new(state: DaemonState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Decode a file and start processing it.
    async fn submit(&self, path: PathBuf, resolution: Option<String>) -> Response {
        // Decoding reads the whole file; keep it off the async workers
        let decode_path = path.clone();
        let decoded =
            match tokio::task::spawn_blocking(move || wav::decode_file(&decode_path)).await {
                Ok(Ok(decoded)) => decoded,
                Ok(Err(e)) => {
                    return Response::Error {
                        message: e.to_string(),
                    };
                }
                Err(e) => {
                    return Response::Error {
                        message: format!("Decoder task failed: {}", e),
                    };
                }
            };

        let resolution = resolve_resolution(
            resolution.as_deref(),
            self.state.config.resolution.default,
        );
        tracing::info!(
            file = %path.display(),
            duration_secs = decoded.duration_secs(),
            %resolution,
            "Decoded submission"
        );
        let sink = BroadcastSink::new(self.state.events.clone());
        let pipeline = &self.state.pipeline;

        match pipeline.submit(
            &decoded.samples,
            resolution,
            &display_name(&path),
            Box::new(sink),
        ) {
            // The emitter thread runs on its own; followers observe the result.
            Ok(handle) => Response::Submitted {
                task_id: handle.task_id(),
                chunks: handle.chunk_count(),
                workers: pipeline.workers(),
            },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        }
    }

    /// Request cancellation of a running task.
    fn stop(&self, task_id: TaskId) -> Response {
        match self.state.pipeline.request_stop(task_id) {
            Ok(()) => Response::Ok,
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        }
    }

    /// List running tasks.
    fn status(&self) -> Response {
        let tasks = self
            .state
            .pipeline
            .active_tasks()
            .into_iter()
            .map(|task| {
                TaskStatusEntry::new(
                    task.task_id,
                    task.filename,
                    task.chunk_count,
                    task.cancelled,
                    task.elapsed,
                )
            })
            .collect();

        Response::Status {
            tasks,
            workers: self.state.pipeline.workers(),
        }
    }
}

/// File name shown in status output and logs.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[async_trait::async_trait]
impl CommandHandler for DaemonCommandHandler {
    async fn handle(&self, command: Command) -> Response {
        match command {
            Command::Submit { path, resolution } => self.submit(path, resolution).await,
            Command::Stop { task_id } => self.stop(task_id),
            Command::Status => self.status(),
            Command::Follow => Response::Error {
                message: "Follow needs a streaming connection".to_string(),
            },
            Command::Shutdown => {
                // run_daemon stops the server once notified
                self.state.shutdown.notify_one();
                Response::Ok
            }
        }
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<TaskEvent>> {
        Some(self.state.events.subscribe())
    }
}

//! Daemon mode for chunkwave - owns the worker pool and the IPC server.

pub mod handler;

use crate::config::Config;
use crate::defaults;
use crate::error::{ChunkwaveError, Result};
use crate::ipc::protocol::TaskEvent;
use crate::ipc::server::IpcServer;
use crate::pipeline::orchestrator::{Pipeline, PipelineConfig};
use crate::transform;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Notify, broadcast};

/// Daemon state: pipeline, event fan-out, shutdown signal.
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    /// Shared pipeline (one worker pool for every submitted task)
    pub pipeline: Arc<Pipeline>,
    /// Ordered task events for followers
    pub events: broadcast::Sender<TaskEvent>,
    /// Notified when a client asks the daemon to shut down
    pub shutdown: Arc<Notify>,
}

impl DaemonState {
    /// Creates a new daemon state around a running pipeline.
    pub fn new(config: Config, pipeline: Pipeline) -> Self {
        let (events, _) = broadcast::channel(defaults::EVENT_BROADCAST_CAPACITY);
        Self {
            config,
            pipeline: Arc::new(pipeline),
            events,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Returns true while any task is running.
    pub fn is_busy(&self) -> bool {
        !self.pipeline.registry().is_empty()
    }
}

/// Run the daemon: start the worker pool and IPC server, wait for shutdown.
///
/// # Returns
/// Ok(()) on graceful shutdown, error otherwise
pub async fn run_daemon(config: Config, socket_path: Option<PathBuf>) -> Result<()> {
    let pipeline = Pipeline::new(
        PipelineConfig::from(&config),
        transform::from_config(&config.transform),
    )?;
    tracing::info!(
        workers = pipeline.workers(),
        transform = ?config.transform.kind,
        "Worker pool started"
    );

    let socket_path = socket_path
        .or_else(|| config.daemon.socket.clone())
        .unwrap_or_else(IpcServer::default_socket_path);

    let state = DaemonState::new(config, pipeline);
    let pipeline = Arc::clone(&state.pipeline);
    let shutdown = Arc::clone(&state.shutdown);

    let server = Arc::new(IpcServer::new(socket_path)?);
    tracing::info!("Daemon ready at {}", server.socket_path().display());

    let handler = handler::DaemonCommandHandler::new(state);

    let server_clone = Arc::clone(&server);
    let server_handle = tokio::spawn(async move { server_clone.start(handler).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT, shutting down");
        }
        res = wait_for_sigterm() => {
            if let Err(e) = res {
                tracing::error!("Error setting up signal handler: {}", e);
            }
            tracing::info!("Received SIGTERM, shutting down");
        }
        _ = shutdown.notified() => {
            tracing::info!("Shutdown requested over IPC");
        }
    }

    server.stop().await?;

    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Daemon server failed: {}", e),
        Err(e) => tracing::error!("Daemon server task failed: {}", e),
    }

    stop_all_tasks(&pipeline);
    match Arc::try_unwrap(pipeline) {
        Ok(pipeline) => pipeline.shutdown(),
        Err(_) => {
            // Open follower connections still hold the handler; the pool joins on drop.
            tracing::debug!("Pipeline still shared at shutdown");
        }
    }

    tracing::info!("Daemon stopped");
    Ok(())
}

/// Request cancellation of every running task.
fn stop_all_tasks(pipeline: &Pipeline) {
    for task in pipeline.active_tasks() {
        if let Err(e) = pipeline.request_stop(task.task_id) {
            // The task reached its terminal event in the meantime
            tracing::debug!(task_id = %task.task_id, "Skipping stop: {}", e);
        }
    }
}

/// Wait for SIGTERM signal (used by service managers).
#[cfg(unix)]
async fn wait_for_sigterm() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
        ChunkwaveError::Other(format!("Failed to register SIGTERM handler: {}", e))
    })?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sink::CollectorSink;
    use crate::transform::MockTransform;
    use std::time::Duration;

    fn test_state(mock: MockTransform) -> DaemonState {
        let pipeline = Pipeline::new(PipelineConfig::default(), Arc::new(mock)).unwrap();
        DaemonState::new(Config::default(), pipeline)
    }

    #[test]
    fn test_daemon_state_new() {
        let state = test_state(MockTransform::new());
        assert!(!state.is_busy());
        assert_eq!(state.pipeline.workers(), defaults::WORKER_COUNT);
        assert_eq!(state.events.receiver_count(), 0);
    }

    #[test]
    fn test_daemon_state_busy_while_task_runs() {
        let mock = MockTransform::new().with_default_delay(Duration::from_millis(20));
        let state = test_state(mock);

        let handle = state
            .pipeline
            .submit_with_chunk_count(&[0.1; 8], 8, "a.wav", Box::new(CollectorSink::new()))
            .unwrap();
        assert!(state.is_busy());

        handle.wait().unwrap();
        assert!(!state.is_busy());
    }

    #[test]
    fn test_stop_all_tasks_stops_running_work() {
        let mock = MockTransform::new().with_default_delay(Duration::from_millis(50));
        let state = test_state(mock);
        let sink = CollectorSink::new();

        let handle = state
            .pipeline
            .submit_with_chunk_count(&[0.1; 40], 40, "a.wav", Box::new(sink.clone()))
            .unwrap();
        stop_all_tasks(&state.pipeline);

        let outcome = handle.wait().unwrap();
        assert_eq!(outcome.status, crate::pipeline::types::TaskStatus::Stopped);
        assert!(!state.is_busy());
    }
}

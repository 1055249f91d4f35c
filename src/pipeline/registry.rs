//! Process-wide table of in-flight tasks and their cancellation flags.
//!
//! The registry is the only state shared between the control surface, the
//! worker pool and the per-task emitters. Every entry carries an atomic
//! cancellation flag plus a stop signal: a channel whose sender is dropped
//! when the task is stopped or removed, so waiters wake immediately instead
//! of sleeping out a poll interval.

use crate::error::{ChunkwaveError, Result};
use crate::pipeline::types::TaskId;
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct TaskEntry {
    filename: String,
    started_at: Instant,
    chunk_count: usize,
    cancelled: Arc<AtomicBool>,
    /// Dropped on stop; never sent on.
    stop_tx: Option<Sender<()>>,
    stop_rx: Receiver<()>,
}

/// Read-only view of a registered task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInfo {
    pub task_id: TaskId,
    pub filename: String,
    pub chunk_count: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Receiver side of a task's stop signal.
///
/// `recv` on the inner channel returns `Err(Disconnected)` as soon as the task
/// is stopped or removed from the registry.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: Receiver<()>,
}

impl StopSignal {
    /// The channel to select on.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }

    /// Returns true once the stop has been signalled.
    pub fn is_signalled(&self) -> bool {
        matches!(
            self.rx.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }
}

/// Registry of active tasks.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskId, TaskEntry>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, TaskEntry>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a new task and returns its identifier.
    pub fn create(&self, filename: &str, chunk_count: usize) -> TaskId {
        let task_id = TaskId::new();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(0);
        let entry = TaskEntry {
            filename: filename.to_string(),
            started_at: Instant::now(),
            chunk_count,
            cancelled: Arc::new(AtomicBool::new(false)),
            stop_tx: Some(stop_tx),
            stop_rx,
        };
        self.lock().insert(task_id, entry);
        task_id
    }

    /// Marks a task as cancelled.
    ///
    /// Idempotent while the task is registered. Fails with `TaskNotFound` once
    /// the task has been removed.
    pub fn request_stop(&self, task_id: TaskId) -> Result<()> {
        let mut tasks = self.lock();
        let entry = tasks
            .get_mut(&task_id)
            .ok_or_else(|| ChunkwaveError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;
        entry.cancelled.store(true, Ordering::SeqCst);
        entry.stop_tx.take();
        Ok(())
    }

    /// Returns the cancellation flag. Unknown tasks count as cancelled.
    pub fn is_cancelled(&self, task_id: TaskId) -> bool {
        self.lock()
            .get(&task_id)
            .is_none_or(|entry| entry.cancelled.load(Ordering::SeqCst))
    }

    /// Removes a task. Returns false if it was not registered.
    pub fn remove(&self, task_id: TaskId) -> bool {
        self.lock().remove(&task_id).is_some()
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.lock().contains_key(&task_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stop signal for a registered task, or `None` if it is unknown.
    pub fn stop_signal(&self, task_id: TaskId) -> Option<StopSignal> {
        self.lock().get(&task_id).map(|entry| StopSignal {
            rx: entry.stop_rx.clone(),
        })
    }

    /// Snapshot of all registered tasks, oldest first.
    pub fn snapshot(&self) -> Vec<TaskInfo> {
        let tasks = self.lock();
        let mut infos: Vec<(Instant, TaskInfo)> = tasks
            .iter()
            .map(|(id, entry)| {
                (
                    entry.started_at,
                    TaskInfo {
                        task_id: *id,
                        filename: entry.filename.clone(),
                        chunk_count: entry.chunk_count,
                        cancelled: entry.cancelled.load(Ordering::SeqCst),
                        elapsed: entry.started_at.elapsed(),
                    },
                )
            })
            .collect();
        infos.sort_by_key(|(started_at, _)| *started_at);
        infos.into_iter().map(|(_, info)| info).collect()
    }
}

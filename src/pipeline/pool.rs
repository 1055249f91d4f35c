//! Fixed-size worker pool shared by all tasks.

use crate::error::{ChunkwaveError, Result};
use crate::pipeline::types::{Chunk, ProcessedChunk, TaskId};
use crate::pipeline::worker::ChunkWorker;
use crossbeam_channel::{Sender, unbounded};
use std::thread::{self, JoinHandle};

/// One unit of work: a chunk plus where its result goes.
struct Job {
    chunk: Chunk,
    task_id: TaskId,
    results_tx: Sender<ProcessedChunk>,
}

/// Pool of worker threads pulling chunks from a shared queue.
///
/// Chunks are picked up in submission order but may finish in any order.
/// Chunks from different tasks interleave freely.
pub struct WorkerPool {
    job_tx: Option<Sender<Job>>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` worker threads named `worker-0`, `worker-1`, ...
    pub fn new(size: usize, worker: ChunkWorker) -> Result<Self> {
        if size == 0 {
            return Err(ChunkwaveError::ConfigInvalidValue {
                key: "pipeline.workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let (job_tx, job_rx) = unbounded::<Job>();
        let mut threads = Vec::with_capacity(size);

        for n in 0..size {
            let job_rx = job_rx.clone();
            let worker = worker.clone();
            let handle = thread::Builder::new()
                .name(format!("worker-{n}"))
                .spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        worker.run(job.chunk, job.task_id, &job.results_tx);
                    }
                })?;
            threads.push(handle);
        }

        tracing::info!(workers = size, "Worker pool started");

        Ok(Self {
            job_tx: Some(job_tx),
            threads,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.threads.len()
    }

    /// Enqueues every chunk of a task and returns without waiting.
    ///
    /// Each chunk gets its own clone of `results_tx`; the caller's sender is
    /// consumed so the results channel disconnects once all jobs are done.
    pub fn submit_all(
        &self,
        chunks: Vec<Chunk>,
        task_id: TaskId,
        results_tx: Sender<ProcessedChunk>,
    ) -> Result<()> {
        let job_tx = self
            .job_tx
            .as_ref()
            .ok_or_else(|| ChunkwaveError::Other("worker pool is shut down".to_string()))?;

        let count = chunks.len();
        for chunk in chunks {
            job_tx
                .send(Job {
                    chunk,
                    task_id,
                    results_tx: results_tx.clone(),
                })
                .map_err(|_| ChunkwaveError::Other("worker pool queue closed".to_string()))?;
        }

        tracing::info!(%task_id, chunks = count, "Submitted chunks for processing");
        Ok(())
    }

    /// Closes the queue and waits for workers to drain it.
    pub fn shutdown(mut self) {
        self.close_and_join();
    }

    fn close_and_join(&mut self) {
        self.job_tx.take();
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                tracing::error!(worker = %name, "Worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::LogReporter;
    use crate::pipeline::registry::TaskRegistry;
    use crate::transform::MockTransform;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn pool_with(size: usize, mock: MockTransform) -> (WorkerPool, Arc<TaskRegistry>) {
        let registry = Arc::new(TaskRegistry::new());
        let worker = ChunkWorker::new(registry.clone(), Arc::new(mock), Arc::new(LogReporter));
        (WorkerPool::new(size, worker).unwrap(), registry)
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n).map(|i| Chunk::new(i, vec![i as f32])).collect()
    }

    #[test]
    fn test_zero_workers_rejected() {
        let registry = Arc::new(TaskRegistry::new());
        let worker = ChunkWorker::new(
            registry,
            Arc::new(MockTransform::new()),
            Arc::new(LogReporter),
        );
        assert!(WorkerPool::new(0, worker).is_err());
    }

    #[test]
    fn test_every_chunk_processed_once() {
        let (pool, registry) = pool_with(4, MockTransform::new());
        let task = registry.create("a.wav", 50);
        let (tx, rx) = unbounded();

        pool.submit_all(chunks(50), task, tx).unwrap();

        // All senders live in jobs, so the channel closes when the last one finishes.
        let indices: Vec<usize> = rx.iter().map(|c| c.index).collect();
        assert_eq!(indices.len(), 50);
        let unique: HashSet<usize> = indices.into_iter().collect();
        assert_eq!(unique.len(), 50);
        assert_eq!(pool.size(), 4);
    }

    #[test]
    fn test_submit_does_not_block() {
        let mock = MockTransform::new().with_default_delay(Duration::from_millis(50));
        let (pool, registry) = pool_with(2, mock);
        let task = registry.create("a.wav", 20);
        let (tx, rx) = unbounded();

        let start = Instant::now();
        pool.submit_all(chunks(20), task, tx).unwrap();
        assert!(start.elapsed() < Duration::from_millis(50));

        assert_eq!(rx.iter().count(), 20);
    }

    #[test]
    fn test_tasks_share_the_pool() {
        let (pool, registry) = pool_with(3, MockTransform::new());
        let a = registry.create("a.wav", 10);
        let b = registry.create("b.wav", 10);
        let (tx_a, rx_a) = unbounded();
        let (tx_b, rx_b) = unbounded();

        pool.submit_all(chunks(10), a, tx_a).unwrap();
        pool.submit_all(chunks(10), b, tx_b).unwrap();

        assert_eq!(rx_a.iter().count(), 10);
        assert_eq!(rx_b.iter().count(), 10);
    }

    #[test]
    fn test_worker_threads_are_named() {
        let (pool, registry) = pool_with(1, MockTransform::new());
        let task = registry.create("a.wav", 1);
        let (tx, rx) = unbounded();

        pool.submit_all(chunks(1), task, tx).unwrap();
        let processed = rx.recv().unwrap();
        assert_eq!(processed.metrics.unwrap().worker, "worker-0");
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let (pool, registry) = pool_with(2, MockTransform::new());
        let task = registry.create("a.wav", 8);
        let (tx, rx) = unbounded();

        pool.submit_all(chunks(8), task, tx).unwrap();
        pool.shutdown();

        assert_eq!(rx.iter().count(), 8);
    }
}

//! Per-chunk transforms.
//!
//! A transform turns the samples of one chunk into a bounded-size payload.
//! Implementations must be shareable across worker threads.

pub mod spectrum;
pub mod waveform;

pub use spectrum::SpectrumTransform;
pub use waveform::WaveformTransform;

use crate::config::{TransformConfig, TransformKind};
use crate::error::{ChunkwaveError, Result};
use crate::pipeline::types::Chunk;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Trait for chunk transforms.
///
/// This trait allows swapping implementations (waveform, spectrum, mock).
pub trait ChunkTransform: Send + Sync {
    /// Transform one chunk into its payload.
    fn transform(&self, chunk: &Chunk) -> Result<Vec<f32>>;

    /// Name for logging.
    fn name(&self) -> &str;
}

impl<T: ChunkTransform + ?Sized> ChunkTransform for Arc<T> {
    fn transform(&self, chunk: &Chunk) -> Result<Vec<f32>> {
        (**self).transform(chunk)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the transform selected in the config.
pub fn from_config(config: &TransformConfig) -> Arc<dyn ChunkTransform> {
    match config.kind {
        TransformKind::Waveform => Arc::new(WaveformTransform::new(config.max_points)),
        TransformKind::Spectrum => Arc::new(SpectrumTransform::new(config.max_points)),
    }
}

/// Rejects NaN and infinite samples.
pub(crate) fn ensure_finite(chunk: &Chunk) -> Result<()> {
    match chunk.samples.iter().position(|s| !s.is_finite()) {
        Some(pos) => Err(ChunkwaveError::Transform {
            message: format!(
                "non-finite sample at offset {} of chunk {}",
                pos, chunk.index
            ),
        }),
        None => Ok(()),
    }
}

/// Mock transform for testing.
///
/// Echoes the chunk samples back as the payload. Individual chunk indices can
/// be delayed, made to fail, or made to panic.
#[derive(Debug, Clone, Default)]
pub struct MockTransform {
    delays: HashMap<usize, Duration>,
    default_delay: Duration,
    failures: HashSet<usize>,
    panics: HashSet<usize>,
    calls: Arc<AtomicUsize>,
}

impl MockTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before returning for the given index.
    pub fn with_delay(mut self, index: usize, delay: Duration) -> Self {
        self.delays.insert(index, delay);
        self
    }

    /// Sleep this long for every index without a specific delay.
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Delay chunk `i` by `(chunk_count - 1 - i) * step`, so chunks finish in reverse order.
    pub fn with_reverse_delays(mut self, chunk_count: usize, step: Duration) -> Self {
        for index in 0..chunk_count {
            let steps = u32::try_from(chunk_count - 1 - index).unwrap_or(u32::MAX);
            self.delays.insert(index, step * steps);
        }
        self
    }

    /// Return a transform error for the given index.
    pub fn with_failure(mut self, index: usize) -> Self {
        self.failures.insert(index);
        self
    }

    /// Panic inside the transform for the given index.
    pub fn with_panic(mut self, index: usize) -> Self {
        self.panics.insert(index);
        self
    }

    /// Number of times `transform` has been entered.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChunkTransform for MockTransform {
    fn transform(&self, chunk: &Chunk) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self
            .delays
            .get(&chunk.index)
            .copied()
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        if self.panics.contains(&chunk.index) {
            panic!("mock transform panic on chunk {}", chunk.index);
        }
        if self.failures.contains(&chunk.index) {
            return Err(ChunkwaveError::Transform {
                message: format!("mock transform failure on chunk {}", chunk.index),
            });
        }

        Ok(chunk.samples.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

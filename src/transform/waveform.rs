//! Peak-preserving waveform downsampling.

use crate::error::Result;
use crate::pipeline::types::Chunk;
use crate::transform::{ChunkTransform, ensure_finite};

/// Reduces a chunk to at most `max_points` samples for display.
///
/// Each output value is the signed sample with the largest magnitude in its
/// bucket, so transients survive downsampling.
#[derive(Debug, Clone)]
pub struct WaveformTransform {
    max_points: usize,
}

impl WaveformTransform {
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points: max_points.max(1),
        }
    }
}

impl ChunkTransform for WaveformTransform {
    fn transform(&self, chunk: &Chunk) -> Result<Vec<f32>> {
        ensure_finite(chunk)?;
        Ok(peak_downsample(&chunk.samples, self.max_points))
    }

    fn name(&self) -> &str {
        "waveform"
    }
}

/// Bucketed peak reduction; returns the input unchanged when it already fits.
pub(crate) fn peak_downsample(samples: &[f32], max_points: usize) -> Vec<f32> {
    if samples.len() <= max_points {
        return samples.to_vec();
    }

    let len = samples.len();
    (0..max_points)
        .map(|bucket| {
            let start = bucket * len / max_points;
            let end = ((bucket + 1) * len / max_points).max(start + 1);
            samples[start..end]
                .iter()
                .copied()
                .fold(0.0f32, |peak, s| if s.abs() > peak.abs() { s } else { peak })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_chunk_is_identity() {
        let transform = WaveformTransform::new(8);
        let chunk = Chunk::new(0, vec![0.1, -0.2, 0.3]);
        assert_eq!(transform.transform(&chunk).unwrap(), vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn test_downsample_keeps_signed_peaks() {
        let samples = vec![0.1, -0.9, 0.2, 0.3, 0.5, -0.4, 0.0, 0.05];
        assert_eq!(peak_downsample(&samples, 4), vec![-0.9, 0.3, 0.5, 0.05]);
    }

    #[test]
    fn test_output_is_bounded() {
        let samples: Vec<f32> = (0..10_000).map(|i| (i as f32 * 0.01).sin()).collect();
        let out = peak_downsample(&samples, 256);
        assert_eq!(out.len(), 256);
        assert!(out.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_empty_chunk() {
        let transform = WaveformTransform::new(16);
        assert!(transform.transform(&Chunk::new(0, vec![])).unwrap().is_empty());
    }

    #[test]
    fn test_non_finite_input_fails() {
        let transform = WaveformTransform::new(16);
        assert!(transform.transform(&Chunk::new(0, vec![f32::INFINITY])).is_err());
    }

    #[test]
    fn test_zero_max_points_clamped() {
        let transform = WaveformTransform::new(0);
        let out = transform.transform(&Chunk::new(0, vec![0.5, -0.7])).unwrap();
        assert_eq!(out, vec![-0.7]);
    }
}

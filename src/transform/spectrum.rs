//! Magnitude spectrum of a chunk, averaged down to a bounded number of bins.

use crate::error::Result;
use crate::pipeline::types::Chunk;
use crate::transform::{ChunkTransform, ensure_finite};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::{Arc, Mutex};

/// Hann-windowed FFT magnitude spectrum.
///
/// Produces `len / 2 + 1` magnitude bins scaled by `2 / len`, then averages
/// adjacent bins until at most `max_points` remain.
pub struct SpectrumTransform {
    max_points: usize,
    planner: Mutex<FftPlanner<f32>>,
}

impl SpectrumTransform {
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points: max_points.max(1),
            planner: Mutex::new(FftPlanner::new()),
        }
    }

    fn plan(&self, len: usize) -> Arc<dyn Fft<f32>> {
        let mut planner = self.planner.lock().unwrap_or_else(|e| e.into_inner());
        planner.plan_fft_forward(len)
    }
}

impl ChunkTransform for SpectrumTransform {
    fn transform(&self, chunk: &Chunk) -> Result<Vec<f32>> {
        ensure_finite(chunk)?;
        let len = chunk.samples.len();
        if len == 0 {
            return Ok(Vec::new());
        }

        let window = hann_window(len);
        let mut buffer: Vec<Complex<f32>> = chunk
            .samples
            .iter()
            .zip(&window)
            .map(|(s, w)| Complex::new(s * w, 0.0))
            .collect();

        self.plan(len).process(&mut buffer);

        let scale = 2.0 / len as f32;
        let magnitudes: Vec<f32> = buffer[..len / 2 + 1]
            .iter()
            .map(|c| c.norm() * scale)
            .collect();

        Ok(average_bins(&magnitudes, self.max_points))
    }

    fn name(&self) -> &str {
        "spectrum"
    }
}

/// Periodic Hann window.
fn hann_window(len: usize) -> Vec<f32> {
    if len == 1 {
        return vec![1.0];
    }
    (0..len)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / len as f32;
            0.5 - 0.5 * phase.cos()
        })
        .collect()
}

/// Averages adjacent values into at most `max_points` buckets.
fn average_bins(values: &[f32], max_points: usize) -> Vec<f32> {
    if values.len() <= max_points {
        return values.to_vec();
    }

    let len = values.len();
    (0..max_points)
        .map(|bucket| {
            let start = bucket * len / max_points;
            let end = ((bucket + 1) * len / max_points).max(start + 1);
            let slice = &values[start..end];
            slice.iter().sum::<f32>() / slice.len() as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, cycles: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * cycles * i as f32 / len as f32).sin())
            .collect()
    }

    #[test]
    fn test_pure_tone_peaks_at_its_bin() {
        let transform = SpectrumTransform::new(1024);
        let out = transform.transform(&Chunk::new(0, sine(256, 16.0))).unwrap();

        assert_eq!(out.len(), 129);
        let peak_bin = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, 16);
    }

    #[test]
    fn test_output_is_bounded() {
        let transform = SpectrumTransform::new(32);
        let out = transform.transform(&Chunk::new(0, sine(4096, 100.0))).unwrap();
        assert_eq!(out.len(), 32);
        assert!(out.iter().all(|m| m.is_finite() && *m >= 0.0));
    }

    #[test]
    fn test_silence_has_zero_spectrum() {
        let transform = SpectrumTransform::new(64);
        let out = transform.transform(&Chunk::new(0, vec![0.0; 100])).unwrap();
        assert!(out.iter().all(|m| *m == 0.0));
    }

    #[test]
    fn test_empty_and_single_sample() {
        let transform = SpectrumTransform::new(64);
        assert!(transform.transform(&Chunk::new(0, vec![])).unwrap().is_empty());
        let out = transform.transform(&Chunk::new(0, vec![0.5])).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_non_finite_input_fails() {
        let transform = SpectrumTransform::new(64);
        assert!(transform.transform(&Chunk::new(0, vec![f32::NAN; 4])).is_err());
    }

    #[test]
    fn test_average_bins() {
        assert_eq!(average_bins(&[1.0, 3.0, 5.0, 7.0], 2), vec![2.0, 6.0]);
        assert_eq!(average_bins(&[1.0, 2.0], 4), vec![1.0, 2.0]);
    }
}

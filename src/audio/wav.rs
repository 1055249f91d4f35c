//! WAV decoding into mono, peak-normalized samples.

use crate::error::{ChunkwaveError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Decoded audio, ready to be split.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Mono samples in [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate of the source file
    pub sample_rate: u32,
    /// Channel count of the source file (before downmix)
    pub channels: u16,
}

impl DecodedAudio {
    /// Duration of the decoded audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode WAV data from any reader.
///
/// Integer and float formats are accepted. Interleaved channels are averaged
/// to mono, then the buffer is scaled so its largest magnitude is 1.0.
pub fn decode_wav<R: Read>(reader: R) -> Result<DecodedAudio> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| ChunkwaveError::AudioDecode {
        message: format!("Failed to parse WAV data: {}", e),
    })?;

    let spec = wav_reader.spec();
    if spec.channels == 0 {
        return Err(ChunkwaveError::AudioDecode {
            message: "WAV header declares zero channels".to_string(),
        });
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => wav_reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        hound::SampleFormat::Int => wav_reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32))
            .collect::<std::result::Result<Vec<_>, _>>(),
    }
    .map_err(|e| ChunkwaveError::AudioDecode {
        message: format!("Failed to read WAV samples: {}", e),
    })?;

    let mut samples = downmix(&interleaved, spec.channels);
    normalize_peak(&mut samples);

    tracing::debug!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        samples = samples.len(),
        "Decoded WAV"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Decode a WAV file from disk.
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let file = File::open(path).map_err(|e| ChunkwaveError::AudioDecode {
        message: format!("Failed to open {}: {}", path.display(), e),
    })?;
    decode_wav(BufReader::new(file))
}

/// Average interleaved frames down to one channel. Trailing partial frames are dropped.
fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let channels = channels as usize;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Scale samples so the largest magnitude becomes 1.0. Silence is left untouched.
fn normalize_peak(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |max, s| max.max(s.abs()));
    if peak > 0.0 && peak.is_finite() {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}

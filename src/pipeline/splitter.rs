//! Near-equal partitioning of a sample buffer into indexed chunks.

use crate::error::{ChunkwaveError, Result};
use crate::pipeline::types::Chunk;

/// Splits `samples` into `chunk_count` contiguous chunks.
///
/// The first `len % chunk_count` chunks hold one extra sample, so chunk
/// lengths never differ by more than one. When there are fewer samples than
/// chunks the trailing chunks are empty.
pub fn split(samples: &[f32], chunk_count: usize) -> Result<Vec<Chunk>> {
    if samples.is_empty() {
        return Err(ChunkwaveError::EmptyInput);
    }
    if chunk_count == 0 {
        return Err(ChunkwaveError::InvalidChunkCount);
    }

    let base = samples.len() / chunk_count;
    let extra = samples.len() % chunk_count;

    let mut chunks = Vec::with_capacity(chunk_count);
    let mut start = 0;
    for index in 0..chunk_count {
        let len = base + usize::from(index < extra);
        chunks.push(Chunk::new(index, samples[start..start + len].to_vec()));
        start += len;
    }

    Ok(chunks)
}

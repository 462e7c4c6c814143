//! Diffs the staging buffer's on-chain bytes against the local payload.

use crate::chunk::ChunkPlan;

/// Indices of chunks whose on-chain bytes disagree with the local payload.
///
/// `remote_window` is the buffer account's data with the metadata header
/// stripped. A window shorter than the payload marks the unreachable chunks
/// missing. An empty result is the only convergence signal; per-write
/// acknowledgements are never trusted.
pub fn missing_chunks(plan: &ChunkPlan, payload: &[u8], remote_window: &[u8]) -> Vec<u32> {
    plan.chunks()
        .filter(|chunk| {
            let start = chunk.offset as usize;
            let end = start + chunk.length as usize;
            match (payload.get(start..end), remote_window.get(start..end)) {
                (Some(local), Some(remote)) => local != remote,
                _ => true,
            }
        })
        .map(|chunk| chunk.index)
        .collect()
}

//! Pure planning of how a payload splits into fixed-capacity write chunks.

use crate::error::DeployError;

/// One write request's worth of payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Chunk {
    pub index: u32,
    pub offset: u32,
    pub length: u32,
}

/// Ordered cover of `[0, payload_len)` by chunks of at most `capacity`
/// bytes. Derived once per upload and immutable thereafter.
#[derive(Clone, Debug)]
pub struct ChunkPlan {
    payload_len: u32,
    capacity: u32,
    chunk_count: u32,
}

impl ChunkPlan {
    pub fn new(payload_len: u32, capacity: u32) -> Result<Self, DeployError> {
        if capacity == 0 {
            return Err(DeployError::InvalidChunkCapacity);
        }
        if payload_len == 0 {
            return Err(DeployError::EmptyPayload);
        }
        let chunk_count =
            ((payload_len as u64 + capacity as u64 - 1) / capacity as u64) as u32;
        Ok(Self {
            payload_len,
            capacity,
            chunk_count,
        })
    }

    pub fn payload_len(&self) -> u32 {
        self.payload_len
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    pub fn chunk(&self, index: u32) -> Option<Chunk> {
        (index < self.chunk_count).then(|| self.chunk_unchecked(index))
    }

    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        (0..self.chunk_count).map(|index| self.chunk_unchecked(index))
    }

    fn chunk_unchecked(&self, index: u32) -> Chunk {
        let offset = index * self.capacity;
        Chunk {
            index,
            offset,
            length: self.capacity.min(self.payload_len - offset),
        }
    }
}

//! The signed requests the deployment pipeline submits, and the wire
//! constants that bound them.

use {
    crate::address::Address,
    serde_derive::{Deserialize, Serialize},
    std::fmt,
};

/// Maximum size in bytes of a single signed request packet.
pub const MAX_REQUEST_SIZE: usize = 1232;

/// Bytes of a write request consumed by the signature and control fields.
pub const REQUEST_OVERHEAD: usize = 264;

/// Largest slice of payload data a single write request can carry.
pub const WRITE_CHUNK_CAPACITY: usize = MAX_REQUEST_SIZE - REQUEST_OVERHEAD;

/// Size of the staging buffer metadata header preceding the data window.
pub const BUFFER_HEADER_SIZE: usize = 37;

/// Size of a program pointer account.
pub const PROGRAM_ACCOUNT_SIZE: usize = 36;

/// Size of the program data metadata header.
pub const PROGRAM_DATA_HEADER_SIZE: usize = 45;

/// A request to be signed and submitted to the ledger.
///
/// Submission is fire-and-forget; durability is established either by
/// confirming the returned handle or by reading the affected account back.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Request {
    /// Create and initialize the staging buffer account.
    CreateBuffer {
        buffer: Address,
        authority: Address,
        space: u64,
        funding: u64,
    },
    /// Write one chunk of payload data at `offset` within the buffer's data
    /// window.
    WriteChunk {
        buffer: Address,
        authority: Address,
        offset: u32,
        bytes: Vec<u8>,
    },
    /// Install a new program from a converged staging buffer. `max_data_len`
    /// bounds future upgrades.
    DeployProgram {
        program: Address,
        buffer: Address,
        authority: Address,
        payer: Address,
        max_data_len: u32,
        funding: u64,
    },
    /// Upgrade an existing program in place from a converged staging buffer,
    /// refunding the buffer deposit difference to `spill`.
    UpgradeProgram {
        program: Address,
        buffer: Address,
        authority: Address,
        spill: Address,
    },
    /// Close the staging buffer and reclaim its deposit to `recipient`.
    CloseBuffer {
        buffer: Address,
        authority: Address,
        recipient: Address,
    },
}

impl Request {
    /// The wire bytes that get signed and submitted.
    pub fn serialize(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap()
    }
}

/// Opaque handle identifying a submitted request, used to await its durable
/// outcome.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct RequestHandle(u64);

impl RequestHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_chunk_fits_request_size() {
        let request = Request::WriteChunk {
            buffer: Address::new_unique(),
            authority: Address::new_unique(),
            offset: u32::MAX,
            bytes: vec![0xa5; WRITE_CHUNK_CAPACITY],
        };
        assert!(request.serialize().len() <= MAX_REQUEST_SIZE);
    }

    #[test]
    fn test_round_trip() {
        let request = Request::CloseBuffer {
            buffer: Address::new_unique(),
            authority: Address::new_unique(),
            recipient: Address::new_unique(),
        };
        let deserialized: Request = bincode::deserialize(&request.serialize()).unwrap();
        assert_eq!(deserialized, request);
    }
}

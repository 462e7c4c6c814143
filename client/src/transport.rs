//! Errors crossing the client boundary, split between transport faults and
//! failures reported by the ledger at confirmation time.

use {std::io, thiserror::Error};

/// Failure codes the ledger attaches to a confirmed-but-failed request.
///
/// The two named codes are terminal for finalization; everything else is
/// treated as retryable by the caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureCode {
    /// The destination program key was not the one the request expected.
    ProgramIdMismatch,
    /// The destination side could not cover the funds the request moved.
    InsufficientFunds,
    /// Any other failure code.
    Custom(u32),
}

impl FailureCode {
    pub fn from_code(code: u32) -> Self {
        match code {
            0x0 => Self::ProgramIdMismatch,
            0x1 => Self::InsufficientFunds,
            code => Self::Custom(code),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("request failed at confirmation: {0:?}")]
    Failure(FailureCode),
}

pub type Result<T> = std::result::Result<T, TransportError>;

//! Defines a trait for blocking (synchronous) communication with the ledger.
//! Implementations are expected to sign requests, submit them over their
//! transport of choice, and expose point-in-time account reads.

use crate::{
    address::Address,
    request::{Request, RequestHandle},
    transport::Result,
};

/// Point-in-time view of an account. Reads may lag recent writes; callers
/// that need durability must read back and compare content.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AccountSnapshot {
    pub data: Vec<u8>,
    pub funding: u64,
}

pub trait LedgerClient: Send + Sync {
    /// Sign and fire a request. Success only means the request entered the
    /// network, never that it was applied.
    fn submit_request(&self, request: &Request) -> Result<RequestHandle>;

    /// Await the durable outcome of a previously submitted request. A
    /// confirmed-but-failed request surfaces as
    /// [`TransportError::Failure`](crate::transport::TransportError::Failure).
    fn confirm_request(&self, handle: &RequestHandle) -> Result<()>;

    /// Read an account, or `None` if it does not exist or is not visible to
    /// this endpoint yet.
    fn read_account(&self, address: &Address) -> Result<Option<AccountSnapshot>>;

    /// Minimum funding for an account of `space` bytes to persist durably.
    fn minimum_funding(&self, space: u64) -> Result<u64>;

    /// Current balance of `address`, or 0 if the account does not exist.
    fn balance(&self, address: &Address) -> Result<u64>;

    /// Amount a faucet-style top-up on this endpoint grants, if one exists.
    /// Used only to enrich funding error messages.
    fn airdrop_amount(&self) -> Option<u64> {
        None
    }
}

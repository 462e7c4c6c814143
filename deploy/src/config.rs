//! Tunables for the deployment pipeline. The defaults match the production
//! constants; embedders only ever need to supply the signing identity.

use {
    loader_client::{address::Address, request::WRITE_CHUNK_CAPACITY},
    std::time::Duration,
};

/// Number of concurrent chunk-write workers.
pub const DEFAULT_WRITE_CONCURRENCY: usize = 8;

/// Delay between a write pass and the verification read, long enough for the
/// network to settle one block.
pub const DEFAULT_PACING_DELAY: Duration = Duration::from_millis(500);

/// Interval between verification read attempts while the endpoint catches up.
pub const DEFAULT_READ_RETRY_INTERVAL: Duration = Duration::from_millis(2000);

/// Bounded retry policy with exponential backoff, shared in shape (but never
/// in state) by buffer creation and finalization.
#[derive(Clone, Debug)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
            multiplier: 1.6,
        }
    }
}

/// What a write worker does when a chunk submission fails.
///
/// Deferring is the production behavior: the per-chunk retry cost is paid by
/// the next verification pass rather than by the worker.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WriteFailurePolicy {
    /// Log the failure and move on to the next pending chunk.
    #[default]
    Defer,
    /// Retry the same chunk in place up to this many extra attempts before
    /// deferring.
    RetryInPlace(u32),
}

#[derive(Clone, Debug)]
pub struct DeployConfig {
    /// Identity that signs and pays for every request.
    pub authority: Address,
    /// Address derived from the program keypair the caller controls, when it
    /// has one. Required for an initial deployment.
    pub program_identity: Option<Address>,
    /// Maximum payload bytes per write request.
    pub chunk_capacity: u32,
    pub write_concurrency: usize,
    pub write_failure_policy: WriteFailurePolicy,
    pub pacing_delay: Duration,
    pub read_retry_interval: Duration,
    pub retry_budget: RetryBudget,
}

impl DeployConfig {
    pub fn new(authority: Address) -> Self {
        Self {
            authority,
            program_identity: None,
            chunk_capacity: WRITE_CHUNK_CAPACITY as u32,
            write_concurrency: DEFAULT_WRITE_CONCURRENCY,
            write_failure_policy: WriteFailurePolicy::default(),
            pacing_delay: DEFAULT_PACING_DELAY,
            read_retry_interval: DEFAULT_READ_RETRY_INTERVAL,
            retry_budget: RetryBudget::default(),
        }
    }
}

//! An in-memory [`LedgerClient`] for tests.
//!
//! Applies [`Request`] semantics to a map of accounts and supports the fault
//! injection the pipeline tests need: refused or silently dropped chunk
//! writes, reads that lag behind writes, classified confirmation failures,
//! and creation acknowledgements that get lost in flight.

use {
    crate::{
        address::Address,
        ledger_client::{AccountSnapshot, LedgerClient},
        request::{Request, RequestHandle, BUFFER_HEADER_SIZE},
        transport::{FailureCode, Result, TransportError},
    },
    std::{
        collections::{HashMap, HashSet, VecDeque},
        io,
        sync::Mutex,
        thread,
        time::Duration,
    },
};

/// Account storage overhead and flat per-byte rate backing
/// [`LedgerClient::minimum_funding`].
const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;
const FUNDING_RATE_PER_BYTE: u64 = 10;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MockAccount {
    pub data: Vec<u8>,
    pub funding: u64,
}

#[derive(Default)]
struct MockLedgerState {
    accounts: HashMap<Address, MockAccount>,
    balances: HashMap<Address, u64>,
    submitted: Vec<Request>,
    confirm_outcomes: HashMap<u64, std::result::Result<(), FailureCode>>,
    next_handle: u64,

    chunk_submit_failures: HashMap<u32, u32>,
    dropped_chunk_writes: HashSet<u32>,
    hidden_reads: HashMap<Address, u32>,
    finalize_failures: VecDeque<FailureCode>,
    buffer_creation_failures: u32,
    lost_creation_acks: u32,
    fail_close: bool,
    submit_delay: Option<Duration>,

    in_flight: usize,
    max_in_flight: usize,
}

#[derive(Default)]
pub struct MockLedger {
    airdrop_amount: Option<u64>,
    state: Mutex<MockLedgerState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose endpoint advertises a faucet granting `amount` units.
    pub fn with_airdrop(amount: u64) -> Self {
        Self {
            airdrop_amount: Some(amount),
            ..Self::default()
        }
    }

    pub fn set_balance(&self, address: &Address, amount: u64) {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(*address, amount);
    }

    /// Hold every submission open for `delay` before applying it, so that
    /// tests can observe submissions overlapping in flight.
    pub fn set_submit_delay(&self, delay: Duration) {
        self.state.lock().unwrap().submit_delay = Some(delay);
    }

    /// Refuse the next `times` chunk submissions targeting `offset`.
    pub fn fail_chunk_submissions(&self, offset: u32, times: u32) {
        self.state
            .lock()
            .unwrap()
            .chunk_submit_failures
            .insert(offset, times);
    }

    /// Acknowledge the next chunk write at `offset` without applying it.
    pub fn drop_chunk_write(&self, offset: u32) {
        self.state
            .lock()
            .unwrap()
            .dropped_chunk_writes
            .insert(offset);
    }

    /// Make the next `times` reads of `address` return `None`, as a lagging
    /// endpoint would.
    pub fn hide_account_reads(&self, address: &Address, times: u32) {
        self.state
            .lock()
            .unwrap()
            .hidden_reads
            .insert(*address, times);
    }

    /// Confirm the next install/upgrade submission with `code` instead of
    /// applying it.
    pub fn queue_finalize_failure(&self, code: FailureCode) {
        self.state.lock().unwrap().finalize_failures.push_back(code);
    }

    /// Refuse the next `times` buffer creation submissions outright.
    pub fn fail_buffer_creations(&self, times: u32) {
        self.state.lock().unwrap().buffer_creation_failures = times;
    }

    /// Apply the next buffer creation but report its submission as failed,
    /// as if the acknowledgement was lost on the way back.
    pub fn lose_buffer_creation_ack(&self) {
        self.state.lock().unwrap().lost_creation_acks += 1;
    }

    /// Refuse buffer close submissions from now on.
    pub fn fail_buffer_close(&self) {
        self.state.lock().unwrap().fail_close = true;
    }

    pub fn account(&self, address: &Address) -> Option<MockAccount> {
        self.state.lock().unwrap().accounts.get(address).cloned()
    }

    /// The buffer account's data window with the metadata header stripped.
    pub fn buffer_window(&self, address: &Address) -> Option<Vec<u8>> {
        self.account(address)
            .map(|account| account.data.get(BUFFER_HEADER_SIZE..).unwrap_or_default().to_vec())
    }

    pub fn account_count(&self) -> usize {
        self.state.lock().unwrap().accounts.len()
    }

    pub fn submitted_requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn write_submissions(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .submitted
            .iter()
            .filter(|request| matches!(request, Request::WriteChunk { .. }))
            .count()
    }

    pub fn finalize_submissions(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .submitted
            .iter()
            .filter(|request| {
                matches!(
                    request,
                    Request::DeployProgram { .. } | Request::UpgradeProgram { .. }
                )
            })
            .count()
    }

    /// Largest number of submissions that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    fn apply(&self, request: &Request) -> Result<RequestHandle> {
        let mut state = self.state.lock().unwrap();
        state.submitted.push(request.clone());
        let mut outcome = Ok(());
        match request {
            Request::CreateBuffer {
                buffer,
                authority,
                space,
                funding,
            } => {
                if state.buffer_creation_failures > 0 {
                    state.buffer_creation_failures -= 1;
                    return Err(refused());
                }
                let lost_ack = state.lost_creation_acks > 0;
                if lost_ack {
                    state.lost_creation_acks -= 1;
                }
                if !state.accounts.contains_key(buffer) {
                    state.accounts.insert(
                        *buffer,
                        MockAccount {
                            data: vec![0; *space as usize],
                            funding: *funding,
                        },
                    );
                    debit(&mut state, authority, *funding);
                }
                if lost_ack {
                    return Err(refused());
                }
            }
            Request::WriteChunk {
                buffer,
                offset,
                bytes,
                ..
            } => {
                if let Some(remaining) = state.chunk_submit_failures.get_mut(offset) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(refused());
                    }
                }
                if !state.dropped_chunk_writes.remove(offset) {
                    let start = BUFFER_HEADER_SIZE + *offset as usize;
                    let end = start + bytes.len();
                    let account = state.accounts.get_mut(buffer).ok_or_else(not_found)?;
                    if end > account.data.len() {
                        return Err(refused());
                    }
                    account.data[start..end].copy_from_slice(bytes);
                }
            }
            Request::DeployProgram {
                program,
                buffer,
                payer,
                funding,
                ..
            } => match state.finalize_failures.pop_front() {
                Some(code) => outcome = Err(code),
                None => {
                    let image = window_of(&state, buffer);
                    state.accounts.insert(
                        *program,
                        MockAccount {
                            data: image,
                            funding: *funding,
                        },
                    );
                    debit(&mut state, payer, *funding);
                }
            },
            Request::UpgradeProgram {
                program, buffer, ..
            } => match state.finalize_failures.pop_front() {
                Some(code) => outcome = Err(code),
                None => {
                    let image = window_of(&state, buffer);
                    if let Some(account) = state.accounts.get_mut(program) {
                        account.data = image;
                    }
                }
            },
            Request::CloseBuffer {
                buffer, recipient, ..
            } => {
                if state.fail_close {
                    return Err(refused());
                }
                if let Some(account) = state.accounts.remove(buffer) {
                    credit(&mut state, recipient, account.funding);
                }
            }
        }
        let handle = RequestHandle::new(state.next_handle);
        state.next_handle += 1;
        state.confirm_outcomes.insert(handle.id(), outcome);
        Ok(handle)
    }
}

impl LedgerClient for MockLedger {
    fn submit_request(&self, request: &Request) -> Result<RequestHandle> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.submit_delay
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        let result = self.apply(request);
        self.state.lock().unwrap().in_flight -= 1;
        result
    }

    fn confirm_request(&self, handle: &RequestHandle) -> Result<()> {
        let outcome = self
            .state
            .lock()
            .unwrap()
            .confirm_outcomes
            .remove(&handle.id());
        match outcome {
            Some(Err(code)) => Err(TransportError::Failure(code)),
            Some(Ok(())) | None => Ok(()),
        }
    }

    fn read_account(&self, address: &Address) -> Result<Option<AccountSnapshot>> {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.hidden_reads.get_mut(address) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
        }
        Ok(state.accounts.get(address).map(|account| AccountSnapshot {
            data: account.data.clone(),
            funding: account.funding,
        }))
    }

    fn minimum_funding(&self, space: u64) -> Result<u64> {
        Ok((ACCOUNT_STORAGE_OVERHEAD + space) * FUNDING_RATE_PER_BYTE)
    }

    fn balance(&self, address: &Address) -> Result<u64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .balances
            .get(address)
            .copied()
            .unwrap_or(0))
    }

    fn airdrop_amount(&self) -> Option<u64> {
        self.airdrop_amount
    }
}

fn window_of(state: &MockLedgerState, buffer: &Address) -> Vec<u8> {
    state
        .accounts
        .get(buffer)
        .and_then(|account| account.data.get(BUFFER_HEADER_SIZE..))
        .unwrap_or_default()
        .to_vec()
}

fn debit(state: &mut MockLedgerState, address: &Address, amount: u64) {
    let balance = state.balances.entry(*address).or_insert(0);
    *balance = balance.saturating_sub(amount);
}

fn credit(state: &mut MockLedgerState, address: &Address, amount: u64) {
    *state.balances.entry(*address).or_insert(0) += amount;
}

fn refused() -> TransportError {
    TransportError::Io(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "mock: submission refused",
    ))
}

fn not_found() -> TransportError {
    TransportError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        "mock: no such account",
    ))
}

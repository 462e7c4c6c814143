//! One-call composition of the pipeline: stage, converge, finalize, clean up.

use {
    crate::{
        buffer,
        chunk::ChunkPlan,
        config::DeployConfig,
        error::DeployError,
        events::EventSender,
        finalize,
        upload::{self, UploadStatus},
    },
    loader_client::{
        address::Address,
        ledger_client::LedgerClient,
        request::{RequestHandle, BUFFER_HEADER_SIZE},
    },
    log::*,
    std::{
        sync::atomic::AtomicBool,
        thread::sleep,
        time::Instant,
    },
};

/// Outcome of a full deploy attempt. Cancellation is an outcome, not an
/// error; the caller asked for it.
#[derive(Debug)]
pub enum DeployOutcome {
    /// Finalization confirmed; carries the install/upgrade request handle.
    Deployed(RequestHandle),
    /// The caller cancelled before the staging buffer converged. The buffer
    /// has been closed; nothing is guaranteed about the destination.
    Cancelled,
}

/// Publish `payload` to `program`: create and fund a staging buffer,
/// converge it chunk by chunk, then install or upgrade the program from it.
/// The staging buffer is closed on every terminal path.
pub fn process_deploy<C: LedgerClient>(
    client: &C,
    program: &Address,
    payload: &[u8],
    config: &DeployConfig,
    exit: &AtomicBool,
    events: &EventSender,
) -> Result<DeployOutcome, DeployError> {
    // A malformed plan must surface before any balance check or paid
    // submission.
    ChunkPlan::new(payload.len() as u32, config.chunk_capacity)?;

    // Make sure the whole deployment is affordable before paying for the
    // buffer; the finalizer re-checks against its own fresh reads.
    let space = (BUFFER_HEADER_SIZE + payload.len()) as u64;
    let funding = client.minimum_funding(space)?;
    let program_exists = client.read_account(program)?.is_some();
    let required = if program_exists {
        funding
    } else {
        funding.saturating_mul(3)
    };
    let balance = client.balance(&config.authority)?;
    if balance < required {
        return Err(DeployError::insufficient_funds(
            required,
            balance,
            client.airdrop_amount(),
        ));
    }

    let start = Instant::now();
    let staging = buffer::create_buffer(client, payload.len(), config, events)?;

    // The staging deposit is reclaimed however the upload ends; only a
    // converged buffer proceeds to finalization.
    match upload::upload_payload(client, &staging.address, payload, config, exit, events) {
        Ok(UploadStatus::Converged) => (),
        Ok(UploadStatus::Cancelled) => {
            buffer::close_buffer(client, &staging, &config.authority, config);
            return Ok(DeployOutcome::Cancelled);
        }
        Err(err) => {
            buffer::close_buffer(client, &staging, &config.authority, config);
            return Err(err);
        }
    }

    // The loader rejects a finalize submitted in the same slot as the last
    // buffer write; wait one more block.
    if cfg!(not(test)) {
        sleep(config.pacing_delay);
    }

    let handle = finalize::finalize(client, &staging, program, payload.len(), config)?;
    info!(
        "deployed {} bytes to {program} in {:?}",
        payload.len(),
        start.elapsed()
    );
    Ok(DeployOutcome::Deployed(handle))
}

//! Convergence loop that drives the staging buffer to byte-for-byte
//! agreement with the local payload.

use {
    crate::{
        chunk::ChunkPlan,
        config::DeployConfig,
        error::DeployError,
        events::EventSender,
        pool, verify,
    },
    loader_client::{
        address::Address, ledger_client::LedgerClient, request::BUFFER_HEADER_SIZE,
    },
    log::*,
    std::{
        sync::atomic::{AtomicBool, Ordering},
        thread::sleep,
    },
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UploadStatus {
    /// The buffer's on-chain bytes equal the payload.
    Converged,
    /// The caller cancelled; nothing is guaranteed about the buffer's state.
    Cancelled,
}

/// Upload `payload` into the staging buffer until its on-chain bytes match.
///
/// Each pass writes the pending chunks, waits for the network to settle, and
/// re-reads the buffer to diff it against the payload; only an empty diff
/// terminates the loop. There is deliberately no pass limit: transient write
/// failures and reordered writes are repaired by later passes, and the only
/// other way out is `exit`.
pub fn upload_payload<C: LedgerClient>(
    client: &C,
    buffer: &Address,
    payload: &[u8],
    config: &DeployConfig,
    exit: &AtomicBool,
    events: &EventSender,
) -> Result<UploadStatus, DeployError> {
    let plan = ChunkPlan::new(payload.len() as u32, config.chunk_capacity)?;
    let mut pending: Vec<u32> = (0..plan.chunk_count()).collect();
    let mut is_retry_pass = false;
    let mut passes = 0;

    loop {
        if exit.load(Ordering::Relaxed) {
            info!("upload of {buffer} cancelled");
            return Ok(UploadStatus::Cancelled);
        }

        pool::write_chunks(
            client,
            buffer,
            payload,
            &plan,
            &pending,
            config,
            exit,
            events,
            is_retry_pass,
        );
        passes += 1;

        // Writes are not immediately visible; give the network a beat
        // before reading the buffer back.
        if cfg!(not(test)) {
            sleep(config.pacing_delay);
        }

        let window = match read_buffer_window(client, buffer, config, exit)? {
            Some(window) => window,
            None => {
                info!("upload of {buffer} cancelled while awaiting read");
                return Ok(UploadStatus::Cancelled);
            }
        };

        let missing = verify::missing_chunks(&plan, payload, &window);
        if missing.is_empty() {
            info!(
                "staging buffer {buffer} converged: {} chunks over {passes} pass(es)",
                plan.chunk_count()
            );
            return Ok(UploadStatus::Converged);
        }
        debug!("{} of {} chunks still missing on chain", missing.len(), plan.chunk_count());
        pending = missing;
        is_retry_pass = true;
    }
}

/// Read the buffer's data window, retrying until the endpoint can serve it.
///
/// The buffer was already confirmed to exist, but a lagging endpoint may
/// still answer `NotFound`; the read is retried without an attempt cap.
/// Returns `None` only on cancellation.
fn read_buffer_window<C: LedgerClient>(
    client: &C,
    buffer: &Address,
    config: &DeployConfig,
    exit: &AtomicBool,
) -> Result<Option<Vec<u8>>, DeployError> {
    loop {
        if exit.load(Ordering::Relaxed) {
            return Ok(None);
        }
        match client.read_account(buffer) {
            Ok(Some(account)) => {
                let window = account
                    .data
                    .get(BUFFER_HEADER_SIZE..)
                    .unwrap_or_default()
                    .to_vec();
                return Ok(Some(window));
            }
            Ok(None) => debug!("staging buffer {buffer} not visible yet, retrying read"),
            Err(err) => warn!("failed to read staging buffer {buffer}, retrying: {err}"),
        }
        if cfg!(not(test)) {
            sleep(config.read_retry_interval);
        }
    }
}

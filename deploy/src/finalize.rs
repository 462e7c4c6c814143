//! The single install-or-upgrade step that consumes a converged staging
//! buffer, retried with backoff and classified by failure code.

use {
    crate::{
        buffer::{self, StagingBuffer},
        config::DeployConfig,
        error::DeployError,
    },
    loader_client::{
        address::Address,
        ledger_client::LedgerClient,
        request::{
            Request, RequestHandle, PROGRAM_ACCOUNT_SIZE, PROGRAM_DATA_HEADER_SIZE,
        },
        transport::{FailureCode, Result as TransportResult, TransportError},
    },
    log::*,
    std::thread::sleep,
};

/// Install or upgrade `program` from a converged staging buffer.
///
/// The buffer deposit is reclaimed on every terminal path, success included;
/// a failed close is logged and never displaces the primary result.
pub fn finalize<C: LedgerClient>(
    client: &C,
    staging: &StagingBuffer,
    program: &Address,
    payload_len: usize,
    config: &DeployConfig,
) -> Result<RequestHandle, DeployError> {
    let result = try_finalize(client, staging, program, payload_len, config);
    buffer::close_buffer(client, staging, &config.authority, config);
    result
}

fn try_finalize<C: LedgerClient>(
    client: &C,
    staging: &StagingBuffer,
    program: &Address,
    payload_len: usize,
    config: &DeployConfig,
) -> Result<RequestHandle, DeployError> {
    // Fresh read; the destination may have been created since the caller
    // last looked.
    let program_exists = client.read_account(program)?.is_some();

    // An initial deployment pays for the program account and its data on
    // top of the buffer deposit; an upgrade only fronts the deposit that
    // the buffer already holds.
    let required = if program_exists {
        staging.funding
    } else {
        staging.funding.saturating_mul(3)
    };
    let balance = client.balance(&config.authority)?;
    if balance < required {
        return Err(DeployError::insufficient_funds(
            required,
            balance,
            client.airdrop_amount(),
        ));
    }

    let request = if program_exists {
        info!(
            "upgrading program {program} from staging buffer {}",
            staging.address
        );
        Request::UpgradeProgram {
            program: *program,
            buffer: staging.address,
            authority: config.authority,
            spill: config.authority,
        }
    } else {
        match config.program_identity {
            None => return Err(DeployError::MissingProgramKeypair),
            Some(identity) if identity != *program => {
                return Err(DeployError::ProgramAddressMismatch)
            }
            Some(_) => (),
        }
        info!(
            "installing program {program} from staging buffer {}",
            staging.address
        );
        // Leave headroom for upgrades up to twice the initial payload. The
        // deposit covers the program pointer account plus the program data
        // account that holds the image.
        let max_data_len = (payload_len as u32).saturating_mul(2);
        let program_space = (PROGRAM_ACCOUNT_SIZE + PROGRAM_DATA_HEADER_SIZE) as u64
            + max_data_len as u64;
        Request::DeployProgram {
            program: *program,
            buffer: staging.address,
            authority: config.authority,
            payer: config.authority,
            max_data_len,
            funding: client.minimum_funding(program_space)?,
        }
    };

    let budget = &config.retry_budget;
    let mut delay = budget.initial_delay;
    for attempt in 1..=budget.max_attempts {
        match submit_and_confirm(client, &request) {
            Ok(handle) => {
                info!("deployment of {program} confirmed on attempt {attempt}");
                return Ok(handle);
            }
            Err(TransportError::Failure(FailureCode::ProgramIdMismatch)) => {
                return Err(DeployError::IncorrectProgramId);
            }
            Err(TransportError::Failure(FailureCode::InsufficientFunds)) => {
                return Err(DeployError::InsufficientFundsForDeploy);
            }
            Err(err) => {
                warn!("deployment attempt {attempt} failed: {err}");
                if attempt < budget.max_attempts && cfg!(not(test)) {
                    sleep(delay);
                    delay = delay.mul_f64(budget.multiplier);
                }
            }
        }
    }
    Err(DeployError::RetriesExhausted(budget.max_attempts))
}

fn submit_and_confirm<C: LedgerClient>(
    client: &C,
    request: &Request,
) -> TransportResult<RequestHandle> {
    let handle = client.submit_request(request)?;
    client.confirm_request(&handle)?;
    Ok(handle)
}

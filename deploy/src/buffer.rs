//! Lifecycle of the staging buffer account: create and fund it up front,
//! close it to reclaim the deposit once the pipeline is done with it.

use {
    crate::{
        config::DeployConfig,
        error::DeployError,
        events::{EventSender, UploadEvent},
    },
    loader_client::{
        address::Address,
        ledger_client::LedgerClient,
        request::{Request, BUFFER_HEADER_SIZE},
    },
    log::*,
    std::thread::sleep,
};

/// The staging buffer account holding the payload during deployment.
#[derive(Clone, Debug)]
pub struct StagingBuffer {
    pub address: Address,
    pub space: u64,
    pub funding: u64,
}

/// Create and fund the staging buffer sized for `payload_len` bytes.
///
/// Creation is confirmed by reading the account back, never by the
/// submission result alone. Retries tolerate a lost acknowledgement: from
/// the second attempt on, an existence check runs before paying for another
/// submission. Exhausting the budget is fatal.
pub fn create_buffer<C: LedgerClient>(
    client: &C,
    payload_len: usize,
    config: &DeployConfig,
    events: &EventSender,
) -> Result<StagingBuffer, DeployError> {
    let address = Address::new_unique();
    let space = (BUFFER_HEADER_SIZE + payload_len) as u64;
    let funding = client.minimum_funding(space)?;
    let request = Request::CreateBuffer {
        buffer: address,
        authority: config.authority,
        space,
        funding,
    };

    let budget = &config.retry_budget;
    let mut delay = budget.initial_delay;
    let mut created = false;
    for attempt in 1..=budget.max_attempts {
        // An earlier submission may have landed even though its
        // acknowledgement was lost; check before paying again.
        if attempt > 1 && account_exists(client, &address) {
            created = true;
            break;
        }
        match client.submit_request(&request) {
            Ok(_handle) => {
                if cfg!(not(test)) {
                    sleep(config.pacing_delay);
                }
                if account_exists(client, &address) {
                    created = true;
                    break;
                }
                debug!("staging buffer {address} not visible after attempt {attempt}");
            }
            Err(err) => warn!("staging buffer creation attempt {attempt} failed: {err}"),
        }
        if attempt < budget.max_attempts && cfg!(not(test)) {
            sleep(delay);
            delay = delay.mul_f64(budget.multiplier);
        }
    }
    if !created {
        return Err(DeployError::MaxRetriesExceeded(budget.max_attempts));
    }

    info!("staging buffer {address} created: {space} bytes, {funding} units on deposit");
    events.send(UploadEvent::BufferCreated { address });
    Ok(StagingBuffer {
        address,
        space,
        funding,
    })
}

/// Close the staging buffer and reclaim its deposit to `recipient`.
///
/// Best effort: the deposit is recoverable later, and a close failure must
/// never displace the pipeline's primary result.
pub fn close_buffer<C: LedgerClient>(
    client: &C,
    buffer: &StagingBuffer,
    recipient: &Address,
    config: &DeployConfig,
) {
    let request = Request::CloseBuffer {
        buffer: buffer.address,
        authority: config.authority,
        recipient: *recipient,
    };
    match client.submit_request(&request) {
        Ok(_handle) => debug!("staging buffer {} closed", buffer.address),
        Err(err) => warn!("failed to close staging buffer {}: {err}", buffer.address),
    }
}

fn account_exists<C: LedgerClient>(client: &C, address: &Address) -> bool {
    matches!(client.read_account(address), Ok(Some(_)))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::events::upload_event_channel,
        assert_matches::assert_matches,
        loader_client::mock_ledger::MockLedger,
    };

    fn creation_submissions(ledger: &MockLedger) -> usize {
        ledger
            .submitted_requests()
            .iter()
            .filter(|request| matches!(request, Request::CreateBuffer { .. }))
            .count()
    }

    #[test]
    fn test_create_buffer() {
        let ledger = MockLedger::new();
        let config = DeployConfig::new(Address::new_unique());
        let (events, receiver) = upload_event_channel(4);

        let buffer = create_buffer(&ledger, 100, &config, &events).unwrap();

        assert_eq!(buffer.space, (BUFFER_HEADER_SIZE + 100) as u64);
        assert_eq!(
            buffer.funding,
            ledger.minimum_funding(buffer.space).unwrap()
        );
        let account = ledger.account(&buffer.address).unwrap();
        assert_eq!(account.data.len(), buffer.space as usize);
        assert_eq!(
            receiver.try_recv(),
            Ok(UploadEvent::BufferCreated {
                address: buffer.address
            })
        );
    }

    #[test]
    fn test_lost_acknowledgement_is_tolerated() {
        let ledger = MockLedger::new();
        let config = DeployConfig::new(Address::new_unique());
        ledger.lose_buffer_creation_ack();

        let buffer =
            create_buffer(&ledger, 100, &config, &EventSender::disabled()).unwrap();

        // The first submission landed; the existence re-check found it
        // without paying for a second creation.
        assert_eq!(creation_submissions(&ledger), 1);
        assert!(ledger.account(&buffer.address).is_some());
    }

    #[test]
    fn test_exhausted_budget_is_fatal() {
        let ledger = MockLedger::new();
        let config = DeployConfig::new(Address::new_unique());
        ledger.fail_buffer_creations(config.retry_budget.max_attempts);

        let result = create_buffer(&ledger, 100, &config, &EventSender::disabled());

        assert_matches!(result, Err(DeployError::MaxRetriesExceeded(5)));
        assert_eq!(
            creation_submissions(&ledger),
            config.retry_budget.max_attempts as usize
        );
    }

    #[test]
    fn test_close_failure_is_swallowed() {
        let ledger = MockLedger::new();
        let config = DeployConfig::new(Address::new_unique());
        let buffer =
            create_buffer(&ledger, 100, &config, &EventSender::disabled()).unwrap();

        ledger.fail_buffer_close();
        close_buffer(&ledger, &buffer, &config.authority, &config);

        // The account survives the failed close; nothing escalates.
        assert!(ledger.account(&buffer.address).is_some());
    }
}

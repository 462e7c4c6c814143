//! Concurrency-bounded pool of chunk-write workers.

use {
    crate::{
        chunk::ChunkPlan,
        config::{DeployConfig, WriteFailurePolicy},
        events::{EventSender, UploadEvent},
    },
    loader_client::{
        address::Address, ledger_client::LedgerClient, request::Request, transport,
    },
    log::*,
    std::{
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
        thread,
    },
};

/// Submit one write request per pending chunk, `config.write_concurrency` at
/// a time.
///
/// Workers claim indices from `pending` in list order through a shared
/// cursor and check `exit` before every claim. A failed submission is not
/// retried here under the default policy; the next verification pass picks
/// the chunk back up. Returns once every worker has drained the list or
/// observed `exit`; no individual write is confirmed.
#[allow(clippy::too_many_arguments)]
pub fn write_chunks<C: LedgerClient>(
    client: &C,
    buffer: &Address,
    payload: &[u8],
    plan: &ChunkPlan,
    pending: &[u32],
    config: &DeployConfig,
    exit: &AtomicBool,
    events: &EventSender,
    is_retry_pass: bool,
) {
    if is_retry_pass {
        events.send(UploadEvent::MissingBatch {
            count: pending.len(),
        });
    }
    if pending.is_empty() {
        return;
    }

    let cursor = AtomicUsize::new(0);
    let concurrency = config.write_concurrency.max(1);
    thread::scope(|scope| {
        for worker in 0..concurrency {
            let cursor = &cursor;
            thread::Builder::new()
                .name(format!("chunkWriter{worker:02}"))
                .spawn_scoped(scope, move || loop {
                    if exit.load(Ordering::Relaxed) {
                        break;
                    }
                    let claimed = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(&index) = pending.get(claimed) else {
                        break;
                    };
                    let Some(chunk) = plan.chunk(index) else {
                        continue;
                    };
                    let start = chunk.offset as usize;
                    let Some(bytes) = payload.get(start..start + chunk.length as usize)
                    else {
                        continue;
                    };
                    let request = Request::WriteChunk {
                        buffer: *buffer,
                        authority: config.authority,
                        offset: chunk.offset,
                        bytes: bytes.to_vec(),
                    };
                    match submit_write(client, &request, config.write_failure_policy) {
                        Ok(()) => {
                            if !is_retry_pass {
                                events.send(UploadEvent::ChunkWritten {
                                    end_offset: chunk.offset + chunk.length,
                                });
                            }
                        }
                        Err(err) => warn!(
                            "write of chunk {} failed, deferring to the next \
                             verification pass: {err}",
                            chunk.index
                        ),
                    }
                })
                .unwrap();
        }
    });
}

fn submit_write<C: LedgerClient>(
    client: &C,
    request: &Request,
    policy: WriteFailurePolicy,
) -> transport::Result<()> {
    let extra_attempts = match policy {
        WriteFailurePolicy::Defer => 0,
        WriteFailurePolicy::RetryInPlace(extra) => extra,
    };
    let mut attempt = 0;
    loop {
        match client.submit_request(request) {
            Ok(_handle) => return Ok(()),
            Err(err) if attempt < extra_attempts => {
                attempt += 1;
                debug!("retrying chunk write in place, attempt {}: {err}", attempt + 1);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{events::upload_event_channel, verify},
        loader_client::{mock_ledger::MockLedger, request::BUFFER_HEADER_SIZE},
        std::time::Duration,
    };

    struct Harness {
        ledger: MockLedger,
        buffer: Address,
        payload: Vec<u8>,
        plan: ChunkPlan,
        config: DeployConfig,
    }

    fn setup(payload_len: u32, capacity: u32) -> Harness {
        let ledger = MockLedger::new();
        let config = DeployConfig {
            chunk_capacity: capacity,
            write_concurrency: 4,
            ..DeployConfig::new(Address::new_unique())
        };
        let payload: Vec<u8> = (0..payload_len).map(|i| i as u8).collect();
        let buffer = Address::new_unique();
        ledger
            .submit_request(&Request::CreateBuffer {
                buffer,
                authority: config.authority,
                space: (BUFFER_HEADER_SIZE + payload.len()) as u64,
                funding: 1,
            })
            .unwrap();
        let plan = ChunkPlan::new(payload_len, capacity).unwrap();
        Harness {
            ledger,
            buffer,
            payload,
            plan,
            config,
        }
    }

    fn run(harness: &Harness, pending: &[u32], events: &EventSender, is_retry_pass: bool) {
        write_chunks(
            &harness.ledger,
            &harness.buffer,
            &harness.payload,
            &harness.plan,
            pending,
            &harness.config,
            &AtomicBool::new(false),
            events,
            is_retry_pass,
        );
    }

    #[test]
    fn test_writes_all_pending_chunks() {
        let harness = setup(10, 4);
        let (events, receiver) = upload_event_channel(16);

        run(&harness, &[0, 1, 2], &events, false);

        assert_eq!(
            harness.ledger.buffer_window(&harness.buffer).unwrap(),
            harness.payload
        );
        assert_eq!(harness.ledger.write_submissions(), 3);
        let written = receiver
            .try_iter()
            .filter(|event| matches!(event, UploadEvent::ChunkWritten { .. }))
            .count();
        assert_eq!(written, 3);
    }

    #[test]
    fn test_failed_submission_is_deferred() {
        let harness = setup(12, 4);
        harness.ledger.fail_chunk_submissions(4, 1);

        run(&harness, &[0, 1, 2], &EventSender::disabled(), false);

        let window = harness.ledger.buffer_window(&harness.buffer).unwrap();
        assert_eq!(
            verify::missing_chunks(&harness.plan, &harness.payload, &window),
            vec![1]
        );
        // The refused submission is not retried within this invocation
        assert_eq!(harness.ledger.write_submissions(), 3);
    }

    #[test]
    fn test_retry_in_place_policy() {
        let mut harness = setup(12, 4);
        harness.config.write_failure_policy = WriteFailurePolicy::RetryInPlace(2);
        harness.ledger.fail_chunk_submissions(4, 1);

        run(&harness, &[0, 1, 2], &EventSender::disabled(), false);

        let window = harness.ledger.buffer_window(&harness.buffer).unwrap();
        assert_eq!(
            verify::missing_chunks(&harness.plan, &harness.payload, &window),
            vec![] as Vec<u32>
        );
        assert_eq!(harness.ledger.write_submissions(), 4);
    }

    #[test]
    fn test_concurrency_bound() {
        let harness = setup(32, 1);
        harness.ledger.set_submit_delay(Duration::from_millis(5));

        let pending: Vec<u32> = (0..32).collect();
        run(&harness, &pending, &EventSender::disabled(), false);

        assert_eq!(harness.ledger.write_submissions(), 32);
        assert!(harness.ledger.max_in_flight() <= harness.config.write_concurrency);
    }

    #[test]
    fn test_empty_pending_is_a_noop() {
        let harness = setup(10, 4);
        run(&harness, &[], &EventSender::disabled(), false);
        assert_eq!(harness.ledger.write_submissions(), 0);
    }

    #[test]
    fn test_cancelled_pool_claims_nothing() {
        let harness = setup(10, 4);
        write_chunks(
            &harness.ledger,
            &harness.buffer,
            &harness.payload,
            &harness.plan,
            &[0, 1, 2],
            &harness.config,
            &AtomicBool::new(true),
            &EventSender::disabled(),
            false,
        );
        assert_eq!(harness.ledger.write_submissions(), 0);
    }

    #[test]
    fn test_retry_pass_reports_missing_batch() {
        let harness = setup(10, 4);
        let (events, receiver) = upload_event_channel(16);

        run(&harness, &[1], &events, true);

        assert_eq!(
            receiver.try_recv(),
            Ok(UploadEvent::MissingBatch { count: 1 })
        );
        // Repair writes do not report fresh progress
        assert!(receiver.try_iter().next().is_none());
    }
}

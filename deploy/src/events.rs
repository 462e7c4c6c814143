//! Progress notifications. The pipeline reports through a bounded channel
//! and never blocks on a slow or absent consumer.

use {
    crossbeam_channel::{bounded, Receiver, Sender},
    loader_client::address::Address,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UploadEvent {
    /// The staging buffer account was created and funded.
    BufferCreated { address: Address },
    /// A chunk write was submitted on a first-attempt pass; `end_offset` is
    /// the payload offset just past the written chunk.
    ChunkWritten { end_offset: u32 },
    /// A repair pass found this many chunks still missing on chain.
    MissingBatch { count: usize },
}

/// Fire-and-forget sender handed through the pipeline.
#[derive(Clone, Default)]
pub struct EventSender {
    sender: Option<Sender<UploadEvent>>,
}

impl EventSender {
    /// A sender that drops every event, for callers without a progress UI.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn send(&self, event: UploadEvent) {
        if let Some(sender) = &self.sender {
            // A full channel means the consumer fell behind; dropping the
            // event is preferable to stalling a write worker.
            let _ = sender.try_send(event);
        }
    }
}

/// A bounded event channel plus the sender the pipeline takes.
pub fn upload_event_channel(capacity: usize) -> (EventSender, Receiver<UploadEvent>) {
    let (sender, receiver) = bounded(capacity);
    (
        EventSender {
            sender: Some(sender),
        },
        receiver,
    )
}

//! Read-version requests and replies.

use tokio::sync::oneshot;

use crate::error::AdmissionError;
use crate::tag::{Priority, TagMap};

/// Reply to an admitted read-version request.
///
/// Version assignment happens downstream of admission; the queue never
/// inspects this payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadVersionReply {
    /// The assigned read version.
    pub version: u64,
}

/// Sender half of a request's single-shot reply channel.
pub type ReplySender = oneshot::Sender<Result<ReadVersionReply, AdmissionError>>;

/// Receiver half of a request's single-shot reply channel.
pub type ReplyReceiver = oneshot::Receiver<Result<ReadVersionReply, AdmissionError>>;

/// A read-version request submitted to the admission queue.
///
/// The queue owns the request from submission until it is either emitted to
/// a priority bucket or failed on its reply channel. A caller that drops the
/// receiver makes the eventual completion a silent no-op.
#[derive(Debug)]
pub struct ReadVersionRequest {
    /// Cost units charged to each tag this request belongs to.
    pub tags: TagMap,
    /// Scheduling priority.
    pub priority: Priority,
    /// Single-shot reply channel.
    pub reply: ReplySender,
}

impl ReadVersionRequest {
    /// Creates a request and the receiver for its reply.
    #[must_use]
    pub fn new(tags: TagMap, priority: Priority) -> (Self, ReplyReceiver) {
        let (reply, receiver) = oneshot::channel();
        (
            Self {
                tags,
                priority,
                reply,
            },
            receiver,
        )
    }

    /// Completes the request successfully, consuming it.
    pub fn complete(self, reply: ReadVersionReply) {
        let _ = self.reply.send(Ok(reply));
    }

    /// Fails the request, consuming it.
    pub fn fail(self, error: AdmissionError) {
        let _ = self.reply.send(Err(error));
    }
}

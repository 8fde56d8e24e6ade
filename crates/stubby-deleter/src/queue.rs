use crate::error::{DeleterError, Result};
use stubby_core::{Principal, ShortCode};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// One deletion batch: the codes a principal asked to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub principal: Principal,
    pub codes: Vec<ShortCode>,
}

impl DeleteRequest {
    pub fn new(principal: Principal, codes: Vec<ShortCode>) -> Self {
        Self { principal, codes }
    }
}

/// Producer side of the delete worker's bounded queue.
///
/// Cheap to clone; every request handler can hold its own copy.
#[derive(Debug, Clone)]
pub struct DeleteQueue {
    sender: mpsc::Sender<DeleteRequest>,
}

impl DeleteQueue {
    pub(crate) fn new(sender: mpsc::Sender<DeleteRequest>) -> Self {
        Self { sender }
    }

    /// Queues a batch, waiting for a free slot while the queue is full.
    pub async fn enqueue(&self, request: DeleteRequest) -> Result<()> {
        self.sender
            .send(request)
            .await
            .map_err(|_| DeleterError::Closed)
    }

    /// Queues a batch without waiting.
    pub fn try_enqueue(&self, request: DeleteRequest) -> Result<()> {
        self.sender.try_send(request).map_err(|err| match err {
            TrySendError::Full(_) => DeleterError::QueueFull,
            TrySendError::Closed(_) => DeleterError::Closed,
        })
    }

    /// Whether the worker has stopped accepting batches.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

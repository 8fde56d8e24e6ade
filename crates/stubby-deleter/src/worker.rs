use crate::error::{DeleterError, Result};
use crate::queue::{DeleteQueue, DeleteRequest};
use std::sync::Arc;
use stubby_core::UrlStore;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

/// Applies queued deletion batches against a store, one at a time.
///
/// A failed batch is logged and dropped; the worker moves on to the next one.
pub struct DeleteWorker {
    store: Arc<dyn UrlStore>,
    receiver: mpsc::Receiver<DeleteRequest>,
    shutdown: watch::Receiver<bool>,
}

impl DeleteWorker {
    /// Starts a worker on the current runtime with a queue holding at most
    /// `capacity` pending batches.
    pub fn spawn(
        store: Arc<dyn UrlStore>,
        capacity: usize,
    ) -> Result<(DeleteQueue, DeleteWorkerHandle)> {
        if capacity == 0 {
            return Err(DeleterError::InvalidCapacity);
        }

        let (sender, receiver) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = Self {
            store,
            receiver,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(worker.run());
        info!(capacity, "delete worker started");

        Ok((
            DeleteQueue::new(sender),
            DeleteWorkerHandle {
                shutdown: shutdown_tx,
                task,
            },
        ))
    }

    async fn run(mut self) {
        // Dropping the handle without calling shutdown detaches the worker;
        // it then runs until every queue is dropped.
        let mut detached = false;

        loop {
            tokio::select! {
                request = self.receiver.recv() => match request {
                    Some(request) => self.apply(request).await,
                    None => {
                        info!("all delete queues dropped, delete worker stopped");
                        return;
                    }
                },
                changed = self.shutdown.changed(), if !detached => match changed {
                    Ok(()) if *self.shutdown.borrow() => break,
                    Ok(()) => {}
                    Err(_) => detached = true,
                },
            }
        }

        self.receiver.close();
        let mut drained = 0usize;
        while let Some(request) = self.receiver.recv().await {
            self.apply(request).await;
            drained += 1;
        }
        info!(drained, "delete worker stopped");
    }

    async fn apply(&self, request: DeleteRequest) {
        if request.codes.is_empty() {
            trace!(principal = %request.principal, "skipping empty delete batch");
            return;
        }

        match self
            .store
            .delete_urls(&request.principal, &request.codes)
            .await
        {
            Ok(deleted) => debug!(
                principal = %request.principal,
                requested = request.codes.len(),
                deleted,
                "applied delete batch"
            ),
            Err(err) => error!(
                principal = %request.principal,
                requested = request.codes.len(),
                error = %err,
                "failed to apply delete batch"
            ),
        }
    }
}

/// Controls a running [`DeleteWorker`].
#[derive(Debug)]
pub struct DeleteWorkerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DeleteWorkerHandle {
    /// Stops accepting new batches, applies the ones already queued and waits
    /// for the worker to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.send_replace(true);
        self.task
            .await
            .map_err(|err| DeleterError::Crashed(err.to_string()))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

//! Single-slot pending-write queue.
//!
//! Each mutation publishes the newest serialized snapshot into one slot; a background
//! task writes whatever is in the slot when it gets to it, so a burst of edits collapses
//! into a single write. Writers never wait on I/O.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::gateway::PersistenceGateway;

#[derive(Debug, Clone)]
struct Pending {
    generation: u64,
    payload: Arc<str>,
}

/// Handle to the background writer. Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct SaveQueue {
    slot: watch::Sender<Option<Pending>>,
    written: watch::Receiver<u64>,
    generation: u64,
    worker: JoinHandle<()>,
}

impl SaveQueue {
    /// Spawns the writer task persisting snapshots under `key`.
    pub fn spawn(gateway: Arc<dyn PersistenceGateway>, key: impl Into<String>) -> Self {
        let (slot, pending) = watch::channel(None);
        let (written_tx, written) = watch::channel(0);
        let worker = tokio::spawn(drain(gateway, key.into(), pending, written_tx));
        Self {
            slot,
            written,
            generation: 0,
            worker,
        }
    }

    /// Replaces whatever is waiting in the slot with `payload`.
    pub fn enqueue(&mut self, payload: String) {
        self.generation += 1;
        self.slot.send_replace(Some(Pending {
            generation: self.generation,
            payload: payload.into(),
        }));
    }

    /// Generation of the newest enqueued snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Waits until every snapshot enqueued so far has been handed to the gateway
    /// (successfully or not).
    pub async fn flush(&mut self) {
        let target = self.generation;
        if self.written.wait_for(|done| *done >= target).await.is_err() {
            warn!("save worker stopped before flushing pending snapshots");
        }
    }

    /// Flushes, then stops the background writer.
    pub async fn shutdown(mut self) {
        self.flush().await;
        let Self { slot, worker, .. } = self;
        drop(slot);
        if let Err(err) = worker.await {
            warn!(error = %err, "save worker terminated abnormally");
        }
    }
}

async fn drain(
    gateway: Arc<dyn PersistenceGateway>,
    key: String,
    mut pending: watch::Receiver<Option<Pending>>,
    written: watch::Sender<u64>,
) {
    while pending.changed().await.is_ok() {
        let next = pending.borrow_and_update().clone();
        let Some(next) = next else {
            continue;
        };
        match gateway.set(&key, &next.payload).await {
            Ok(()) => debug!(key = %key, generation = next.generation, "page store saved"),
            Err(err) => warn!(
                key = %key,
                generation = next.generation,
                error = %err,
                "failed to save page store; in-memory state remains authoritative"
            ),
        }
        written.send_replace(next.generation);
    }
}

// src/transfer/pool.rs

//! Bounded pool running output downloads off the event delivery path.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

/// Runs transfer futures on the Tokio runtime with at most `max_threads`
/// of them in progress at once.
///
/// `spawn` never waits for a permit: queued work waits inside its own task,
/// so the event handler that enqueued it returns immediately. There is no
/// cancellation; a started transfer runs to completion or failure.
#[derive(Debug, Clone)]
pub struct TransferPool {
    permits: Arc<Semaphore>,
    max_threads: usize,
    in_flight: Arc<AtomicUsize>,
}

impl TransferPool {
    pub fn new(max_threads: usize) -> Self {
        let max_threads = max_threads.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_threads)),
            max_threads,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Transfers queued or running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Queue a transfer. Must be called from within a Tokio runtime.
    pub fn spawn<F>(&self, transfer: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            // The semaphore is never closed, so acquiring only fails if that
            // changes; run unbounded rather than drop the transfer.
            let _permit = permits.acquire_owned().await.ok();
            transfer.await;
            let left = in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
            debug!(in_flight = left, "transfer finished");
        })
    }
}

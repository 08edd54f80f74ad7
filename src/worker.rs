//! Bounded background workers with wait-with-timeout
//!
//! A timed-out worker is abandoned, not killed: it keeps running until its
//! closure returns and its result is dropped. The pending limit caps how many
//! such workers can pile up.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Result of [`WorkerPool::run_with_timeout`]
#[derive(Debug, PartialEq, Eq)]
pub enum WorkerOutcome<T> {
    /// Worker finished within the timeout
    Completed(T),
    /// Timeout elapsed; the worker was abandoned
    TimedOut,
    /// Pending limit reached or thread spawn failed; nothing ran
    Unavailable,
    /// Worker panicked before producing a result
    Panicked,
}

/// Spawns one thread per job, refusing new jobs while `max_pending` are running
#[derive(Debug)]
pub struct WorkerPool {
    max_pending: usize,
    pending: Arc<AtomicUsize>,
}

/// Holds one pending slot until dropped
struct Slot(Arc<AtomicUsize>);

impl Drop for Slot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    /// Creates a pool allowing `max_pending` concurrent workers
    #[must_use]
    pub fn new(max_pending: usize) -> Self {
        Self {
            max_pending,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Workers currently running, including abandoned ones
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Runs `job` on a worker thread and waits at most `timeout` for it
    pub fn run_with_timeout<F, T>(&self, timeout: Duration, job: F) -> WorkerOutcome<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let max = self.max_pending;
        if self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .is_err()
        {
            return WorkerOutcome::Unavailable;
        }
        let slot = Slot(Arc::clone(&self.pending));

        // capacity 1 so the worker never blocks on send after we stop waiting
        let (tx, rx) = mpsc::sync_channel(1);
        let spawned = thread::Builder::new()
            .name("hotword-pattern".to_owned())
            .spawn(move || {
                let output = job();
                drop(slot);
                let _ = tx.send(output);
            });

        if let Err(e) = spawned {
            warn!("failed to spawn pattern worker: {}", e);
            return WorkerOutcome::Unavailable;
        }

        match rx.recv_timeout(timeout) {
            Ok(output) => WorkerOutcome::Completed(output),
            Err(RecvTimeoutError::Timeout) => WorkerOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => WorkerOutcome::Panicked,
        }
    }
}

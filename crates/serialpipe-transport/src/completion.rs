//! Interrupt-to-task completion handoff.
//!
//! A completion channel has one slot, like a binary semaphore: the interrupt
//! side posts at most one pending event without ever blocking, the task side
//! waits for it. Anything the interrupt side learned about the transfer (the
//! received length, the lent storage) travels inside the event, so the task
//! observes it only after the handoff.

use std::fmt;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::warn;

use crate::error::{Result, TransportError};

/// Event raised when a DMA receive finishes.
pub struct RxCompletion {
    /// The storage lent to the transfer, handed back.
    pub storage: Box<[u8]>,
    /// Bytes actually written into `storage`.
    pub len: usize,
}

impl fmt::Debug for RxCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RxCompletion")
            .field("capacity", &self.storage.len())
            .field("len", &self.len)
            .finish()
    }
}

/// Create a connected notifier/waiter pair.
pub fn completion_channel<T>() -> (CompletionNotifier<T>, CompletionWaiter<T>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (CompletionNotifier { tx }, CompletionWaiter { rx })
}

/// Interrupt-side handle. Cheap to clone, never blocks.
pub struct CompletionNotifier<T> {
    tx: Sender<T>,
}

impl<T> Clone for CompletionNotifier<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> CompletionNotifier<T> {
    /// Post a completion event.
    ///
    /// Returns `false` when the event was not delivered: either a previous
    /// completion has not been consumed yet (overrun) or the waiter is gone.
    pub fn notify(&self, event: T) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("completion overrun, previous event still pending");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Task-side handle.
pub struct CompletionWaiter<T> {
    rx: Receiver<T>,
}

impl<T> CompletionWaiter<T> {
    /// Block until the next completion.
    pub fn wait(&self) -> Result<T> {
        self.rx.recv().map_err(|_| TransportError::Disconnected)
    }

    /// Block until the next completion or until `timeout` elapses
    /// (`None` waits forever).
    pub fn wait_timeout(&self, timeout: Option<Duration>) -> Result<T> {
        match timeout {
            None => self.wait(),
            Some(wait) => self.rx.recv_timeout(wait).map_err(|err| match err {
                RecvTimeoutError::Timeout => TransportError::CompletionTimeout(wait),
                RecvTimeoutError::Disconnected => TransportError::Disconnected,
            }),
        }
    }

    /// Take a pending completion without waiting.
    pub fn try_take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

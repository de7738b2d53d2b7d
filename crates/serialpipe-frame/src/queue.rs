use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FrameError, Result};
use crate::frame::Frame;

/// What [`FrameQueue::push`] does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFull {
    /// Wait up to the timeout, then reject the new frame.
    Block,
    /// Wait up to the timeout, then evict the oldest frame and retry until
    /// the new frame is accepted.
    DropOldest,
    /// Wait up to the timeout, then discard the new frame without an error.
    DropNewest,
    /// Reject the new frame immediately, ignoring the timeout.
    Fail,
}

/// Successful outcome of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pushed {
    /// The frame is queued.
    Queued,
    /// The frame is queued after evicting this many older frames.
    Evicted(usize),
    /// The queue stayed full and the frame was discarded under
    /// [`OnFull::DropNewest`].
    Discarded,
}

/// Bounded FIFO of owned frames.
///
/// Clones share the same queue. Every handle can both push and pop; frames
/// move in and out, they are never copied. A frame rejected by
/// [`push`](Self::push) is dropped before the call returns.
#[derive(Clone)]
pub struct FrameQueue {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
    capacity: usize,
    on_full: OnFull,
    evicted: Arc<AtomicUsize>,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames.
    pub fn new(capacity: usize, on_full: OnFull) -> Result<Self> {
        if capacity == 0 {
            return Err(FrameError::ZeroCapacity);
        }
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Ok(Self {
            tx,
            rx,
            capacity,
            on_full,
            evicted: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Push `frame`, waiting up to `timeout` for room (`None` waits forever).
    ///
    /// A zero timeout never blocks.
    pub fn push(&self, frame: Frame, timeout: Option<Duration>) -> Result<Pushed> {
        match self.on_full {
            OnFull::Block => self
                .send_within(frame, timeout)
                .map(|()| Pushed::Queued)
                .map_err(|_rejected| FrameError::QueueFull),
            OnFull::Fail => self
                .send_within(frame, Some(Duration::ZERO))
                .map(|()| Pushed::Queued)
                .map_err(|_rejected| FrameError::QueueFull),
            OnFull::DropNewest => match self.send_within(frame, timeout) {
                Ok(()) => Ok(Pushed::Queued),
                Err(_rejected) => Ok(Pushed::Discarded),
            },
            OnFull::DropOldest => Ok(self.push_evicting(frame, timeout)),
        }
    }

    fn push_evicting(&self, mut frame: Frame, timeout: Option<Duration>) -> Pushed {
        let mut evicted = 0usize;
        loop {
            match self.send_within(frame, timeout) {
                Ok(()) if evicted == 0 => return Pushed::Queued,
                Ok(()) => return Pushed::Evicted(evicted),
                Err(rejected) => {
                    frame = rejected;
                    // A consumer may have drained a slot meanwhile; then the
                    // retry succeeds without evicting anything.
                    if let Ok(oldest) = self.rx.try_recv() {
                        evicted += 1;
                        self.evicted.fetch_add(1, Ordering::Relaxed);
                        warn!(len = oldest.len(), "queue full, evicting oldest frame");
                        drop(oldest);
                    }
                }
            }
        }
    }

    fn send_within(
        &self,
        frame: Frame,
        timeout: Option<Duration>,
    ) -> std::result::Result<(), Frame> {
        match timeout {
            None => self.tx.send(frame).map_err(|err| err.into_inner()),
            Some(wait) if wait.is_zero() => self.tx.try_send(frame).map_err(|err| err.into_inner()),
            Some(wait) => self
                .tx
                .send_timeout(frame, wait)
                .map_err(|err| err.into_inner()),
        }
    }

    /// Pop the oldest frame, waiting up to `timeout` (`None` waits forever).
    pub fn pop(&self, timeout: Option<Duration>) -> Option<Frame> {
        match timeout {
            None => self.rx.recv().ok(),
            Some(wait) if wait.is_zero() => self.rx.try_recv().ok(),
            Some(wait) => self.rx.recv_timeout(wait).ok(),
        }
    }

    /// Frames currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn on_full(&self) -> OnFull {
        self.on_full
    }

    /// Total frames evicted by [`OnFull::DropOldest`] since creation.
    pub fn evicted(&self) -> usize {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("on_full", &self.on_full)
            .finish()
    }
}

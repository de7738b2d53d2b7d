use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialpipe_frame::{Frame, ScratchBuffer};
use tracing::{debug, warn};

use crate::completion::{completion_channel, CompletionWaiter, RxCompletion};
use crate::error::{Result, TransportError};
use crate::traits::{BlockingRx, BlockingTx, DmaRx, DmaTx, Receive, Transmit};

/// How a pipeline drives its link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Call the link and wait for it to return.
    #[default]
    Blocking,
    /// Start the transfer, then wait for the completion handoff.
    Dma,
}

impl TransferMode {
    /// Build the send strategy for a link that supports both modes.
    pub fn transmitter<L>(self, link: L, timeout: Option<Duration>) -> Box<dyn Transmit>
    where
        L: BlockingTx + DmaTx + 'static,
    {
        match self {
            TransferMode::Blocking => Box::new(Blocking::new(link, timeout)),
            TransferMode::Dma => Box::new(Dma::transmitter(link, timeout)),
        }
    }

    /// Build the receive strategy for a link that supports both modes.
    pub fn receiver<L>(self, link: L) -> Box<dyn Receive>
    where
        L: BlockingRx + DmaRx + 'static,
    {
        match self {
            TransferMode::Blocking => Box::new(Blocking::new(link, None)),
            TransferMode::Dma => Box::new(Dma::receiver(link)),
        }
    }
}

/// Strategy that calls a blocking link directly.
#[derive(Debug)]
pub struct Blocking<L> {
    link: L,
    timeout: Option<Duration>,
}

impl<L> Blocking<L> {
    /// `timeout` bounds each transmit; receive-to-idle waits for the line.
    pub fn new(link: L, timeout: Option<Duration>) -> Self {
        Self { link, timeout }
    }

    pub fn get_ref(&self) -> &L {
        &self.link
    }

    pub fn into_inner(self) -> L {
        self.link
    }
}

impl<L: BlockingTx> Transmit for Blocking<L> {
    fn transmit(&mut self, frame: &Frame) -> Result<()> {
        self.link.transmit(frame.as_bytes(), self.timeout)
    }
}

impl<L: BlockingRx> Receive for Blocking<L> {
    fn receive(&mut self, scratch: &mut ScratchBuffer) -> Result<()> {
        let len = self.link.receive_to_idle(scratch.spare_mut())?;
        scratch.set_len(len)?;
        Ok(())
    }
}

/// Strategy that starts a DMA transfer and waits on its completion.
///
/// Transmit keeps one transfer in flight: a transfer whose completion timed
/// out is still owed a completion, and the next transmit waits for it (up to
/// the same timeout) before starting. Owed completions that never arrive are
/// written off.
pub struct Dma<L, E> {
    link: L,
    waiter: CompletionWaiter<E>,
    timeout: Option<Duration>,
    owed: usize,
}

impl<L: DmaTx> Dma<L, ()> {
    /// Register a completion handoff with `link`. Each transmit waits up to
    /// `timeout` for its completion.
    pub fn transmitter(mut link: L, timeout: Option<Duration>) -> Self {
        let (notifier, waiter) = completion_channel();
        link.register_completion(notifier);
        Self {
            link,
            waiter,
            timeout,
            owed: 0,
        }
    }
}

impl<L: DmaRx> Dma<L, RxCompletion> {
    /// Register a completion handoff with `link`. Receives wait for the
    /// line without a timeout.
    pub fn receiver(mut link: L) -> Self {
        let (notifier, waiter) = completion_channel();
        link.register_completion(notifier);
        Self {
            link,
            waiter,
            timeout: None,
            owed: 0,
        }
    }
}

impl<L: DmaTx> Transmit for Dma<L, ()> {
    fn transmit(&mut self, frame: &Frame) -> Result<()> {
        while self.owed > 0 {
            match self.waiter.wait_timeout(self.timeout) {
                Ok(()) => {
                    self.owed -= 1;
                    debug!(owed = self.owed, "late transmit completion");
                }
                Err(err) => {
                    warn!(owed = self.owed, error = %err, "writing off late transmit completions");
                    self.owed = 0;
                }
            }
        }
        // A stray completion left by an overrun must not satisfy this transfer.
        while self.waiter.try_take().is_some() {
            debug!("discarding stray transmit completion");
        }

        self.link.start_transmit(frame.payload())?;
        match self.waiter.wait_timeout(self.timeout) {
            Err(err @ TransportError::CompletionTimeout(_)) => {
                self.owed = 1;
                Err(err)
            }
            outcome => outcome,
        }
    }
}

impl<L: DmaRx> Receive for Dma<L, RxCompletion> {
    fn receive(&mut self, scratch: &mut ScratchBuffer) -> Result<()> {
        self.link.start_receive(scratch.lend())?;
        let done = self.waiter.wait_timeout(self.timeout)?;
        scratch.restore(done.storage, done.len)?;
        Ok(())
    }
}

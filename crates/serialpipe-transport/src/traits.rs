use std::time::Duration;

use bytes::Bytes;
use serialpipe_frame::{Frame, ScratchBuffer};

use crate::completion::{CompletionNotifier, RxCompletion};
use crate::error::Result;

/// Synchronous transmit: returns once the bytes are on the wire.
pub trait BlockingTx: Send {
    /// Transmit `data`, giving up after `timeout` (`None` waits forever).
    fn transmit(&mut self, data: &[u8], timeout: Option<Duration>) -> Result<()>;
}

/// Synchronous receive-until-idle.
pub trait BlockingRx: Send {
    /// Receive into `buf` until the line goes idle or `buf` is full.
    ///
    /// Returns the number of bytes written.
    fn receive_to_idle(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Transmit that finishes later from interrupt context.
pub trait DmaTx: Send {
    /// Register the notifier raised once per completed transmit.
    fn register_completion(&mut self, done: CompletionNotifier<()>);

    /// Start transmitting `data`. The link keeps the handle until the
    /// transfer finishes.
    fn start_transmit(&mut self, data: Bytes) -> Result<()>;
}

/// Receive-until-idle that finishes later from interrupt context.
pub trait DmaRx: Send {
    /// Register the notifier raised once per completed receive.
    fn register_completion(&mut self, done: CompletionNotifier<RxCompletion>);

    /// Arm a receive into `storage`. The storage comes back inside the
    /// [`RxCompletion`] together with the received length.
    fn start_receive(&mut self, storage: Box<[u8]>) -> Result<()>;
}

/// Send-side transfer strategy used by the send worker.
pub trait Transmit: Send {
    /// Put one frame on the wire and return once the hardware is done with it.
    fn transmit(&mut self, frame: &Frame) -> Result<()>;
}

/// Receive-side transfer strategy used by the receive worker.
pub trait Receive: Send {
    /// Run one transfer into `scratch` and record its length.
    fn receive(&mut self, scratch: &mut ScratchBuffer) -> Result<()>;
}

impl<T: Transmit + ?Sized> Transmit for Box<T> {
    fn transmit(&mut self, frame: &Frame) -> Result<()> {
        (**self).transmit(frame)
    }
}

impl<T: Receive + ?Sized> Receive for Box<T> {
    fn receive(&mut self, scratch: &mut ScratchBuffer) -> Result<()> {
        (**self).receive(scratch)
    }
}

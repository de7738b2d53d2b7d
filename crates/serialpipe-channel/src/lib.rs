//! Queued send/receive pipelines for one serial channel.
//!
//! A [`Channel`] pairs a [`SendPipeline`] and a [`ReceivePipeline`] over one
//! physical link. Each pipeline owns a bounded frame queue and exactly one
//! worker thread:
//! - the send worker pops frames in order and transmits them one at a time
//! - the receive worker re-arms the link, copies each completed transfer
//!   into a frame and queues it, evicting the oldest frame under overload
//!
//! Transfer failures are not retried; they go to a [`FaultHandler`].

pub mod channel;
pub mod config;
pub mod error;
pub mod fault;
pub mod receive;
pub mod send;
pub mod state;

pub use channel::{Channel, ChannelWorkers};
pub use config::{ChannelConfig, ReceiveConfig, SendConfig};
pub use error::{ChannelError, Result, SendError};
pub use fault::{Direction, Fault, FaultHandler, HaltOnFault, LogFault};
pub use receive::ReceivePipeline;
pub use send::SendPipeline;
pub use state::{ReceiveState, SendState};

/// Join handle of a pipeline worker. It only finishes with the fault that
/// stopped the worker.
pub type WorkerHandle = std::thread::JoinHandle<std::result::Result<(), Fault>>;

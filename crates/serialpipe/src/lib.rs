//! Queued, framed send/receive channels over serial links.
//!
//! serialpipe moves whole frames between application threads and a UART or
//! USB virtual serial peripheral. Each channel owns a bounded send queue
//! drained by one transmit worker and a bounded receive queue filled by one
//! receive worker; the receive side drops the oldest frame under overload.
//!
//! # Crate Structure
//!
//! - [`frame`]: frames, scratch buffers and bounded frame queues
//! - [`transport`]: link traits, blocking and DMA transfer strategies,
//!   in-memory and stream-backed links
//! - [`channel`]: send/receive pipelines, channel pairing, configuration
//!   and fault handling
//! - `logging`: `tracing` subscriber bootstrap (behind the `logging` feature)

/// Re-export frame types.
pub mod frame {
    pub use serialpipe_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use serialpipe_transport::*;
}

/// Re-export channel types.
pub mod channel {
    pub use serialpipe_channel::*;
}

#[cfg(feature = "logging")]
pub mod logging;

pub use serialpipe_channel::{Channel, ChannelConfig};

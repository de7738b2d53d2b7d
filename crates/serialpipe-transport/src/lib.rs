//! Serial link abstraction.
//!
//! Hardware is reached through four narrow link traits: blocking transmit,
//! blocking receive-to-idle, and their DMA counterparts that finish later
//! from interrupt context. Interrupt-side completion crosses into task
//! context only through a [`completion_channel`].
//!
//! Pipelines never talk to links directly. They use a [`Transmit`] or
//! [`Receive`] strategy, chosen at configuration time via [`TransferMode`]:
//! - [`Blocking`] calls the link and returns when it returns
//! - [`Dma`] starts the transfer, then waits on the completion handoff

pub mod completion;
pub mod error;
pub mod io;
pub mod memory;
pub mod state;
pub mod strategy;
pub mod traits;

pub use completion::{completion_channel, CompletionNotifier, CompletionWaiter, RxCompletion};
pub use error::{Result, TransportError};
pub use state::{LinkState, LinkStateCell};
pub use strategy::{Blocking, Dma, TransferMode};
pub use traits::{BlockingRx, BlockingTx, DmaRx, DmaTx, Receive, Transmit};

//! Owned frames, scratch buffers and bounded frame queues.
//!
//! This is the lowest layer of serialpipe. A transfer lands in a
//! [`ScratchBuffer`], gets copied into an immutable [`Frame`], and the frame
//! travels through a [`FrameQueue`] until exactly one consumer takes it:
//! - Frames are never cloned; every push/pop moves ownership
//! - Dropping a frame is the only way to release it
//! - Queue overflow is an explicit [`OnFull`] policy

pub mod error;
pub mod frame;
pub mod queue;
pub mod scratch;

pub use error::{FrameError, Result};
pub use frame::{Frame, FrameKind, TEXT_TERMINATOR};
pub use queue::{FrameQueue, OnFull, Pushed};
pub use scratch::ScratchBuffer;

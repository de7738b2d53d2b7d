use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::scratch::ScratchBuffer;

/// Byte appended to text frames.
pub const TEXT_TERMINATOR: u8 = 0;

/// How a frame's content is meant to be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Raw bytes, no terminator.
    #[default]
    Binary,
    /// Content followed by a single [`TEXT_TERMINATOR`].
    Text,
}

/// One complete unit of transmitted or received data.
///
/// A frame is immutable and has exactly one owner. It is not `Clone`: pushing
/// it into a queue or handing it to a transmitter moves it, and dropping it
/// releases the storage.
pub struct Frame {
    /// Content, plus the terminator for text frames.
    data: Bytes,
    kind: FrameKind,
}

impl Frame {
    /// Copy `bytes` into a new binary frame.
    pub fn copy_from_slice(bytes: &[u8]) -> Self {
        Self::build(bytes, FrameKind::Binary)
    }

    /// Copy `text` into a new, terminated text frame.
    pub fn text(text: &str) -> Self {
        Self::build(text.as_bytes(), FrameKind::Text)
    }

    /// Take caller-supplied storage without copying.
    ///
    /// For [`FrameKind::Text`] the terminator is appended, which does copy.
    pub fn from_bytes(bytes: Bytes, kind: FrameKind) -> Self {
        match kind {
            FrameKind::Binary => Self { data: bytes, kind },
            FrameKind::Text => Self::build(&bytes, kind),
        }
    }

    /// Copy the filled part of a scratch buffer.
    pub fn from_scratch(scratch: &ScratchBuffer, kind: FrameKind) -> Self {
        Self::build(scratch.filled(), kind)
    }

    fn build(content: &[u8], kind: FrameKind) -> Self {
        let data = match kind {
            FrameKind::Binary => Bytes::copy_from_slice(content),
            FrameKind::Text => {
                let mut buf = BytesMut::with_capacity(content.len() + 1);
                buf.put_slice(content);
                buf.put_u8(TEXT_TERMINATOR);
                buf.freeze()
            }
        };
        Self { data, kind }
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn is_text(&self) -> bool {
        self.kind == FrameKind::Text
    }

    /// Content length, excluding any terminator.
    pub fn len(&self) -> usize {
        match self.kind {
            FrameKind::Binary => self.data.len(),
            FrameKind::Text => self.data.len() - 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content bytes, excluding any terminator. This is what goes on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    /// Stored bytes, including the terminator of a text frame.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.data
    }

    /// Content as UTF-8, if it is valid.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    /// Shared handle to the wire bytes, for links that keep them past a call.
    pub fn payload(&self) -> Bytes {
        self.data.slice(..self.len())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .finish()
    }
}

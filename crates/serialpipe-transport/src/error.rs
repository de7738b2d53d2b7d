use std::time::Duration;

use serialpipe_frame::FrameError;

/// Errors that can occur in serial link operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on a stream-backed link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The hardware rejected or aborted a transfer.
    #[error("hardware transfer failed: {0}")]
    Hardware(String),

    /// A blocking transfer did not finish in time.
    #[error("transfer timed out after {0:?}")]
    Timeout(Duration),

    /// A DMA completion was not signalled in time.
    #[error("no transfer completion within {0:?}")]
    CompletionTimeout(Duration),

    /// The other end of the link, or its completion source, is gone.
    #[error("link disconnected")]
    Disconnected,

    /// A completed transfer did not fit the scratch buffer.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, TransportError>;

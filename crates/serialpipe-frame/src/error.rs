/// Errors that can occur while building or queueing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A transfer reported more bytes than the scratch buffer can hold.
    #[error("transfer overrun ({len} bytes, capacity {capacity})")]
    Overrun { len: usize, capacity: usize },

    /// The queue stayed full for the whole wait; the frame was dropped.
    #[error("frame queue full")]
    QueueFull,

    /// Queues and scratch buffers need room for at least one element.
    #[error("capacity must be greater than zero")]
    ZeroCapacity,
}

pub type Result<T> = std::result::Result<T, FrameError>;

use serialpipe_frame::FrameError;

/// Errors that can occur while configuring or starting a channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The configuration is unusable.
    #[error("invalid channel config: {0}")]
    Config(String),

    /// Queue or scratch buffer setup failed.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// JSON configuration could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker thread could not be spawned.
    #[error("failed to spawn worker: {0}")]
    Spawn(std::io::Error),

    /// The pipeline already has a worker.
    #[error("{0} pipeline already started")]
    AlreadyStarted(crate::fault::Direction),

    /// The worker died before reporting that it was ready.
    #[error("worker exited during startup")]
    WorkerExited,
}

pub type Result<T> = std::result::Result<T, ChannelError>;

/// Why a frame handed to [`SendPipeline::send`](crate::SendPipeline::send)
/// was not queued. The frame has already been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The send queue stayed full for the whole wait.
    #[error("send queue busy")]
    Busy,

    /// The send worker has not been started.
    #[error("send pipeline not started")]
    Uninitialized,

    /// The send worker stopped on a fault; nothing drains the queue.
    #[error("send worker stopped after a fault")]
    Stopped,
}

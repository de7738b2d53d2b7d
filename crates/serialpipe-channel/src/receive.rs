use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use serialpipe_frame::{Frame, FrameQueue, Pushed, ScratchBuffer};
use serialpipe_transport::{LinkStateCell, Receive};
use tracing::{debug, info, warn};

use crate::config::ReceiveConfig;
use crate::error::{ChannelError, Result};
use crate::fault::{Direction, Fault, FaultHandler};
use crate::state::ReceiveState;
use crate::WorkerHandle;

/// Inbound half of a channel.
///
/// One worker thread keeps a receive armed on the link and turns each
/// completed transfer into a queued frame. When consumers fall behind the
/// queue's overflow policy applies, by default evicting the oldest frame.
#[derive(Clone)]
pub struct ReceivePipeline {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    config: ReceiveConfig,
    link: LinkStateCell,
    queue: OnceLock<FrameQueue>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl ReceivePipeline {
    pub fn new(
        name: impl Into<String>,
        config: ReceiveConfig,
        link: LinkStateCell,
    ) -> Result<Self> {
        if config.queue_capacity == 0 {
            return Err(ChannelError::Config(
                "receive.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if config.scratch_capacity == 0 {
            return Err(ChannelError::Config(
                "receive.scratch_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                name: name.into(),
                config,
                link,
                queue: OnceLock::new(),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        })
    }

    /// Spawn the worker. Returns once the scratch buffer and queue exist.
    pub fn start<R>(&self, receiver: R, faults: Arc<dyn FaultHandler>) -> Result<WorkerHandle>
    where
        R: Receive + 'static,
    {
        if self.shared.started.swap(true, Ordering::AcqRel) {
            return Err(ChannelError::AlreadyStarted(Direction::Receive));
        }

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("{}-rx", self.shared.name))
            .spawn(move || run(&shared, receiver, faults.as_ref(), ready_tx));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                self.shared.started.store(false, Ordering::Release);
                return Err(ChannelError::Spawn(err));
            }
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ChannelError::WorkerExited),
        }
    }

    /// Take the oldest received frame, waiting up to `timeout` (`None`
    /// waits forever, zero never blocks). Always `None` before the worker
    /// has started.
    pub fn receive(&self, timeout: Option<Duration>) -> Option<Frame> {
        self.shared.queue.get()?.pop(timeout)
    }

    pub fn try_receive(&self) -> Option<Frame> {
        self.receive(Some(Duration::ZERO))
    }

    /// [`receive`](Self::receive) on tokio's blocking pool.
    ///
    /// The wait continues if the future is dropped; a frame taken after that
    /// is dropped with it.
    #[cfg(feature = "async")]
    pub async fn receive_async(&self, timeout: Option<Duration>) -> Option<Frame> {
        let pipeline = self.clone();
        match tokio::task::spawn_blocking(move || pipeline.receive(timeout)).await {
            Ok(frame) => frame,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => None,
        }
    }

    /// Frames queued before the worker stopped on a fault are still
    /// delivered; once they are gone the state is `Error`.
    pub fn state(&self) -> ReceiveState {
        match ReceiveState::derive(self.shared.queue.get(), self.shared.link.get()) {
            ReceiveState::Empty if self.shared.stopped.load(Ordering::Acquire) => {
                ReceiveState::Error
            }
            state => state,
        }
    }

    /// Frames waiting for a consumer.
    pub fn queued(&self) -> usize {
        self.shared.queue.get().map_or(0, FrameQueue::len)
    }

    pub fn capacity(&self) -> usize {
        self.shared.config.queue_capacity
    }

    /// Frames discarded by the overflow policy so far.
    pub fn evicted(&self) -> usize {
        self.shared.queue.get().map_or(0, FrameQueue::evicted)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

impl fmt::Debug for ReceivePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceivePipeline")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("queued", &self.queued())
            .field("capacity", &self.capacity())
            .field("evicted", &self.evicted())
            .finish()
    }
}

fn run<R: Receive>(
    shared: &Shared,
    mut receiver: R,
    faults: &dyn FaultHandler,
    ready: Sender<Result<()>>,
) -> std::result::Result<(), Fault> {
    let config = &shared.config;
    let setup = ScratchBuffer::new(config.scratch_capacity)
        .and_then(|scratch| Ok((scratch, FrameQueue::new(config.queue_capacity, config.on_full)?)));
    let (mut scratch, queue) = match setup {
        Ok(parts) => parts,
        Err(err) => {
            let _ = ready.send(Err(err.into()));
            return Ok(());
        }
    };
    let queue = shared.queue.get_or_init(|| queue).clone();
    let kind = config.frame_kind();

    info!(
        channel = %shared.name,
        capacity = queue.capacity(),
        scratch = scratch.capacity(),
        transfer = ?config.transfer,
        "receive worker started"
    );
    let _ = ready.send(Ok(()));
    drop(ready);

    loop {
        if let Err(source) = receiver.receive(&mut scratch) {
            let fault = Fault {
                channel: shared.name.clone(),
                direction: Direction::Receive,
                source,
            };
            shared.stopped.store(true, Ordering::Release);
            faults.on_fault(&fault);
            return Err(fault);
        }

        // The scratch buffer is re-armed only after this copy is queued.
        let frame = Frame::from_scratch(&scratch, kind);
        let len = frame.len();
        match queue.push(frame, config.enqueue_timeout) {
            Ok(Pushed::Queued) => {
                debug!(channel = %shared.name, len, queued = queue.len(), "frame received");
            }
            Ok(Pushed::Evicted(evicted)) => {
                warn!(
                    channel = %shared.name,
                    len,
                    evicted,
                    total = queue.evicted(),
                    "receive queue overloaded, dropped oldest"
                );
            }
            Ok(Pushed::Discarded) => {
                warn!(channel = %shared.name, len, "receive queue full, dropped newest");
            }
            Err(err) => {
                warn!(channel = %shared.name, len, error = %err, "receive queue full, frame lost");
            }
        }
    }
}

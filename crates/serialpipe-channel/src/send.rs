use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use serialpipe_frame::{Frame, FrameQueue, Pushed};
use serialpipe_transport::{LinkStateCell, Transmit, TransportError};
use tracing::{debug, info, warn};

use crate::config::SendConfig;
use crate::error::{ChannelError, Result, SendError};
use crate::fault::{Direction, Fault, FaultHandler};
use crate::state::SendState;
use crate::WorkerHandle;

/// Outbound half of a channel.
///
/// Callers enqueue frames; one worker thread transmits them in order, one
/// transfer at a time. Clones share the same queue and worker.
#[derive(Clone)]
pub struct SendPipeline {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    config: SendConfig,
    link: LinkStateCell,
    queue: OnceLock<FrameQueue>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl SendPipeline {
    /// Create an unstarted pipeline. `link` is the state reported by the
    /// link the worker will transmit on.
    pub fn new(name: impl Into<String>, config: SendConfig, link: LinkStateCell) -> Result<Self> {
        if config.queue_capacity == 0 {
            return Err(ChannelError::Config(
                "send.queue_capacity must be greater than zero".to_string(),
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

    /// Spawn the worker. Returns once the worker has created the queue, so
    /// [`state`](Self::state) never reports `Uninitialized` afterwards.
    pub fn start<T>(&self, transmitter: T, faults: Arc<dyn FaultHandler>) -> Result<WorkerHandle>
    where
        T: Transmit + 'static,
    {
        if self.shared.started.swap(true, Ordering::AcqRel) {
            return Err(ChannelError::AlreadyStarted(Direction::Send));
        }

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("{}-tx", self.shared.name))
            .spawn(move || run(&shared, transmitter, faults.as_ref(), ready_tx));

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

    /// Enqueue `frame`, waiting up to `timeout` for room (`None` waits
    /// forever, zero never blocks).
    ///
    /// A frame that is not accepted has been dropped by the time this
    /// returns.
    pub fn send(&self, frame: Frame, timeout: Option<Duration>) -> std::result::Result<(), SendError> {
        let Some(queue) = self.shared.queue.get() else {
            return Err(SendError::Uninitialized);
        };
        if self.shared.stopped.load(Ordering::Acquire) {
            return Err(SendError::Stopped);
        }

        match queue.push(frame, timeout) {
            Ok(Pushed::Queued) => Ok(()),
            Ok(Pushed::Evicted(evicted)) => {
                debug!(channel = %self.shared.name, evicted, "send queue full, dropped oldest");
                Ok(())
            }
            Ok(Pushed::Discarded) | Err(_) => Err(SendError::Busy),
        }
    }

    /// Enqueue without waiting.
    pub fn try_send(&self, frame: Frame) -> std::result::Result<(), SendError> {
        self.send(frame, Some(Duration::ZERO))
    }

    /// [`send`](Self::send) on tokio's blocking pool.
    #[cfg(feature = "async")]
    pub async fn send_async(
        &self,
        frame: Frame,
        timeout: Option<Duration>,
    ) -> std::result::Result<(), SendError> {
        let pipeline = self.clone();
        match tokio::task::spawn_blocking(move || pipeline.send(frame, timeout)).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(SendError::Busy),
        }
    }

    /// `Error` once the worker has stopped on a fault, whatever the link
    /// reports.
    pub fn state(&self) -> SendState {
        if self.shared.stopped.load(Ordering::Acquire) {
            return SendState::Error;
        }
        SendState::derive(self.shared.queue.get(), self.shared.link.get())
    }

    /// Frames waiting to be transmitted.
    pub fn queued(&self) -> usize {
        self.shared.queue.get().map_or(0, FrameQueue::len)
    }

    pub fn capacity(&self) -> usize {
        self.shared.config.queue_capacity
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

impl fmt::Debug for SendPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendPipeline")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("queued", &self.queued())
            .field("capacity", &self.capacity())
            .finish()
    }
}

fn run<T: Transmit>(
    shared: &Shared,
    mut transmitter: T,
    faults: &dyn FaultHandler,
    ready: Sender<Result<()>>,
) -> std::result::Result<(), Fault> {
    let queue = match FrameQueue::new(shared.config.queue_capacity, shared.config.on_full) {
        Ok(queue) => queue,
        Err(err) => {
            let _ = ready.send(Err(err.into()));
            return Ok(());
        }
    };
    let queue = shared.queue.get_or_init(|| queue).clone();

    info!(
        channel = %shared.name,
        capacity = queue.capacity(),
        transfer = ?shared.config.transfer,
        "send worker started"
    );
    let _ = ready.send(Ok(()));
    drop(ready);

    while let Some(frame) = queue.pop(None) {
        let len = frame.len();
        match transmitter.transmit(&frame) {
            Ok(()) => {
                debug!(channel = %shared.name, len, queued = queue.len(), "frame transmitted");
            }
            Err(TransportError::CompletionTimeout(wait)) => {
                warn!(
                    channel = %shared.name,
                    len,
                    ?wait,
                    "transmit completion not signalled, continuing"
                );
            }
            Err(source) => {
                let fault = Fault {
                    channel: shared.name.clone(),
                    direction: Direction::Send,
                    source,
                };
                shared.stopped.store(true, Ordering::Release);
                faults.on_fault(&fault);
                return Err(fault);
            }
        }
        drop(frame);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serialpipe_frame::OnFull;
    use serialpipe_transport::LinkState;

    use super::*;
    use crate::fault::LogFault;

    /// Transmitter that records payloads and can be held closed.
    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        gate: Option<crossbeam_channel::Receiver<()>>,
    }

    impl Transmit for Recorder {
        fn transmit(&mut self, frame: &Frame) -> serialpipe_transport::Result<()> {
            if let Some(gate) = &self.gate {
                let _ = gate.recv();
            }
            self.sent.lock().unwrap().push(frame.as_bytes().to_vec());
            Ok(())
        }
    }

    fn pipeline(capacity: usize, on_full: OnFull) -> SendPipeline {
        let config = SendConfig {
            queue_capacity: capacity,
            on_full,
            ..SendConfig::default()
        };
        SendPipeline::new("uart-test", config, LinkStateCell::default()).unwrap()
    }

    #[test]
    fn send_before_start_is_uninitialized() {
        let pipeline = pipeline(2, OnFull::Block);
        assert_eq!(pipeline.state(), SendState::Uninitialized);
        assert_eq!(
            pipeline.try_send(Frame::text("early")),
            Err(SendError::Uninitialized)
        );
        assert_eq!(pipeline.queued(), 0);
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = SendConfig {
            queue_capacity: 0,
            ..SendConfig::default()
        };
        let err = SendPipeline::new("uart-test", config, LinkStateCell::default()).unwrap_err();
        assert!(matches!(err, ChannelError::Config(_)));
    }

    #[test]
    fn second_start_rejected() {
        let pipeline = pipeline(2, OnFull::Block);
        pipeline
            .start(Recorder::default(), Arc::new(LogFault))
            .expect("first start should succeed");
        let err = pipeline
            .start(Recorder::default(), Arc::new(LogFault))
            .unwrap_err();
        assert!(matches!(err, ChannelError::AlreadyStarted(Direction::Send)));
    }

    #[test]
    fn full_queue_reports_busy_and_queue_full() {
        let (open_tx, open_rx) = crossbeam_channel::unbounded();
        let recorder = Recorder {
            gate: Some(open_rx),
            ..Recorder::default()
        };
        let sent = Arc::clone(&recorder.sent);
        let pipeline = pipeline(2, OnFull::Block);
        pipeline.start(recorder, Arc::new(LogFault)).unwrap();

        // The worker holds the first frame while the gate is closed.
        pipeline.send(Frame::text("held"), None).unwrap();
        while pipeline.queued() != 0 {
            thread::yield_now();
        }
        pipeline.try_send(Frame::text("a")).unwrap();
        pipeline.try_send(Frame::text("b")).unwrap();
        assert_eq!(pipeline.state(), SendState::QueueFull);
        assert_eq!(pipeline.try_send(Frame::text("c")), Err(SendError::Busy));
        assert_eq!(
            pipeline.send(Frame::text("d"), Some(Duration::from_millis(20))),
            Err(SendError::Busy)
        );

        for _ in 0..3 {
            open_tx.send(()).unwrap();
        }
        while sent.lock().unwrap().len() < 3 {
            thread::yield_now();
        }
        assert_eq!(
            *sent.lock().unwrap(),
            vec![b"held".to_vec(), b"a".to_vec(), b"b".to_vec()]
        );
    }

    #[test]
    fn link_state_is_reported() {
        let link = LinkStateCell::default();
        let pipeline =
            SendPipeline::new("uart-test", SendConfig::default(), link.clone()).unwrap();
        pipeline
            .start(Recorder::default(), Arc::new(LogFault))
            .unwrap();
        assert_eq!(pipeline.state(), SendState::Ready);

        link.set(LinkState::Reset);
        assert_eq!(pipeline.state(), SendState::Reset);
        link.set(LinkState::Error);
        assert_eq!(pipeline.state(), SendState::Error);
    }

    /// Transmitter whose link always refuses the transfer.
    struct Broken;

    impl Transmit for Broken {
        fn transmit(&mut self, _frame: &Frame) -> serialpipe_transport::Result<()> {
            Err(TransportError::Hardware("line stuck low".to_string()))
        }
    }

    #[test]
    fn stopped_worker_reports_error_and_refuses_frames() {
        let pipeline = pipeline(2, OnFull::Block);
        let worker = pipeline.start(Broken, Arc::new(LogFault)).unwrap();
        assert_eq!(pipeline.state(), SendState::Ready);

        pipeline.send(Frame::text("first"), None).unwrap();
        let fault = worker.join().unwrap().unwrap_err();
        assert!(matches!(fault.source, TransportError::Hardware(_)));

        assert_eq!(pipeline.state(), SendState::Error);
        assert_eq!(pipeline.try_send(Frame::text("late")), Err(SendError::Stopped));
        assert_eq!(pipeline.queued(), 0);
    }
}

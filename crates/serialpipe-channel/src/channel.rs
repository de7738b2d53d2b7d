use std::sync::Arc;
use std::time::Duration;

use serialpipe_frame::Frame;
use serialpipe_transport::{BlockingRx, BlockingTx, DmaRx, DmaTx, LinkStateCell, Receive, Transmit};

use crate::config::ChannelConfig;
use crate::error::{Result, SendError};
use crate::fault::FaultHandler;
use crate::receive::ReceivePipeline;
use crate::send::SendPipeline;
use crate::state::{ReceiveState, SendState};
use crate::WorkerHandle;

/// Send and receive pipelines over one physical link.
#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
    send: SendPipeline,
    receive: ReceivePipeline,
}

/// Worker handles returned by [`Channel::start`].
///
/// Workers run for the life of the process; joining one returns only after
/// it stopped on a fault.
#[derive(Debug)]
pub struct ChannelWorkers {
    pub send: WorkerHandle,
    pub receive: WorkerHandle,
}

impl Channel {
    /// Build both pipelines without starting them. `link` is the state
    /// reported by the underlying peripheral.
    pub fn new(config: ChannelConfig, link: LinkStateCell) -> Result<Self> {
        config.validate()?;
        let send = SendPipeline::new(config.name.clone(), config.send, link.clone())?;
        let receive = ReceivePipeline::new(config.name.clone(), config.receive, link)?;
        Ok(Self {
            name: config.name,
            send,
            receive,
        })
    }

    /// Build a channel over a link supporting both transfer modes and start
    /// its workers, using the transfer modes from `config`.
    pub fn open<Tx, Rx>(
        config: ChannelConfig,
        tx: Tx,
        rx: Rx,
        link: LinkStateCell,
        faults: Arc<dyn FaultHandler>,
    ) -> Result<(Self, ChannelWorkers)>
    where
        Tx: BlockingTx + DmaTx + 'static,
        Rx: BlockingRx + DmaRx + 'static,
    {
        let transmitter = config
            .send
            .transfer
            .transmitter(tx, config.send.transmit_timeout);
        let receiver = config.receive.transfer.receiver(rx);
        let channel = Self::new(config, link)?;
        let workers = channel.start(transmitter, receiver, faults)?;
        Ok((channel, workers))
    }

    /// Start both workers with explicit transfer strategies.
    pub fn start<T, R>(
        &self,
        transmitter: T,
        receiver: R,
        faults: Arc<dyn FaultHandler>,
    ) -> Result<ChannelWorkers>
    where
        T: Transmit + 'static,
        R: Receive + 'static,
    {
        let send = self.send.start(transmitter, Arc::clone(&faults))?;
        let receive = self.receive.start(receiver, faults)?;
        Ok(ChannelWorkers { send, receive })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn send(&self, frame: Frame, timeout: Option<Duration>) -> std::result::Result<(), SendError> {
        self.send.send(frame, timeout)
    }

    /// Copy `text` into a terminated frame and enqueue it.
    pub fn send_text(&self, text: &str, timeout: Option<Duration>) -> std::result::Result<(), SendError> {
        self.send.send(Frame::text(text), timeout)
    }

    pub fn receive(&self, timeout: Option<Duration>) -> Option<Frame> {
        self.receive.receive(timeout)
    }

    pub fn send_state(&self) -> SendState {
        self.send.state()
    }

    pub fn receive_state(&self) -> ReceiveState {
        self.receive.state()
    }

    /// Outbound pipeline, for producers that only need to send.
    pub fn sender(&self) -> &SendPipeline {
        &self.send
    }

    /// Inbound pipeline, for consumers that only need to receive.
    pub fn receiver(&self) -> &ReceivePipeline {
        &self.receive
    }
}

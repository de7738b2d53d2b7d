//! In-memory serial link.
//!
//! A [`MemoryLink`] behaves like a UART or USB CDC peripheral whose wire ends
//! in a [`MemoryRemote`]. The remote injects inbound bursts (one burst is one
//! idle-terminated transfer), collects outbound transfers, flips the
//! reported [`LinkState`] and can make transfers fail.
//!
//! Both halves support blocking and DMA operation. In DMA mode completions
//! are raised from a dedicated thread standing in for the interrupt handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use tracing::{debug, trace};

use crate::completion::{CompletionNotifier, RxCompletion};
use crate::error::{Result, TransportError};
use crate::state::{LinkState, LinkStateCell};
use crate::traits::{BlockingRx, BlockingTx, DmaRx, DmaTx};

/// Both halves of an in-memory link plus its remote end.
pub struct MemoryLink {
    pub tx: MemoryTx,
    pub rx: MemoryRx,
    pub remote: MemoryRemote,
    /// State reported by the link; shared with the remote.
    pub state: LinkStateCell,
}

/// Create a link whose outbound side never applies backpressure.
pub fn link(name: &str) -> MemoryLink {
    build(name, crossbeam_channel::unbounded())
}

/// Create a link whose transmits block once `backlog` outbound transfers are
/// waiting for the remote to collect them. A backlog of zero makes every
/// transmit wait for [`MemoryRemote::next_sent`].
pub fn link_with_backlog(name: &str, backlog: usize) -> MemoryLink {
    build(name, crossbeam_channel::bounded(backlog))
}

fn build(name: &str, (out_tx, out_rx): (Sender<Vec<u8>>, Receiver<Vec<u8>>)) -> MemoryLink {
    let (in_tx, in_rx) = crossbeam_channel::unbounded();
    let state = LinkStateCell::new(LinkState::Normal);
    let fail_tx = Arc::new(AtomicBool::new(false));
    let fail_rx = Arc::new(AtomicBool::new(false));

    MemoryLink {
        tx: MemoryTx {
            name: name.to_string(),
            outbound: out_tx,
            fail: Arc::clone(&fail_tx),
            irq: None,
        },
        rx: MemoryRx {
            name: name.to_string(),
            inbound: Some(Inbound {
                bursts: in_rx,
                pending: Vec::new(),
            }),
            fail: Arc::clone(&fail_rx),
            irq: None,
        },
        remote: MemoryRemote {
            inbound: in_tx,
            outbound: out_rx,
            state: state.clone(),
            fail_tx,
            fail_rx,
        },
        state,
    }
}

/// Test/peer side of a [`MemoryLink`].
pub struct MemoryRemote {
    inbound: Sender<Vec<u8>>,
    outbound: Receiver<Vec<u8>>,
    state: LinkStateCell,
    fail_tx: Arc<AtomicBool>,
    fail_rx: Arc<AtomicBool>,
}

impl MemoryRemote {
    /// Deliver one burst to the receive side. Returns `false` once the
    /// receive half is gone.
    pub fn inject(&self, burst: &[u8]) -> bool {
        self.inbound.send(burst.to_vec()).is_ok()
    }

    /// Collect the next outbound transfer, waiting up to `timeout`.
    pub fn next_sent(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.outbound.recv_timeout(timeout).ok()
    }

    /// Collect every outbound transfer that arrives within `idle` of the
    /// previous one.
    pub fn drain_sent(&self, idle: Duration) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Ok(data) = self.outbound.recv_timeout(idle) {
            out.push(data);
        }
        out
    }

    /// Outbound transfers waiting to be collected.
    pub fn sent_backlog(&self) -> usize {
        self.outbound.len()
    }

    pub fn set_state(&self, state: LinkState) {
        self.state.set(state);
    }

    /// Make every subsequent transmit fail (or succeed again).
    pub fn fail_transmits(&self, fail: bool) {
        self.fail_tx.store(fail, Ordering::Release);
    }

    /// Make every subsequent receive fail (or succeed again).
    pub fn fail_receives(&self, fail: bool) {
        self.fail_rx.store(fail, Ordering::Release);
    }
}

/// Transmit half of a [`MemoryLink`].
pub struct MemoryTx {
    name: String,
    outbound: Sender<Vec<u8>>,
    fail: Arc<AtomicBool>,
    irq: Option<Sender<Bytes>>,
}

impl MemoryTx {
    fn check_fault(&self) -> Result<()> {
        if self.fail.load(Ordering::Acquire) {
            return Err(TransportError::Hardware(format!(
                "{}: injected transmit failure",
                self.name
            )));
        }
        Ok(())
    }
}

impl BlockingTx for MemoryTx {
    fn transmit(&mut self, data: &[u8], timeout: Option<Duration>) -> Result<()> {
        self.check_fault()?;
        trace!(link = %self.name, len = data.len(), "blocking transmit");
        match timeout {
            None => self
                .outbound
                .send(data.to_vec())
                .map_err(|_| TransportError::Disconnected),
            Some(wait) => self
                .outbound
                .send_timeout(data.to_vec(), wait)
                .map_err(|err| match err {
                    SendTimeoutError::Timeout(_) => TransportError::Timeout(wait),
                    SendTimeoutError::Disconnected(_) => TransportError::Disconnected,
                }),
        }
    }
}

impl DmaTx for MemoryTx {
    fn register_completion(&mut self, done: CompletionNotifier<()>) {
        let (irq_tx, irq_rx) = crossbeam_channel::unbounded::<Bytes>();
        let outbound = self.outbound.clone();
        let name = self.name.clone();
        thread::spawn(move || {
            for data in irq_rx {
                if outbound.send(data.to_vec()).is_err() {
                    break;
                }
                trace!(link = %name, len = data.len(), "transmit complete");
                done.notify(());
            }
            debug!(link = %name, "transmit interrupt source stopped");
        });
        self.irq = Some(irq_tx);
    }

    fn start_transmit(&mut self, data: Bytes) -> Result<()> {
        self.check_fault()?;
        let irq = self.irq.as_ref().ok_or(TransportError::Disconnected)?;
        irq.send(data).map_err(|_| TransportError::Disconnected)
    }
}

/// Inbound wire: bursts from the remote plus the unread tail of the last one.
struct Inbound {
    bursts: Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Inbound {
    /// Fill `buf` from the next burst. A burst longer than `buf` completes the
    /// transfer at `buf.len()`; the rest feeds the next transfer.
    fn fill(&mut self, buf: &mut [u8]) -> Option<usize> {
        if self.pending.is_empty() {
            self.pending = self.bursts.recv().ok()?;
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Some(n)
    }
}

/// Receive half of a [`MemoryLink`].
pub struct MemoryRx {
    name: String,
    inbound: Option<Inbound>,
    fail: Arc<AtomicBool>,
    irq: Option<Sender<Box<[u8]>>>,
}

impl MemoryRx {
    fn check_fault(&self) -> Result<()> {
        if self.fail.load(Ordering::Acquire) {
            return Err(TransportError::Hardware(format!(
                "{}: injected receive failure",
                self.name
            )));
        }
        Ok(())
    }
}

impl BlockingRx for MemoryRx {
    fn receive_to_idle(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_fault()?;
        let inbound = self.inbound.as_mut().ok_or(TransportError::Disconnected)?;
        let n = inbound.fill(buf).ok_or(TransportError::Disconnected)?;
        trace!(link = %self.name, len = n, "receive to idle");
        Ok(n)
    }
}

impl DmaRx for MemoryRx {
    fn register_completion(&mut self, done: CompletionNotifier<RxCompletion>) {
        let Some(mut inbound) = self.inbound.take() else {
            return;
        };
        let (irq_tx, irq_rx) = crossbeam_channel::unbounded::<Box<[u8]>>();
        let name = self.name.clone();
        thread::spawn(move || {
            for mut storage in irq_rx {
                let Some(len) = inbound.fill(&mut storage) else {
                    break;
                };
                trace!(link = %name, len, "receive complete");
                done.notify(RxCompletion { storage, len });
            }
            debug!(link = %name, "receive interrupt source stopped");
        });
        self.irq = Some(irq_tx);
    }

    fn start_receive(&mut self, storage: Box<[u8]>) -> Result<()> {
        self.check_fault()?;
        let irq = self.irq.as_ref().ok_or(TransportError::Disconnected)?;
        irq.send(storage).map_err(|_| TransportError::Disconnected)
    }
}

use std::fmt;

use serialpipe_transport::TransportError;
use tracing::error;

/// Which pipeline of a channel a fault came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => f.write_str("send"),
            Direction::Receive => f.write_str("receive"),
        }
    }
}

/// A transfer failure that stopped a pipeline worker.
#[derive(Debug, thiserror::Error)]
#[error("{channel} {direction} transfer failed: {source}")]
pub struct Fault {
    pub channel: String,
    pub direction: Direction,
    #[source]
    pub source: TransportError,
}

/// Terminal sink for transfer failures.
///
/// Workers do not retry: the link layer below is expected to have retried
/// already. The handler is called once, then the worker stops.
pub trait FaultHandler: Send + Sync {
    fn on_fault(&self, fault: &Fault);
}

impl<F> FaultHandler for F
where
    F: Fn(&Fault) + Send + Sync,
{
    fn on_fault(&self, fault: &Fault) {
        self(fault)
    }
}

/// Log the fault and abort the process, leaving recovery to whatever
/// supervises it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaltOnFault;

impl FaultHandler for HaltOnFault {
    fn on_fault(&self, fault: &Fault) {
        error!(
            channel = %fault.channel,
            direction = %fault.direction,
            error = %fault.source,
            "fatal transfer failure, halting"
        );
        std::process::abort();
    }
}

/// Log the fault and let the worker stop.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFault;

impl FaultHandler for LogFault {
    fn on_fault(&self, fault: &Fault) {
        error!(
            channel = %fault.channel,
            direction = %fault.direction,
            error = %fault.source,
            "transfer failure, worker stopped"
        );
    }
}

//! Two channels joined by an in-memory wire from uart1 to usb.
//!
//! Run with:
//!   cargo run -p serialpipe --example loopback --features logging

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serialpipe::channel::LogFault;
use serialpipe::logging::{init_logging, LogFormat, LogLevel};
use serialpipe::transport::memory::{self, MemoryLink, MemoryRemote};
use serialpipe::{Channel, ChannelConfig};

/// Forward everything one link transmits into the other link's receiver.
fn cross(from: MemoryRemote, to: MemoryRemote) {
    thread::spawn(move || {
        while let Some(data) = from.next_sent(Duration::from_secs(3600)) {
            if !to.inject(&data) {
                break;
            }
        }
    });
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LogFormat::Text, LogLevel::Debug);

    let MemoryLink {
        tx,
        rx,
        remote: uart_remote,
        state,
    } = memory::link("uart1");
    let (uart, _uart_workers) =
        Channel::open(ChannelConfig::uart("uart1"), tx, rx, state, Arc::new(LogFault))?;

    let MemoryLink {
        tx,
        rx,
        remote: usb_remote,
        state,
    } = memory::link("usb");
    let (usb, _usb_workers) = Channel::open(
        ChannelConfig::usb_virtual_serial("usb"),
        tx,
        rx,
        state,
        Arc::new(LogFault),
    )?;

    // uart1's wire feeds usb's receiver; the reverse direction is unused.
    cross(uart_remote, usb_remote);

    for line in ["hello", "from", "uart1"] {
        uart.send_text(line, Some(Duration::from_millis(100)))?;
    }

    while let Some(frame) = usb.receive(Some(Duration::from_millis(200))) {
        eprintln!("usb received {:?}", frame.as_str().unwrap_or("<binary>"));
    }

    eprintln!(
        "send state {:?}, receive state {:?}",
        uart.send_state(),
        usb.receive_state()
    );
    Ok(())
}

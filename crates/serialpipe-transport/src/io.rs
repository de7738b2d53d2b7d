//! Blocking links over `std::io` streams.
//!
//! Useful for a host-side serial device file, a socket or a pipe standing in
//! for the wire. One successful `read` is treated as one receive-to-idle
//! transfer. A read that times out (`WouldBlock` / `TimedOut`) means the
//! line is idle, and the receive keeps waiting.

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::{BlockingRx, BlockingTx};

/// Transmit half over any `Write` stream.
///
/// A stream that cannot take more bytes (`WouldBlock` / `TimedOut`) is
/// retried until the per-call timeout runs out. Without a timeout it is
/// retried forever.
pub struct IoTx<W> {
    inner: W,
}

impl<W: Write + Send> IoTx<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> BlockingTx for IoTx<W> {
    fn transmit(&mut self, data: &[u8], timeout: Option<Duration>) -> Result<()> {
        let deadline = timeout.map(|wait| (wait, Instant::now() + wait));
        let mut offset = 0usize;
        while offset < data.len() {
            match self.inner.write(&data[offset..]) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_stalled(&err) => back_off(deadline)?,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_stalled(&err) => back_off(deadline)?,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        trace!(len = data.len(), "stream transmit");
        Ok(())
    }
}

fn is_stalled(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Yield before retrying a stalled write, or fail once the deadline passed.
fn back_off(deadline: Option<(Duration, Instant)>) -> Result<()> {
    if let Some((wait, at)) = deadline {
        if Instant::now() >= at {
            return Err(TransportError::Timeout(wait));
        }
    }
    thread::yield_now();
    Ok(())
}

/// Receive half over any `Read` stream.
pub struct IoRx<R> {
    inner: R,
}

impl<R: Read + Send> IoRx<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Send> BlockingRx for IoRx<R> {
    fn receive_to_idle(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.inner.read(buf) {
                Ok(0) if !buf.is_empty() => return Err(TransportError::Disconnected),
                Ok(n) => {
                    trace!(len = n, "stream receive");
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_stalled(&err) => thread::yield_now(),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn transmit_writes_everything() {
        let mut tx = IoTx::new(Cursor::new(Vec::new()));
        tx.transmit(b"one", None).unwrap();
        tx.transmit(b"two", None).unwrap();
        assert_eq!(tx.into_inner().into_inner(), b"onetwo");
    }

    #[test]
    fn transmit_retries_interrupted() {
        let mut tx = IoTx::new(InterruptOnce {
            interrupted: false,
            data: Vec::new(),
        });
        tx.transmit(b"retry", None).unwrap();
        assert_eq!(tx.get_ref().data, b"retry");
    }

    #[test]
    fn zero_write_is_disconnect() {
        let mut tx = IoTx::new(ZeroWriter);
        assert!(matches!(
            tx.transmit(b"x", None),
            Err(TransportError::Disconnected)
        ));
    }

    #[test]
    fn receive_reads_once() {
        let mut rx = IoRx::new(Cursor::new(b"abcdef".to_vec()));
        let mut buf = [0u8; 4];
        assert_eq!(rx.receive_to_idle(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(rx.receive_to_idle(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[test]
    fn eof_is_disconnect() {
        let mut rx = IoRx::new(Cursor::new(Vec::<u8>::new()));
        let mut buf = [0u8; 4];
        assert!(matches!(
            rx.receive_to_idle(&mut buf),
            Err(TransportError::Disconnected)
        ));
    }

    #[test]
    fn stalled_write_times_out() {
        let mut tx = IoTx::new(StalledWriter);
        let err = tx
            .transmit(b"x", Some(Duration::from_millis(10)))
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[test]
    fn stalled_write_retries_until_accepted() {
        let mut tx = IoTx::new(StallOnce {
            stalled: false,
            data: Vec::new(),
        });
        tx.transmit(b"late", None).unwrap();
        assert_eq!(tx.get_ref().data, b"late");
    }

    #[test]
    fn idle_read_keeps_waiting() {
        let mut rx = IoRx::new(IdleOnce {
            idled: false,
            inner: Cursor::new(b"after idle".to_vec()),
        });
        let mut buf = [0u8; 16];
        let n = rx.receive_to_idle(&mut buf).expect("idle line is not a failure");
        assert_eq!(&buf[..n], b"after idle");
    }

    #[cfg(unix)]
    #[test]
    fn socket_read_timeout_is_idle() {
        use std::os::unix::net::UnixStream;

        let (local, mut peer) = UnixStream::pair().unwrap();
        local
            .set_read_timeout(Some(Duration::from_millis(5)))
            .unwrap();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            peer.write_all(b"late").unwrap();
            peer
        });

        let mut rx = IoRx::new(local);
        let mut buf = [0u8; 8];
        let n = rx.receive_to_idle(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"late");
        let _peer = writer.join().unwrap();
    }

    struct InterruptOnce {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct StalledWriter;

    impl Write for StalledWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct StallOnce {
        stalled: bool,
        data: Vec<u8>,
    }

    impl Write for StallOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.stalled {
                self.stalled = true;
                return Err(std::io::Error::from(ErrorKind::TimedOut));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct IdleOnce {
        idled: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for IdleOnce {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.idled {
                self.idled = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            self.inner.read(buf)
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}

use std::fmt;

use crate::error::{FrameError, Result};

/// Fixed-capacity transfer target owned by one receive pipeline.
///
/// The transport writes into [`spare_mut`](Self::spare_mut) (or into lent
/// storage, see [`lend`](Self::lend)) and reports how many bytes arrived via
/// [`set_len`](Self::set_len). Only copies of [`filled`](Self::filled) ever
/// leave the buffer.
pub struct ScratchBuffer {
    storage: Box<[u8]>,
    capacity: usize,
    len: usize,
}

impl ScratchBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(FrameError::ZeroCapacity);
        }
        Ok(Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            capacity,
            len: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes delivered by the most recent completed transfer.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the storage is currently out on loan to a transfer.
    pub fn is_lent(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn filled(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// The whole storage, for a transfer to write into.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    /// Record the length of a completed transfer.
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.storage.len() {
            return Err(FrameError::Overrun {
                len,
                capacity: self.capacity,
            });
        }
        self.len = len;
        Ok(())
    }

    /// Move the storage out for an asynchronous transfer.
    ///
    /// Until [`restore`](Self::restore) the buffer is empty and reports
    /// [`is_lent`](Self::is_lent).
    pub fn lend(&mut self) -> Box<[u8]> {
        self.len = 0;
        std::mem::take(&mut self.storage)
    }

    /// Take the storage back from a completed transfer together with its length.
    pub fn restore(&mut self, storage: Box<[u8]>, len: usize) -> Result<()> {
        if storage.len() != self.capacity {
            return Err(FrameError::Overrun {
                len: storage.len(),
                capacity: self.capacity,
            });
        }
        self.storage = storage;
        self.set_len(len)
    }
}

impl fmt::Debug for ScratchBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len)
            .field("lent", &self.is_lent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            ScratchBuffer::new(0),
            Err(FrameError::ZeroCapacity)
        ));
    }

    #[test]
    fn set_len_bounds() {
        let mut scratch = ScratchBuffer::new(4).unwrap();
        scratch.set_len(4).unwrap();
        assert_eq!(scratch.len(), 4);

        let err = scratch.set_len(5).unwrap_err();
        assert!(matches!(err, FrameError::Overrun { len: 5, capacity: 4 }));
        assert_eq!(scratch.len(), 4);
    }

    #[test]
    fn lend_and_restore() {
        let mut scratch = ScratchBuffer::new(4).unwrap();
        let mut storage = scratch.lend();
        assert!(scratch.is_lent());
        assert!(scratch.filled().is_empty());

        storage[..2].copy_from_slice(b"hi");
        scratch.restore(storage, 2).unwrap();

        assert!(!scratch.is_lent());
        assert_eq!(scratch.filled(), b"hi");
    }

    #[test]
    fn restore_rejects_foreign_storage() {
        let mut scratch = ScratchBuffer::new(4).unwrap();
        let _ = scratch.lend();
        let err = scratch
            .restore(vec![0u8; 8].into_boxed_slice(), 0)
            .unwrap_err();
        assert!(matches!(err, FrameError::Overrun { .. }));
    }
}

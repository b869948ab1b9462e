//! Growable byte buffer with independent read and write cursors.
//!
//! A `FrameBuffer` is used for exactly one encode pass or one decode pass.
//! Writes append to a `BytesMut` through `BufMut`; reads consume from its
//! front through `Buf`. Integers are big-endian and always occupy four bytes.
//! Reads are bounded by what has actually been written; a read past that
//! bound fails with [`FrameError::Truncated`] instead of producing zeroes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::FrameError;

const U32_LEN: usize = std::mem::size_of::<u32>();

#[derive(Debug, Clone, Default)]
pub struct FrameBuffer {
    /// Written bytes not yet read.
    data: BytesMut,
    capacity: usize,
    read_index: usize,
}

impl FrameBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            capacity,
            read_index: 0,
        }
    }

    /// Wrap received bytes for a decode pass.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: BytesMut::from(bytes),
            capacity: bytes.len(),
            read_index: 0,
        }
    }

    /// Logical capacity following the double-or-fit growth policy.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written so far (the write cursor).
    pub fn len(&self) -> usize {
        self.read_index + self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read cursor position.
    pub fn position(&self) -> usize {
        self.read_index
    }

    /// Bytes written but not yet read.
    pub fn remaining(&self) -> usize {
        self.data.remaining()
    }

    fn ensure_capacity(&mut self, needed: usize) {
        let required = self.len() + needed;
        if required > self.capacity {
            self.capacity = (self.capacity * 2).max(required);
            self.data.reserve(self.capacity - self.len());
        }
    }

    pub fn write_u32(&mut self, value: u32) {
        self.ensure_capacity(U32_LEN);
        self.data.put_u32(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.ensure_capacity(bytes.len());
        self.data.put_slice(bytes);
    }

    fn check_remaining(&self, needed: usize) -> Result<(), FrameError> {
        let available = self.remaining();
        if needed > available {
            return Err(FrameError::Truncated { needed, available });
        }
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32, FrameError> {
        self.check_remaining(U32_LEN)?;
        self.read_index += U32_LEN;
        Ok(self.data.get_u32())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, FrameError> {
        self.check_remaining(len)?;
        self.read_index += len;
        Ok(self.data.copy_to_bytes(len))
    }

    /// Consume the buffer, yielding the bytes not yet read.
    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        let mut buffer = FrameBuffer::with_capacity(8);
        buffer.write_u32(0x0102_0304);
        assert_eq!(&buffer.into_bytes()[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn growth_doubles_when_doubling_is_enough() {
        let mut buffer = FrameBuffer::with_capacity(4);
        buffer.write_u32(1);
        assert_eq!(buffer.capacity(), 4);
        buffer.write_u32(2);
        assert_eq!(buffer.capacity(), 8);
    }

    #[test]
    fn growth_fits_large_writes() {
        let mut buffer = FrameBuffer::with_capacity(4);
        buffer.write_bytes(&[7u8; 100]);
        assert_eq!(buffer.capacity(), 100);
        assert_eq!(buffer.len(), 100);
    }

    #[test]
    fn zero_capacity_buffer_grows_on_first_write() {
        let mut buffer = FrameBuffer::default();
        buffer.write_u32(42);
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    fn read_past_written_bytes_is_truncated() {
        let mut buffer = FrameBuffer::with_capacity(64);
        buffer.write_bytes(&[1, 2]);
        assert_eq!(
            buffer.read_u32(),
            Err(FrameError::Truncated {
                needed: 4,
                available: 2
            })
        );
        // A failed read leaves the cursor where it was.
        assert_eq!(buffer.position(), 0);
        assert_eq!(buffer.remaining(), 2);
    }

    #[test]
    fn cursors_are_independent() {
        let mut buffer = FrameBuffer::with_capacity(16);
        buffer.write_u32(9);
        assert_eq!(buffer.read_u32(), Ok(9));
        buffer.write_bytes(b"hi");
        assert_eq!(buffer.remaining(), 2);
        assert_eq!(buffer.len(), 6);
        assert_eq!(&buffer.read_bytes(2).unwrap()[..], b"hi");
        assert_eq!(buffer.remaining(), 0);
        assert_eq!(buffer.position(), 6);
    }

    #[test]
    fn decode_pass_reads_received_bytes_in_order() {
        let mut buffer = FrameBuffer::from_slice(&[0, 0, 0, 2, b'o', b'k']);
        let len = buffer.read_u32().unwrap() as usize;
        assert_eq!(&buffer.read_bytes(len).unwrap()[..], b"ok");
        assert_eq!(
            buffer.read_bytes(1),
            Err(FrameError::Truncated {
                needed: 1,
                available: 0
            })
        );
    }
}

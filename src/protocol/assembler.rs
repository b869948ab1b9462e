//! Reassembles frames from a TCP byte stream.
//!
//! Reads land in one `BytesMut`; a frame is handed out only once all of its
//! `total size` bytes have arrived, so long messages may span many reads and
//! several small frames may arrive in one read.

use bytes::{Buf, Bytes, BytesMut};

use super::error::FrameError;
use super::frame::MIN_FRAME_LEN;

const INITIAL_CAPACITY: usize = 512;

#[derive(Debug)]
pub struct FrameAssembler {
    buffer: BytesMut,
    max_frame_size: usize,
}

impl FrameAssembler {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            max_frame_size,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Destination for socket reads.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Split off the next complete raw frame, if one is buffered.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        if self.buffer.len() < 4 {
            return Ok(None);
        }

        let declared = (&self.buffer[..4]).get_u32();
        let total = declared as usize;
        if total < MIN_FRAME_LEN {
            return Err(FrameError::InvalidTotalSize(declared));
        }
        if total > self.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: total,
                max: self.max_frame_size,
            });
        }
        if self.buffer.len() < total {
            self.buffer.reserve(total - self.buffer.len());
            return Ok(None);
        }

        Ok(Some(self.buffer.split_to(total).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Frame, DEFAULT_MAX_FRAME_SIZE};

    #[test]
    fn frame_split_across_reads_is_reassembled() {
        let encoded = Frame::text("hello there", "alice").encode().unwrap();
        let mut assembler = FrameAssembler::new(DEFAULT_MAX_FRAME_SIZE);

        assembler.feed(&encoded[..3]);
        assert_eq!(assembler.next_frame(), Ok(None));
        assembler.feed(&encoded[3..20]);
        assert_eq!(assembler.next_frame(), Ok(None));
        assembler.feed(&encoded[20..]);

        let raw = assembler.next_frame().unwrap().unwrap();
        assert_eq!(Frame::decode(&raw).unwrap(), Frame::text("hello there", "alice"));
        assert_eq!(assembler.buffered_len(), 0);
    }

    #[test]
    fn back_to_back_frames_in_one_read() {
        let first = Frame::join_room("games", "bob").encode().unwrap();
        let second = Frame::text("hi", "bob").encode().unwrap();
        let mut assembler = FrameAssembler::new(DEFAULT_MAX_FRAME_SIZE);
        assembler.feed(&first);
        assembler.feed(&second[..5]);

        assert_eq!(assembler.next_frame().unwrap().unwrap(), first);
        assert_eq!(assembler.next_frame(), Ok(None));
        assembler.feed(&second[5..]);
        assert_eq!(assembler.next_frame().unwrap().unwrap(), second);
    }

    #[test]
    fn oversized_frame_is_rejected_before_buffering() {
        let mut assembler = FrameAssembler::new(64);
        assembler.feed(&1_000u32.to_be_bytes());
        assert_eq!(
            assembler.next_frame(),
            Err(FrameError::FrameTooLarge {
                size: 1_000,
                max: 64
            })
        );
    }

    #[test]
    fn total_size_below_minimum_is_rejected() {
        let mut assembler = FrameAssembler::new(DEFAULT_MAX_FRAME_SIZE);
        assembler.feed(&4u32.to_be_bytes());
        assert_eq!(assembler.next_frame(), Err(FrameError::InvalidTotalSize(4)));
    }
}

//! Pulls whole frames off an async byte stream.
//!
//! [`FrameReader`] feeds socket reads into a [`FrameAssembler`] and decodes
//! each complete frame. Both the relay's connection tasks and the client read
//! through it.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::assembler::FrameAssembler;
use super::error::FrameError;
use super::frame::Frame;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error("stream framing error: {0}")]
    Frame(#[from] FrameError),
}

#[derive(Debug)]
pub enum ReadEvent {
    Frame(Frame),
    /// A complete frame whose payload could not be decoded. The stream is still in sync.
    Malformed(FrameError),
    /// The peer closed the stream.
    Closed,
    /// The stream can no longer be read.
    Failed(ReadError),
}

/// Pulls whole frames off a byte stream.
pub struct FrameReader<R> {
    reader: R,
    assembler: FrameAssembler,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_frame_size: usize) -> Self {
        Self {
            reader,
            assembler: FrameAssembler::new(max_frame_size),
        }
    }

    pub async fn next_event(&mut self) -> ReadEvent {
        loop {
            match self.assembler.next_frame() {
                Ok(Some(raw)) => {
                    return match Frame::decode(&raw) {
                        Ok(frame) => ReadEvent::Frame(frame),
                        Err(err) => ReadEvent::Malformed(err),
                    };
                }
                Ok(None) => {}
                Err(err) => return ReadEvent::Failed(ReadError::Frame(err)),
            }

            match self.reader.read_buf(self.assembler.buffer_mut()).await {
                Ok(0) => {
                    if self.assembler.buffered_len() > 0 {
                        debug!(
                            buffered = self.assembler.buffered_len(),
                            "Stream closed with a partial frame buffered"
                        );
                    }
                    return ReadEvent::Closed;
                }
                Ok(_) => {}
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) => {}
                Err(err) => return ReadEvent::Failed(ReadError::Io(err)),
            }
        }
    }
}

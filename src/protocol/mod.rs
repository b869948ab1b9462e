// Protocol module: wire frames, the byte buffer they are built on, stream reassembly and reading

pub mod assembler;
pub mod buffer;
pub mod error;
pub mod frame;
pub mod reader;

pub use assembler::FrameAssembler;
pub use buffer::FrameBuffer;
pub use error::FrameError;
pub use frame::{
    Frame, MessageType, RoomPayload, TextPayload, DEFAULT_MAX_FRAME_SIZE, HEADER_LEN,
    MIN_FRAME_LEN, PAYLOAD_PREFIX_LEN,
};
pub use reader::{FrameReader, ReadError, ReadEvent};

/// Body of the notification announcing that `name` joined.
pub fn joined_notice(name: &str) -> String {
    format!("{name} has joined the room.")
}

/// Body of the notification announcing that `name` left.
pub fn left_notice(name: &str) -> String {
    format!("{name} has left the room.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_embed_the_sender_name() {
        assert_eq!(joined_notice("alice"), "alice has joined the room.");
        assert_eq!(left_notice("bob"), "bob has left the room.");
    }
}

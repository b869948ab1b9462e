//! Relay frame layout.
//!
//! ```text
//! [0:4)   total size (header + payload, inclusive)
//! [4:8)   message type  1=Notification 2=Text 3=JoinRoom 4=LeaveRoom
//! [8:12)  first field length  (body, or comma-separated room list)
//! [12:16) sender name length
//! [16..)  first field bytes, then sender name bytes
//! ```
//!
//! All integers are 4-byte big-endian.

use bytes::Bytes;
use std::fmt;

use super::buffer::FrameBuffer;
use super::error::FrameError;

/// Size of the `total size` + `message type` header.
pub const HEADER_LEN: usize = 8;
/// Size of the two length prefixes that open every payload.
pub const PAYLOAD_PREFIX_LEN: usize = 8;
/// Smallest well-formed frame: header, both prefixes, empty fields.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + PAYLOAD_PREFIX_LEN;
/// Frame size limit applied when none is configured.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Notification = 1,
    Text = 2,
    JoinRoom = 3,
    LeaveRoom = 4,
}

impl MessageType {
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::Text => "text",
            Self::JoinRoom => "join_room",
            Self::LeaveRoom => "leave_room",
        }
    }
}

impl TryFrom<u32> for MessageType {
    type Error = FrameError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Notification),
            2 => Ok(Self::Text),
            3 => Ok(Self::JoinRoom),
            4 => Ok(Self::LeaveRoom),
            other => Err(FrameError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `Text` and `Notification` frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPayload {
    pub body: String,
    pub sender_name: String,
}

/// Payload of `JoinRoom` and `LeaveRoom` frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPayload {
    /// Comma-separated room names exactly as sent.
    pub rooms: String,
    pub sender_name: String,
}

impl RoomPayload {
    /// Room names with surrounding whitespace removed and empty entries dropped.
    pub fn room_names(&self) -> Vec<String> {
        self.rooms
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// One complete protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Notification(TextPayload),
    Text(TextPayload),
    JoinRoom(RoomPayload),
    LeaveRoom(RoomPayload),
}

impl Frame {
    pub fn notification(body: impl Into<String>, sender_name: impl Into<String>) -> Self {
        Self::Notification(TextPayload {
            body: body.into(),
            sender_name: sender_name.into(),
        })
    }

    pub fn text(body: impl Into<String>, sender_name: impl Into<String>) -> Self {
        Self::Text(TextPayload {
            body: body.into(),
            sender_name: sender_name.into(),
        })
    }

    pub fn join_room(rooms: impl Into<String>, sender_name: impl Into<String>) -> Self {
        Self::JoinRoom(RoomPayload {
            rooms: rooms.into(),
            sender_name: sender_name.into(),
        })
    }

    pub fn leave_room(rooms: impl Into<String>, sender_name: impl Into<String>) -> Self {
        Self::LeaveRoom(RoomPayload {
            rooms: rooms.into(),
            sender_name: sender_name.into(),
        })
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Notification(_) => MessageType::Notification,
            Self::Text(_) => MessageType::Text,
            Self::JoinRoom(_) => MessageType::JoinRoom,
            Self::LeaveRoom(_) => MessageType::LeaveRoom,
        }
    }

    pub fn sender_name(&self) -> &str {
        match self {
            Self::Notification(p) | Self::Text(p) => &p.sender_name,
            Self::JoinRoom(p) | Self::LeaveRoom(p) => &p.sender_name,
        }
    }

    fn fields(&self) -> (&str, &str) {
        match self {
            Self::Notification(p) | Self::Text(p) => (&p.body, &p.sender_name),
            Self::JoinRoom(p) | Self::LeaveRoom(p) => (&p.rooms, &p.sender_name),
        }
    }

    /// Exact number of bytes [`Frame::encode`] produces.
    pub fn encoded_len(&self) -> usize {
        let (first, name) = self.fields();
        MIN_FRAME_LEN + first.len() + name.len()
    }

    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let (first, name) = self.fields();
        let total = u32::try_from(self.encoded_len()).map_err(|_| FrameError::LengthOverflow)?;
        let first_len = u32::try_from(first.len()).map_err(|_| FrameError::LengthOverflow)?;
        let name_len = u32::try_from(name.len()).map_err(|_| FrameError::LengthOverflow)?;

        let mut buffer = FrameBuffer::with_capacity(self.encoded_len());
        buffer.write_u32(total);
        buffer.write_u32(self.message_type().as_u32());
        buffer.write_u32(first_len);
        buffer.write_u32(name_len);
        buffer.write_bytes(first.as_bytes());
        buffer.write_bytes(name.as_bytes());
        Ok(buffer.into_bytes())
    }

    /// Decode exactly one frame occupying all of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let mut buffer = FrameBuffer::from_slice(bytes);
        let declared = buffer.read_u32()? as usize;
        let message_type = MessageType::try_from(buffer.read_u32()?)?;
        let first_len = buffer.read_u32()? as usize;
        let name_len = buffer.read_u32()? as usize;
        let first = read_string(&mut buffer, first_len, first_field_name(message_type))?;
        let sender_name = read_string(&mut buffer, name_len, "sender name")?;

        let consumed = buffer.position();
        if declared != consumed {
            return Err(FrameError::SizeMismatch {
                declared,
                actual: consumed,
            });
        }
        if bytes.len() != consumed {
            return Err(FrameError::SizeMismatch {
                declared,
                actual: bytes.len(),
            });
        }

        Ok(match message_type {
            MessageType::Notification => Self::Notification(TextPayload {
                body: first,
                sender_name,
            }),
            MessageType::Text => Self::Text(TextPayload {
                body: first,
                sender_name,
            }),
            MessageType::JoinRoom => Self::JoinRoom(RoomPayload {
                rooms: first,
                sender_name,
            }),
            MessageType::LeaveRoom => Self::LeaveRoom(RoomPayload {
                rooms: first,
                sender_name,
            }),
        })
    }
}

fn first_field_name(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Notification | MessageType::Text => "body",
        MessageType::JoinRoom | MessageType::LeaveRoom => "room list",
    }
}

fn read_string(
    buffer: &mut FrameBuffer,
    len: usize,
    field: &'static str,
) -> Result<String, FrameError> {
    let raw = buffer.read_bytes(len)?;
    std::str::from_utf8(&raw)
        .map(str::to_owned)
        .map_err(|_| FrameError::InvalidUtf8 { field })
}

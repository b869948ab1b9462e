//! Async client for the relay.
//!
//! [`ClientSession`] holds the name and joined rooms for one connection;
//! [`RelayClient`] owns the socket and keeps the session in step with the
//! frames it sends.

use std::io;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::protocol::{
    Frame, FrameError, FrameReader, ReadError, ReadEvent, DEFAULT_MAX_FRAME_SIZE,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("join a room before sending messages")]
    NotJoined,
}

impl From<ReadError> for ClientError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Io(err) => Self::Io(err),
            ReadError::Frame(err) => Self::Frame(err),
        }
    }
}

/// Name and room membership as the client understands them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSession {
    name: String,
    rooms: Vec<String>,
}

impl ClientSession {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rooms: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rooms(&self) -> &[String] {
        &self.rooms
    }

    pub fn is_joined(&self) -> bool {
        !self.rooms.is_empty()
    }

    /// Record every room in a comma-separated list, skipping ones already held.
    pub fn add_rooms(&mut self, list: &str) {
        for room in list.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            if !self.rooms.iter().any(|held| held == room) {
                self.rooms.push(room.to_string());
            }
        }
    }

    /// Returns whether the room was held.
    pub fn remove_room(&mut self, room: &str) -> bool {
        match self.rooms.iter().position(|held| held == room) {
            Some(index) => {
                self.rooms.remove(index);
                true
            }
            None => false,
        }
    }

    fn take_rooms(&mut self) -> Vec<String> {
        std::mem::take(&mut self.rooms)
    }
}

/// A line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    LeaveRoom(String),
    Say(String),
}

impl Command {
    /// `None` for input that sends nothing.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == "exit" {
            return Some(Self::Exit);
        }
        if let Some(rest) = line.strip_prefix("\\LR") {
            let room = rest.trim();
            return (!room.is_empty()).then(|| Self::LeaveRoom(room.to_string()));
        }
        (!line.is_empty()).then(|| Self::Say(line.to_string()))
    }
}

pub struct RelayClient {
    reader: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    session: ClientSession,
}

impl RelayClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: FrameReader::new(read_half, DEFAULT_MAX_FRAME_SIZE),
            writer: write_half,
            session: ClientSession::default(),
        })
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    /// Join the comma-separated `rooms` as `name`. The first call is the handshake.
    pub async fn join(&mut self, name: &str, rooms: &str) -> Result<(), ClientError> {
        self.send(&Frame::join_room(rooms, name)).await?;
        if self.session.name != name {
            self.session.name = name.to_string();
        }
        self.session.add_rooms(rooms);
        Ok(())
    }

    pub async fn send_text(&mut self, body: &str) -> Result<(), ClientError> {
        if !self.session.is_joined() {
            return Err(ClientError::NotJoined);
        }
        let frame = Frame::text(body, self.session.name());
        self.send(&frame).await
    }

    /// Leave one room. Returns the number of rooms still held.
    ///
    /// The frame is sent even for a room the session does not hold; the
    /// relay answers that by closing the connection.
    pub async fn leave(&mut self, room: &str) -> Result<usize, ClientError> {
        self.session.remove_room(room);
        let frame = Frame::leave_room(room, self.session.name());
        self.send(&frame).await?;
        Ok(self.session.rooms().len())
    }

    /// Leave every held room, one frame per room.
    pub async fn leave_all(&mut self) -> Result<(), ClientError> {
        for room in self.session.take_rooms() {
            let frame = Frame::leave_room(room, self.session.name());
            self.send(&frame).await?;
        }
        Ok(())
    }

    /// Next frame from the relay, or `None` once it closes the connection.
    /// Frames that fail to decode are skipped.
    pub async fn recv(&mut self) -> Result<Option<Frame>, ClientError> {
        loop {
            match self.reader.next_event().await {
                ReadEvent::Frame(frame) => return Ok(Some(frame)),
                ReadEvent::Malformed(err) => {
                    tracing::debug!(error = %err, "Skipping undecodable frame from relay");
                }
                ReadEvent::Closed => return Ok(None),
                ReadEvent::Failed(err) => return Err(err.into()),
            }
        }
    }

    async fn send(&mut self, frame: &Frame) -> Result<(), ClientError> {
        let bytes = frame.encode()?;
        self.writer.write_all(&bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recognizes_commands() {
        assert_eq!(Command::parse("exit"), Some(Command::Exit));
        assert_eq!(Command::parse("exit\r\n"), Some(Command::Exit));
        assert_eq!(
            Command::parse("\\LR games"),
            Some(Command::LeaveRoom("games".to_string()))
        );
        assert_eq!(
            Command::parse("hello there"),
            Some(Command::Say("hello there".to_string()))
        );
    }

    #[test]
    fn parse_ignores_empty_input() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("\n"), None);
        assert_eq!(Command::parse("\\LR"), None);
        assert_eq!(Command::parse("\\LR   "), None);
    }

    #[test]
    fn exit_must_match_exactly() {
        assert_eq!(
            Command::parse("exit now"),
            Some(Command::Say("exit now".to_string()))
        );
    }

    #[test]
    fn session_tracks_rooms_without_duplicates() {
        let mut session = ClientSession::new("alice");
        session.add_rooms("games, news,,games");
        session.add_rooms("news,study");

        assert_eq!(session.rooms(), &["games", "news", "study"]);
        assert!(session.remove_room("news"));
        assert!(!session.remove_room("news"));
        assert_eq!(session.rooms(), &["games", "study"]);
    }

    #[test]
    fn empty_session_is_not_joined() {
        let mut session = ClientSession::new("bob");
        assert!(!session.is_joined());
        session.add_rooms("games");
        assert!(session.is_joined());
        assert_eq!(session.take_rooms(), vec!["games".to_string()]);
        assert!(!session.is_joined());
    }
}

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{Frame, FrameError, FrameReader, ReadError, ReadEvent, RoomPayload};
use crate::registry::ConnectionId;

use super::RelayServer;

/// Upper bound on how long a closing connection waits for queued output to flush.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, waiting for the first `JoinRoom` frame.
    Pending,
    /// Member of at least one room.
    Joined,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    PeerClosed,
    TransportError,
    ProtocolViolation,
    HandshakeRejected,
    HandshakeTimeout,
    OrphanedLeave,
    LeftAllRooms,
    Shutdown,
    HubUnavailable,
}

/// Drain the outbound queue onto the socket until the queue closes or a write fails.
///
/// A failed write cancels `failed` so the connection task closes the
/// connection and the hub forgets it.
pub(super) async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut outbound: mpsc::Receiver<Bytes>,
    connection: ConnectionId,
    failed: CancellationToken,
) {
    while let Some(bytes) = outbound.recv().await {
        if let Err(err) = writer.write_all(&bytes).await {
            warn!(
                %connection,
                operation = "send",
                error = %err,
                kind = ?err.kind(),
                "Write failed, closing connection"
            );
            failed.cancel();
            return;
        }
    }
    let _ = writer.shutdown().await;
}

pub(super) async fn handle_connection(
    server: Arc<RelayServer>,
    stream: TcpStream,
    addr: SocketAddr,
    shutdown: CancellationToken,
) {
    let connection = Uuid::new_v4();
    let metrics = server.metrics.clone();
    metrics.increment_connections();
    info!(%connection, client_addr = %addr, state = ?ConnectionState::Pending, "Connection accepted");

    let (read_half, write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half, server.config.max_frame_size);

    let reason = match await_join(&server, &mut reader, connection, &shutdown).await {
        Ok(payload) => {
            let (tx, rx) = mpsc::channel(server.config.outbound_queue_capacity.max(1));
            let write_failed = CancellationToken::new();
            let mut writer =
                tokio::spawn(write_loop(write_half, rx, connection, write_failed.clone()));
            let reason = run_joined(
                &server,
                &mut reader,
                connection,
                payload,
                tx,
                &shutdown,
                &write_failed,
            )
            .await;

            if let Err(err) = server.hub.disconnect(connection).await {
                debug!(%connection, error = %err, "Hub gone before disconnect");
            }
            // The hub dropped the last queue sender, so the writer ends once drained.
            if timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
                debug!(%connection, "Writer did not drain before timeout");
                writer.abort();
            }
            reason
        }
        Err(reason) => {
            metrics.increment_rejected_handshakes();
            reason
        }
    };

    metrics.decrement_active_connections();
    info!(%connection, client_addr = %addr, ?reason, state = ?ConnectionState::Closed, "Connection closed");
}

/// Pending state: the first frame must be a `JoinRoom` naming at least one room.
async fn await_join<R: AsyncRead + Unpin>(
    server: &RelayServer,
    reader: &mut FrameReader<R>,
    connection: ConnectionId,
    shutdown: &CancellationToken,
) -> Result<RoomPayload, CloseReason> {
    let event = tokio::select! {
        () = shutdown.cancelled() => return Err(CloseReason::Shutdown),
        event = timeout(server.config.join_timeout, reader.next_event()) => match event {
            Ok(event) => event,
            Err(_) => {
                warn!(%connection, timeout = ?server.config.join_timeout, "No JoinRoom before timeout");
                return Err(CloseReason::HandshakeTimeout);
            }
        },
    };

    match event {
        ReadEvent::Frame(Frame::JoinRoom(payload)) if !payload.room_names().is_empty() => {
            server.metrics.increment_frames_received();
            Ok(payload)
        }
        ReadEvent::Frame(frame) => {
            server.metrics.increment_frames_received();
            warn!(
                %connection,
                message_type = %frame.message_type(),
                "First frame must be JoinRoom naming at least one room"
            );
            Err(CloseReason::HandshakeRejected)
        }
        ReadEvent::Malformed(err) => {
            server.metrics.increment_malformed_frames();
            warn!(%connection, error = %err, "Malformed handshake frame");
            Err(CloseReason::HandshakeRejected)
        }
        ReadEvent::Closed => Err(CloseReason::PeerClosed),
        ReadEvent::Failed(err) => Err(record_read_failure(server, connection, &err)),
    }
}

/// Joined state: dispatch frames to the hub until the connection closes.
async fn run_joined<R: AsyncRead + Unpin>(
    server: &RelayServer,
    reader: &mut FrameReader<R>,
    connection: ConnectionId,
    handshake: RoomPayload,
    outbound: mpsc::Sender<Bytes>,
    shutdown: &CancellationToken,
    write_failed: &CancellationToken,
) -> CloseReason {
    let rooms = handshake.room_names();
    if server
        .hub
        .join(connection, handshake.sender_name, rooms, Some(outbound))
        .await
        .is_err()
    {
        return CloseReason::HubUnavailable;
    }
    debug!(%connection, state = ?ConnectionState::Joined, "Handshake complete");

    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => return CloseReason::Shutdown,
            () = write_failed.cancelled() => {
                server.metrics.increment_transport_errors();
                return CloseReason::TransportError;
            }
            event = reader.next_event() => event,
        };

        let frame = match event {
            ReadEvent::Frame(frame) => frame,
            ReadEvent::Malformed(err) => {
                server.metrics.increment_malformed_frames();
                warn!(%connection, error = %err, "Dropping malformed frame");
                continue;
            }
            ReadEvent::Closed => return CloseReason::PeerClosed,
            ReadEvent::Failed(err) => return record_read_failure(server, connection, &err),
        };
        server.metrics.increment_frames_received();

        match dispatch(server, connection, frame).await {
            Ok(None) => {}
            Ok(Some(reason)) => return reason,
            Err(_) => return CloseReason::HubUnavailable,
        }
    }
}

async fn dispatch(
    server: &RelayServer,
    connection: ConnectionId,
    frame: Frame,
) -> Result<Option<CloseReason>, super::HubError> {
    match frame {
        Frame::Text(payload) => {
            server
                .hub
                .text(connection, payload.sender_name, payload.body)
                .await?;
        }
        Frame::JoinRoom(payload) => {
            let rooms = payload.room_names();
            if rooms.is_empty() {
                debug!(%connection, "Ignoring JoinRoom without room names");
            } else {
                server
                    .hub
                    .join(connection, payload.sender_name, rooms, None)
                    .await?;
            }
        }
        Frame::LeaveRoom(payload) => {
            let rooms = payload.room_names();
            let result = server
                .hub
                .leave(connection, payload.sender_name, rooms)
                .await?;
            if result.orphaned {
                return Ok(Some(CloseReason::OrphanedLeave));
            }
            if result.remaining == 0 {
                return Ok(Some(CloseReason::LeftAllRooms));
            }
        }
        Frame::Notification(payload) => {
            server.metrics.increment_client_notifications();
            info!(
                %connection,
                sender = %payload.sender_name,
                body = %payload.body,
                "Client notification"
            );
        }
    }
    Ok(None)
}

fn record_read_failure(server: &RelayServer, connection: ConnectionId, err: &ReadError) -> CloseReason {
    match err {
        ReadError::Io(io_err) => {
            server.metrics.increment_transport_errors();
            warn!(
                %connection,
                operation = "recv",
                error = %io_err,
                kind = ?io_err.kind(),
                "Read failed"
            );
            CloseReason::TransportError
        }
        ReadError::Frame(frame_err) => {
            if matches!(frame_err, FrameError::FrameTooLarge { .. }) {
                server.metrics.increment_oversized_frames();
            } else {
                server.metrics.increment_malformed_frames();
            }
            warn!(%connection, error = %frame_err, "Unrecoverable framing error");
            CloseReason::ProtocolViolation
        }
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::broadcast::{broadcast, OutboundSender};
use crate::metrics::RelayMetrics;
use crate::protocol::{joined_notice, left_notice, Frame};
use crate::registry::{ConnectionId, JoinOutcome, LeaveOutcome, RegistrySnapshot, RoomRegistry};

use super::ServerConfig;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HubError {
    #[error("relay hub has stopped")]
    Unavailable,
}

/// Result of a `LeaveRoom` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaveResult {
    pub left: Vec<String>,
    /// A named room did not contain the connection, or no room was named;
    /// it has been removed from every room and must be closed.
    pub orphaned: bool,
    /// Rooms the connection still belongs to.
    pub remaining: usize,
}

pub(crate) enum HubCommand {
    Join {
        connection: ConnectionId,
        name: String,
        rooms: Vec<String>,
        /// Present on the handshake join, absent on additional joins.
        outbound: Option<OutboundSender>,
        reply: oneshot::Sender<JoinOutcome>,
    },
    Text {
        connection: ConnectionId,
        name: String,
        body: String,
    },
    Leave {
        connection: ConnectionId,
        name: String,
        rooms: Vec<String>,
        reply: oneshot::Sender<LeaveResult>,
    },
    Disconnect {
        connection: ConnectionId,
    },
    Snapshot {
        reply: oneshot::Sender<RegistrySnapshot>,
    },
}

/// Cloneable front end for the hub task.
#[derive(Clone)]
pub(crate) struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    pub async fn join(
        &self,
        connection: ConnectionId,
        name: String,
        rooms: Vec<String>,
        outbound: Option<OutboundSender>,
    ) -> Result<JoinOutcome, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Join {
            connection,
            name,
            rooms,
            outbound,
            reply,
        })
        .await?;
        response.await.map_err(|_| HubError::Unavailable)
    }

    pub async fn text(
        &self,
        connection: ConnectionId,
        name: String,
        body: String,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Text {
            connection,
            name,
            body,
        })
        .await
    }

    pub async fn leave(
        &self,
        connection: ConnectionId,
        name: String,
        rooms: Vec<String>,
    ) -> Result<LeaveResult, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Leave {
            connection,
            name,
            rooms,
            reply,
        })
        .await?;
        response.await.map_err(|_| HubError::Unavailable)
    }

    pub async fn disconnect(&self, connection: ConnectionId) -> Result<(), HubError> {
        self.send(HubCommand::Disconnect { connection }).await
    }

    pub async fn snapshot(&self) -> Result<RegistrySnapshot, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Snapshot { reply }).await?;
        response.await.map_err(|_| HubError::Unavailable)
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::Unavailable)
    }
}

/// Owner of the room registry and of every joined connection's outbound queue.
pub(crate) struct RelayHub {
    registry: RoomRegistry,
    outbound: HashMap<ConnectionId, OutboundSender>,
    metrics: Arc<RelayMetrics>,
}

impl RelayHub {
    pub fn new(default_rooms: &[String], metrics: Arc<RelayMetrics>) -> Self {
        let mut registry = RoomRegistry::new();
        for name in default_rooms {
            let name = name.trim();
            if !name.is_empty() {
                registry.ensure_room(name);
            }
        }
        metrics.add_rooms_created(registry.room_count() as u64);

        Self {
            registry,
            outbound: HashMap::new(),
            metrics,
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Join {
                connection,
                name,
                rooms,
                outbound,
                reply,
            } => {
                let outcome = self.join(connection, &name, &rooms, outbound);
                let _ = reply.send(outcome);
            }
            HubCommand::Text {
                connection,
                name,
                body,
            } => self.text(connection, name, body),
            HubCommand::Leave {
                connection,
                name,
                rooms,
                reply,
            } => {
                let result = self.leave(connection, &name, &rooms);
                let _ = reply.send(result);
            }
            HubCommand::Disconnect { connection } => self.disconnect(&connection),
            HubCommand::Snapshot { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }

    pub fn join(
        &mut self,
        connection: ConnectionId,
        name: &str,
        rooms: &[String],
        outbound: Option<OutboundSender>,
    ) -> JoinOutcome {
        if let Some(sender) = outbound {
            self.outbound.insert(connection, sender);
        }

        let outcome = self.registry.join(connection, rooms);
        self.metrics.add_rooms_created(outcome.created.len() as u64);
        self.metrics.add_room_joins(outcome.joined.len() as u64);
        for room in &outcome.created {
            info!(room = %room, "Room created");
        }
        info!(
            %connection,
            name,
            joined = ?outcome.joined,
            already_member = ?outcome.already_member,
            "Connection joined rooms"
        );

        // Announced to every room the connection now belongs to, not only the new ones.
        if !outcome.joined.is_empty() {
            self.announce(&Frame::notification(joined_notice(name), name), &connection);
        }
        outcome
    }

    pub fn text(&mut self, connection: ConnectionId, name: String, body: String) {
        if !self.registry.is_member(&connection) {
            debug!(%connection, "Dropping text from connection outside every room");
            return;
        }
        self.announce(&Frame::text(body, name), &connection);
    }

    /// Leave each named room in order.
    ///
    /// A room the connection is not in, or an empty room list, makes the
    /// leave orphaned. Rooms matched before the miss are still left, then
    /// the connection is removed from every remaining room.
    pub fn leave(&mut self, connection: ConnectionId, name: &str, rooms: &[String]) -> LeaveResult {
        // Peers hear the notice while the leaver is still a member.
        self.announce(&Frame::notification(left_notice(name), name), &connection);

        let mut result = LeaveResult::default();
        if rooms.is_empty() {
            self.metrics.increment_orphaned_leaves();
            warn!(%connection, name, "Leave without any room name");
            result.orphaned = true;
        }
        for room in rooms {
            match self.registry.leave(&connection, room) {
                LeaveOutcome::Left => {
                    self.metrics.increment_room_leaves();
                    info!(%connection, name, room = %room, "Connection left room");
                    result.left.push(room.clone());
                }
                LeaveOutcome::NotMember => {
                    self.metrics.increment_orphaned_leaves();
                    warn!(%connection, name, room = %room, "Leave for a room the connection is not in");
                    result.orphaned = true;
                }
            }
        }

        if result.orphaned {
            self.disconnect(&connection);
        } else {
            result.remaining = self.registry.rooms_of(&connection).count();
        }
        result
    }

    /// Drop every membership and the outbound queue. Unknown connections are a no-op.
    pub fn disconnect(&mut self, connection: &ConnectionId) {
        let rooms = self.registry.remove_everywhere(connection);
        let had_queue = self.outbound.remove(connection).is_some();
        if had_queue || !rooms.is_empty() {
            debug!(%connection, ?rooms, "Connection removed from hub");
        }
    }

    /// Broadcast on behalf of `sender`, then drop every peer whose queue is gone.
    fn announce(&mut self, frame: &Frame, sender: &ConnectionId) {
        let report = match broadcast(frame, sender, &self.registry, &self.outbound, &self.metrics) {
            Ok(report) => report,
            Err(err) => {
                warn!(
                    from = %sender,
                    message_type = %frame.message_type(),
                    error = %err,
                    "Failed to encode frame for broadcast"
                );
                return;
            }
        };
        let unreachable: Vec<ConnectionId> = report.unreachable().copied().collect();
        for peer in unreachable {
            info!(connection = %peer, "Dropping connection whose writer has stopped");
            self.disconnect(&peer);
        }
    }

    fn log_metrics(&self) {
        let snapshot = self.metrics.snapshot();
        info!(
            rooms = self.registry.room_count(),
            members = self.registry.connection_count(),
            active_connections = snapshot.connections.active_connections,
            frames_received = snapshot.frames.frames_received,
            broadcasts = snapshot.fan_out.broadcasts,
            delivery_failures = snapshot.fan_out.delivery_failures,
            "Relay metrics"
        );
    }

    async fn run(mut self, mut commands: mpsc::Receiver<HubCommand>, metrics_interval: Duration) {
        if metrics_interval.is_zero() {
            while let Some(command) = commands.recv().await {
                self.handle(command);
            }
        } else {
            let mut ticker = tokio::time::interval(metrics_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    command = commands.recv() => match command {
                        Some(command) => self.handle(command),
                        None => break,
                    },
                    _ = ticker.tick() => self.log_metrics(),
                }
            }
        }
        debug!("Relay hub stopped");
    }
}

/// Start the hub task and return its handle.
pub(crate) fn spawn(config: &ServerConfig, metrics: Arc<RelayMetrics>) -> HubHandle {
    let (commands, receiver) = mpsc::channel(config.command_queue_capacity.max(1));
    let hub = RelayHub::new(&config.default_rooms, metrics);
    tokio::spawn(hub.run(receiver, config.metrics_log_interval));
    HubHandle { commands }
}

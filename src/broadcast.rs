//! Room fan-out.
//!
//! A frame is encoded once and the resulting `Bytes` handle is cloned into
//! every recipient's outbound queue, so fan-out cost does not grow with the
//! message size.
//!
//! Delivery rules:
//! - only rooms the sender belongs to are considered
//! - the sender never receives its own message
//! - a peer sharing several rooms with the sender receives one copy per room
//! - a full or closed queue fails that one recipient and fan-out continues
//! - a recipient that failed is not retried within the same broadcast

use bytes::Bytes;
use smallvec::SmallVec;
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::metrics::RelayMetrics;
use crate::protocol::{Frame, FrameError};
use crate::registry::{ConnectionId, RoomRegistry};

/// Maximum number of recipients to stack-allocate for typical room broadcasts
pub const TYPICAL_ROOM_SIZE: usize = 8;

pub type Recipients = SmallVec<[ConnectionId; TYPICAL_ROOM_SIZE]>;

/// Queue feeding a connection's writer task.
pub type OutboundSender = mpsc::Sender<Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The recipient is not draining its queue fast enough.
    QueueFull,
    /// The recipient's writer has stopped.
    Closed,
    /// No outbound queue is registered for the recipient.
    Unknown,
}

impl DeliveryFailure {
    /// The recipient can never be reached again and should be dropped.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Unknown)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: Vec<(ConnectionId, DeliveryFailure)>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed.len()
    }

    /// Recipients whose queue is gone for good.
    pub fn unreachable(&self) -> impl Iterator<Item = &ConnectionId> {
        self.failed
            .iter()
            .filter(|(_, failure)| failure.is_terminal())
            .map(|(target, _)| target)
    }
}

/// Every member of every room `sender` belongs to, excluding `sender`.
pub fn fan_out_targets(registry: &RoomRegistry, sender: &ConnectionId) -> Recipients {
    let mut targets = Recipients::new();
    for name in registry.rooms_of(sender) {
        let Some(room) = registry.room(name) else {
            continue;
        };
        targets.extend(room.members().iter().copied().filter(|id| id != sender));
    }
    targets
}

/// Deliver `frame` to every fan-out target of `sender`.
pub fn broadcast(
    frame: &Frame,
    sender: &ConnectionId,
    registry: &RoomRegistry,
    outbound: &HashMap<ConnectionId, OutboundSender>,
    metrics: &RelayMetrics,
) -> Result<BroadcastReport, FrameError> {
    let encoded = frame.encode()?;
    let mut report = BroadcastReport::default();

    for target in fan_out_targets(registry, sender) {
        if report.failed.iter().any(|(failed, _)| *failed == target) {
            continue;
        }
        match deliver(outbound, &target, encoded.clone()) {
            Ok(()) => report.delivered += 1,
            Err(failure) => {
                tracing::warn!(
                    from = %sender,
                    to = %target,
                    message_type = %frame.message_type(),
                    ?failure,
                    "Failed to deliver frame to room member"
                );
                report.failed.push((target, failure));
            }
        }
    }

    metrics.record_broadcast(report.delivered as u64, report.failed.len() as u64);
    tracing::debug!(
        from = %sender,
        message_type = %frame.message_type(),
        delivered = report.delivered,
        failed = report.failed.len(),
        "Broadcast complete"
    );
    Ok(report)
}

fn deliver(
    outbound: &HashMap<ConnectionId, OutboundSender>,
    target: &ConnectionId,
    bytes: Bytes,
) -> Result<(), DeliveryFailure> {
    let queue = outbound.get(target).ok_or(DeliveryFailure::Unknown)?;
    queue.try_send(bytes).map_err(|err| match err {
        TrySendError::Full(_) => DeliveryFailure::QueueFull,
        TrySendError::Closed(_) => DeliveryFailure::Closed,
    })
}

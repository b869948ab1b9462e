use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the relay, shared between the hub and connection tasks.
#[derive(Debug)]
pub struct RelayMetrics {
    // Connection metrics
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,
    pub rejected_handshakes: AtomicU64,
    pub transport_errors: AtomicU64,

    // Frame metrics
    pub frames_received: AtomicU64,
    pub malformed_frames: AtomicU64,
    pub oversized_frames: AtomicU64,
    pub client_notifications: AtomicU64,

    // Room metrics
    pub rooms_created: AtomicU64,
    pub room_joins: AtomicU64,
    pub room_leaves: AtomicU64,
    pub orphaned_leaves: AtomicU64,

    // Fan-out metrics
    pub broadcasts: AtomicU64,
    pub deliveries: AtomicU64,
    pub delivery_failures: AtomicU64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub connections: ConnectionMetrics,
    pub frames: FrameMetrics,
    pub rooms: RoomMetrics,
    pub fan_out: FanOutMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionMetrics {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub rejected_handshakes: u64,
    pub transport_errors: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FrameMetrics {
    pub frames_received: u64,
    pub malformed_frames: u64,
    pub oversized_frames: u64,
    pub client_notifications: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RoomMetrics {
    pub rooms_created: u64,
    pub room_joins: u64,
    pub room_leaves: u64,
    pub orphaned_leaves: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FanOutMetrics {
    pub broadcasts: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            disconnections: AtomicU64::new(0),
            rejected_handshakes: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            malformed_frames: AtomicU64::new(0),
            oversized_frames: AtomicU64::new(0),
            client_notifications: AtomicU64::new(0),
            rooms_created: AtomicU64::new(0),
            room_joins: AtomicU64::new(0),
            room_leaves: AtomicU64::new(0),
            orphaned_leaves: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
        }
    }

    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        // Use fetch_update for atomic check-then-decrement to prevent underflow
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(1)
            });
        self.disconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected_handshakes(&self) {
        self.rejected_handshakes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transport_errors(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_frames_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_malformed_frames(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_oversized_frames(&self) {
        self.oversized_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_client_notifications(&self) {
        self.client_notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rooms_created(&self, count: u64) {
        self.rooms_created.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_room_joins(&self, count: u64) {
        self.room_joins.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_room_leaves(&self) {
        self.room_leaves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_orphaned_leaves(&self) {
        self.orphaned_leaves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self, delivered: u64, failed: u64) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered, Ordering::Relaxed);
        self.delivery_failures.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: chrono::Utc::now(),
            connections: ConnectionMetrics {
                total_connections: self.total_connections.load(Ordering::Relaxed),
                active_connections: self.active_connections.load(Ordering::Relaxed),
                disconnections: self.disconnections.load(Ordering::Relaxed),
                rejected_handshakes: self.rejected_handshakes.load(Ordering::Relaxed),
                transport_errors: self.transport_errors.load(Ordering::Relaxed),
            },
            frames: FrameMetrics {
                frames_received: self.frames_received.load(Ordering::Relaxed),
                malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
                oversized_frames: self.oversized_frames.load(Ordering::Relaxed),
                client_notifications: self.client_notifications.load(Ordering::Relaxed),
            },
            rooms: RoomMetrics {
                rooms_created: self.rooms_created.load(Ordering::Relaxed),
                room_joins: self.room_joins.load(Ordering::Relaxed),
                room_leaves: self.room_leaves.load(Ordering::Relaxed),
                orphaned_leaves: self.orphaned_leaves.load(Ordering::Relaxed),
            },
            fan_out: FanOutMetrics {
                broadcasts: self.broadcasts.load(Ordering::Relaxed),
                deliveries: self.deliveries.load(Ordering::Relaxed),
                delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            },
        }
    }
}

//! Relay behavior configuration types.

use super::defaults::{
    default_command_queue_capacity, default_join_timeout_secs, default_max_frame_size,
    default_metrics_log_interval_secs, default_outbound_queue_capacity, default_rooms,
};
use serde::{Deserialize, Serialize};

/// Relay configuration for framing, queues and rooms.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    /// Largest accepted frame in bytes, header included
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Time allowed between accept and the first `JoinRoom` frame (seconds)
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,
    /// Per-connection outbound frame queue length
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
    /// Length of the command queue feeding the relay hub
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,
    /// Rooms created at startup
    #[serde(default = "default_rooms")]
    pub default_rooms: Vec<String>,
    /// Interval for metrics summaries in the log (seconds, 0 disables)
    #[serde(default = "default_metrics_log_interval_secs")]
    pub metrics_log_interval_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_frame_size: default_max_frame_size(),
            join_timeout_secs: default_join_timeout_secs(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            command_queue_capacity: default_command_queue_capacity(),
            default_rooms: default_rooms(),
            metrics_log_interval_secs: default_metrics_log_interval_secs(),
        }
    }
}

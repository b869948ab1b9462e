//! Default value functions for configuration fields.
//!
//! These back the `#[serde(default = ...)]` attributes throughout the
//! configuration system, grouped by the section they belong to.

use super::logging::LogFormat;

// =============================================================================
// Listener
// =============================================================================

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub const fn default_port() -> u16 {
    8412
}

// =============================================================================
// Relay Defaults
// =============================================================================

pub const fn default_max_frame_size() -> usize {
    crate::protocol::DEFAULT_MAX_FRAME_SIZE
}

/// Seconds a new connection has to send its `JoinRoom` frame.
pub const fn default_join_timeout_secs() -> u64 {
    30
}

/// Frames queued per connection before deliveries to it start failing.
pub const fn default_outbound_queue_capacity() -> usize {
    256
}

pub const fn default_command_queue_capacity() -> usize {
    1024
}

/// Rooms that exist from startup.
pub fn default_rooms() -> Vec<String> {
    vec!["games".to_string(), "study".to_string(), "news".to_string()]
}

/// Seconds between metrics summaries in the log; 0 disables them.
pub const fn default_metrics_log_interval_secs() -> u64 {
    300
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "relay.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

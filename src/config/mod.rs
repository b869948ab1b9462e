//! Configuration module for the chat relay.
//!
//! Configuration comes from JSON files, inline JSON in the environment and
//! per-field environment overrides, on top of compiled-in defaults.
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`server`]: Relay behavior (framing limits, queues, default rooms)
//! - [`logging`]: Logging configuration
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod server;
pub mod types;
pub mod validation;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use server::RelayConfig;

pub use types::Config;

pub use validation::validate_config;

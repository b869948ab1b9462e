#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

//! # Chat Relay Server
//!
//! An in-memory TCP chat relay. Clients join named rooms with a binary
//! length-prefixed protocol and every text they send is fanned out to the
//! other members of their rooms.

/// Room fan-out of encoded frames
pub mod broadcast;

/// Async client for the relay protocol
pub mod client;

/// Server configuration and environment variables
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// Wire frames and stream reassembly
pub mod protocol;

/// Room membership registry
pub mod registry;

/// Listener, connection multiplexing and the relay hub
pub mod server;

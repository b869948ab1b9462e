use crate::config::Config;
use crate::metrics::RelayMetrics;
use crate::registry::RegistrySnapshot;
use anyhow::Context;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

mod connection;
mod hub;

pub use crate::protocol::{FrameReader, ReadError, ReadEvent};
pub use connection::{CloseReason, ConnectionState};
pub use hub::{HubError, LeaveResult};

use hub::HubHandle;

/// Runtime settings for the relay.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub max_frame_size: usize,
    /// Time a new connection has to send its `JoinRoom` frame.
    pub join_timeout: Duration,
    pub outbound_queue_capacity: usize,
    pub command_queue_capacity: usize,
    /// Rooms that exist before anyone joins.
    pub default_rooms: Vec<String>,
    /// Zero disables periodic metrics logging.
    pub metrics_log_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8412)),
            max_frame_size: crate::protocol::DEFAULT_MAX_FRAME_SIZE,
            join_timeout: Duration::from_secs(30),
            outbound_queue_capacity: 256,
            command_queue_capacity: 1024,
            default_rooms: vec!["games".to_string(), "study".to_string(), "news".to_string()],
            metrics_log_interval: Duration::from_secs(300),
        }
    }
}

impl ServerConfig {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let ip: IpAddr = cfg
            .host
            .trim()
            .parse()
            .with_context(|| format!("invalid host '{}'", cfg.host))?;

        Ok(Self {
            bind_addr: SocketAddr::new(ip, cfg.port),
            max_frame_size: cfg.relay.max_frame_size,
            join_timeout: Duration::from_secs(cfg.relay.join_timeout_secs),
            outbound_queue_capacity: cfg.relay.outbound_queue_capacity,
            command_queue_capacity: cfg.relay.command_queue_capacity,
            default_rooms: cfg.relay.default_rooms.clone(),
            metrics_log_interval: Duration::from_secs(cfg.relay.metrics_log_interval_secs),
        })
    }
}

/// TCP chat relay.
///
/// Connection tasks read frames and forward them to a single hub task that
/// owns the room registry, so joins, leaves and broadcasts never interleave.
pub struct RelayServer {
    config: ServerConfig,
    hub: HubHandle,
    metrics: Arc<RelayMetrics>,
}

impl RelayServer {
    /// Create the server and start its hub. Must be called inside a Tokio runtime.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let metrics = Arc::new(RelayMetrics::new());
        let hub = hub::spawn(&config, metrics.clone());

        Arc::new(Self {
            config,
            hub,
            metrics,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Current rooms and their members.
    pub async fn snapshot(&self) -> Result<RegistrySnapshot, HubError> {
        self.hub.snapshot().await
    }

    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind(self.config.bind_addr).await
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn serve(self: Arc<Self>, listener: TcpListener, shutdown: CancellationToken) {
        let local_addr = listener.local_addr().ok();
        tracing::info!(?local_addr, "Relay accepting connections");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        if let Err(err) = stream.set_nodelay(true) {
                            tracing::debug!(%addr, error = %err, "Failed to set TCP_NODELAY");
                        }
                        let server = self.clone();
                        let shutdown = shutdown.child_token();
                        tokio::spawn(async move {
                            connection::handle_connection(server, stream, addr, shutdown).await;
                        });
                    }
                    Err(err) => {
                        // Accept failures (e.g. fd exhaustion) affect one attempt, not the listener.
                        tracing::warn!(operation = "accept", error = %err, kind = ?err.kind(), "Accept failed");
                        if !accept_backoff(&shutdown).await {
                            break;
                        }
                    }
                },
            }
        }

        tracing::info!(?local_addr, "Relay stopped accepting connections");
    }
}

/// Pause before the next accept after a failed one.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Wait out [`ACCEPT_BACKOFF`]. Returns `false` if shutdown fired first.
async fn accept_backoff(shutdown: &CancellationToken) -> bool {
    tokio::select! {
        () = shutdown.cancelled() => false,
        () = tokio::time::sleep(ACCEPT_BACKOFF) => true,
    }
}

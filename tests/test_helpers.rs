use chat_relay_server::client::RelayClient;
use chat_relay_server::protocol::Frame;
use chat_relay_server::registry::RegistrySnapshot;
use chat_relay_server::server::{RelayServer, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

/// How long a test waits for something that should happen.
#[allow(dead_code)]
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a test listens to confirm that nothing arrives.
#[allow(dead_code)]
pub const SILENCE_WINDOW: Duration = Duration::from_millis(200);

pub struct TestRelay {
    pub server: Arc<RelayServer>,
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Default server configuration tuned for tests: ephemeral port, no periodic metrics.
#[allow(dead_code)]
pub fn test_server_config() -> ServerConfig {
    ServerConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        join_timeout: Duration::from_secs(5),
        metrics_log_interval: Duration::ZERO,
        ..ServerConfig::default()
    }
}

#[allow(dead_code)]
pub async fn start_test_relay() -> TestRelay {
    start_test_relay_with_config(test_server_config()).await
}

#[allow(dead_code)]
pub async fn start_test_relay_with_config(config: ServerConfig) -> TestRelay {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let server = RelayServer::new(config);
    let listener = server.bind().await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    let shutdown = CancellationToken::new();
    tokio::spawn(server.clone().serve(listener, shutdown.clone()));

    TestRelay {
        server,
        addr,
        shutdown,
    }
}

/// Connect, join and wait until the relay has registered the membership.
#[allow(dead_code)]
pub async fn join_client(relay: &TestRelay, name: &str, rooms: &str) -> RelayClient {
    let mut client = RelayClient::connect(relay.addr)
        .await
        .expect("connect to relay");
    let before = joined_connections(&relay.snapshot().await);
    client.join(name, rooms).await.expect("send join");
    relay
        .wait_for(|snapshot| joined_connections(snapshot) > before)
        .await;
    client
}

fn joined_connections(snapshot: &RegistrySnapshot) -> usize {
    let mut ids: Vec<_> = snapshot.rooms.values().flatten().collect();
    ids.sort();
    ids.dedup();
    ids.len()
}

impl TestRelay {
    #[allow(dead_code)]
    pub async fn snapshot(&self) -> RegistrySnapshot {
        self.server.snapshot().await.expect("hub is running")
    }

    /// Poll the registry until `predicate` holds.
    #[allow(dead_code)]
    pub async fn wait_for(&self, predicate: impl Fn(&RegistrySnapshot) -> bool) -> RegistrySnapshot {
        let result = timeout(EVENT_TIMEOUT, async {
            loop {
                let snapshot = self.snapshot().await;
                if predicate(&snapshot) {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        result.expect("registry did not reach the expected state")
    }
}

#[allow(dead_code)]
pub async fn recv_frame(client: &mut RelayClient) -> Frame {
    timeout(EVENT_TIMEOUT, client.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("read from relay")
        .expect("relay closed the connection")
}

#[allow(dead_code)]
pub async fn expect_silence(client: &mut RelayClient) {
    if let Ok(result) = timeout(SILENCE_WINDOW, client.recv()).await {
        panic!("expected no frame, got {result:?}");
    }
}

/// The relay closes the connection, either cleanly or with a reset.
#[allow(dead_code)]
pub async fn expect_closed(client: &mut RelayClient) {
    let result = timeout(EVENT_TIMEOUT, client.recv())
        .await
        .expect("relay kept the connection open");
    if let Ok(Some(frame)) = result {
        panic!("expected the connection to close, got {frame:?}");
    }
}

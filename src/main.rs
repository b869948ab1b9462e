#![cfg_attr(not(test), deny(clippy::panic))]

use chat_relay_server::config;
use chat_relay_server::logging;
use chat_relay_server::server::{RelayServer, ServerConfig};
use clap::Parser;
use tokio_util::sync::CancellationToken;

/// Chat relay -- in-memory TCP relay for room-based chat
#[derive(Parser, Debug)]
#[command(name = "chat-relay-server")]
#[command(about = "An in-memory TCP relay that fans chat messages out to room members")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // config::load() only reports validation errors to stderr; here they decide the exit code.
    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Listen address: {}:{}", cfg.host, cfg.port);
                println!("  Max frame size: {} bytes", cfg.relay.max_frame_size);
                println!("  Join timeout: {}s", cfg.relay.join_timeout_secs);
                println!("  Default rooms: {}", cfg.relay.default_rooms.join(", "));
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    let _log_guard = logging::init_with_config(&cfg.logging);

    let server_config = ServerConfig::from_config(&cfg)?;
    let server = RelayServer::new(server_config);

    // Failing to bind is the one error that stops the process.
    let listener = server.bind().await.map_err(|e| {
        anyhow::anyhow!("failed to bind {}: {e}", server.config().bind_addr)
    })?;
    tracing::info!(
        addr = %listener.local_addr()?,
        default_rooms = ?server.config().default_rooms,
        "Chat relay started"
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        signal_token.cancel();
    });

    server.clone().serve(listener, shutdown).await;

    let metrics = server.metrics().snapshot();
    tracing::info!(
        total_connections = metrics.connections.total_connections,
        broadcasts = metrics.fan_out.broadcasts,
        "Chat relay stopped"
    );

    Ok(())
}

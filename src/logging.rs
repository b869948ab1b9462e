use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::time::UtcTime, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize logging: stdout plus an optional rolling file appender.
///
/// Level precedence is `logging.level` from config, then `RUST_LOG`, then
/// `info`. The returned guard flushes buffered file output when dropped and
/// must be held for as long as the process logs.
pub fn init_with_config(cfg: &LoggingConfig) -> Option<WorkerGuard> {
    let env_filter = build_filter(cfg);
    let (file_writer, guard) = if cfg.enable_file_logging {
        match build_file_writer(cfg) {
            Some((writer, guard)) => (Some(writer), Some(guard)),
            None => (None, None),
        }
    } else {
        (None, None)
    };

    match cfg.format {
        LogFormat::Json => {
            let stdout_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(std::io::stdout);
            let file_layer = file_writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(writer)
            });
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .with(file_layer)
                .try_init();
        }
        LogFormat::Text => {
            let stdout_layer = tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(std::io::stdout);
            let file_layer = file_writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(writer)
            });
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .with(file_layer)
                .try_init();
        }
    }

    guard
}

fn build_filter(cfg: &LoggingConfig) -> EnvFilter {
    match &cfg.level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

fn build_file_writer(
    cfg: &LoggingConfig,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let rotation = match cfg.rotation.to_lowercase().as_str() {
        "hourly" => tracing_appender::rolling::Rotation::HOURLY,
        "never" => tracing_appender::rolling::Rotation::NEVER,
        _ => tracing_appender::rolling::Rotation::DAILY,
    };

    if let Err(err) = std::fs::create_dir_all(&cfg.dir) {
        eprintln!(
            "Failed to create log directory '{}' ({err}), continuing with stdout logs",
            cfg.dir
        );
        return None;
    }

    let file_appender =
        tracing_appender::rolling::RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    Some(tracing_appender::non_blocking(file_appender))
}

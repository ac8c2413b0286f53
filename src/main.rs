//! roulette-signal - real-time signaling and session-control core for a
//! peer-to-peer video/audio app.

mod clock;
mod collab;
mod config;
mod error;
mod handlers;
mod http;
mod metrics;
mod network;
mod state;
mod telemetry;
mod wire;

use crate::config::Config;
use crate::network::Gateway;
use crate::state::{Core, CoreParams};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Resolve the configuration path from CLI arguments.
/// Supports `-c <path>`, `--config <path>`, or a bare path.
/// Falls back to `config.toml` when no argument is provided.
fn resolve_config_path() -> String {
    let mut args = std::env::args().skip(1);

    match args.next() {
        Some(flag) if flag == "-c" || flag == "--config" => args.next().unwrap_or_else(|| {
            eprintln!("Missing path after {}", flag);
            std::process::exit(1);
        }),
        Some(path) => path,
        None => "config.toml".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = resolve_config_path();

    let config = Config::load(Path::new(&config_path)).map_err(|e| {
        eprintln!("ERROR: Failed to load config from {}: {}", config_path, e);
        e
    })?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match config.log_format {
        crate::config::LogFormat::Json => {
            tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true).json().init();
        }
        crate::config::LogFormat::Pretty => {
            tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true).init();
        }
    }

    if let Err(errors) = crate::config::validate(&config) {
        for err in &errors {
            if crate::config::is_fatal(err) {
                error!(error = %err, "fatal configuration error");
            } else {
                tracing::warn!(error = %err, "configuration warning");
            }
        }
        if errors.iter().any(crate::config::is_fatal) {
            return Err(anyhow::anyhow!("configuration validation failed with {} fatal error(s)", errors.len()));
        }
    }

    info!(host = %config.listen.host, port = config.listen.port, "starting roulette-signal");

    let addr = config.listen.socket_addr().map_err(|e| anyhow::anyhow!("invalid listen address: {e}"))?;
    let metrics_port = config.listen.metrics_port;

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let core = Arc::new(Core::new(CoreParams { config }));
    core.spawn_janitor(shutdown_tx.subscribe());
    info!("core initialized");

    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
            let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = sigint.recv() => info!("received SIGINT, initiating graceful shutdown"),
                _ = sigterm.recv() => info!("received SIGTERM, initiating graceful shutdown"),
            }
            let _ = shutdown_tx.send(());
        });
    }

    if metrics_port == 0 {
        info!("metrics disabled");
    } else {
        metrics::init();
        info!(port = metrics_port, "metrics initialized, served on /metrics");
    }

    let gateway = Gateway::bind(addr, core).await?;
    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        result = gateway.run() => {
            result?;
        }
        _ = shutdown_rx.recv() => {
            info!("shutdown signal received, gateway stopping");
        }
    }

    info!("gateway stopped, waiting for in-flight tasks to finish");
    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

    Ok(())
}

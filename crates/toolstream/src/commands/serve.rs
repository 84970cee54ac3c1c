//! HTTP server command implementation.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use toolstream::background::BackgroundTasks;
use toolstream::config::Config;
use toolstream::orchestrator::Orchestrator;
use toolstream::server;
use toolstream::tools::{ToolRegistry, create_builtin_tools};

pub async fn run(
    config_path: &str,
    host_override: Option<IpAddr>,
    port_override: Option<u16>,
) -> Result<()> {
    let mut config = Config::load(config_path)
        .await
        .with_context(|| format!("failed to load config '{config_path}'"))?;

    // CLI overrides config
    if let Some(host) = host_override {
        config.server.host = host.to_string();
    }
    if let Some(port) = port_override {
        config.server.port = port;
    }

    let registry = ToolRegistry::new().register_all(create_builtin_tools(&config.tools.builtins));
    info!(tools = registry.len(), "Registered tools");

    let background_tasks = BackgroundTasks::new();
    let orchestrator =
        Orchestrator::new(Arc::new(registry)).with_background_tasks(background_tasks.clone());

    let state = server::AppState {
        orchestrator,
        pipeline: config.pipeline.clone(),
        keep_alive_interval_seconds: config.server.keep_alive_interval_seconds,
        background_tasks: background_tasks.clone(),
    };

    let app = server::build_app(state, config.server.request_timeout_seconds);

    let ip: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid host '{}'", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        addr = %addr,
        mode = ?config.pipeline.mode,
        max_result_size = config.pipeline.max_result_size,
        "Starting server"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let detached batches run their invocations to completion before exiting
    background_tasks.shutdown().await;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

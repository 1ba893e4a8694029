// src/main.rs
use anyhow::Result;
use security_monitor::{
    aggregator::{JsonLinesSink, LogSink},
    config,
    metrics::MetricsRegistry,
    server::{self, StatusHandler},
    MonitorService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("security_monitor=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    // Initialize metrics
    let metrics_registry = Arc::new(MetricsRegistry::new()?);
    let service = Arc::new(MonitorService::from_config(
        &config,
        Some(metrics_registry.collector()),
    )?);
    let aggregator = service.aggregator();

    // Report sinks
    if config.export.log_reports {
        aggregator.add_sink(Arc::new(LogSink));
    }
    if let Some(path) = &config.export.json_lines_path {
        let sink = JsonLinesSink::open(path).await?;
        info!("Exporting cycle reports to {}", path.display());
        aggregator.add_sink(Arc::new(sink));
    }

    // Status / metrics server
    let (server_stop_tx, mut server_stop_rx) = watch::channel(false);
    let server_task = if config.metrics.enabled {
        let addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        let handler = StatusHandler::new(aggregator.clone())
            .with_metrics(metrics_registry.clone(), config.metrics.path.clone());

        Some(tokio::spawn(async move {
            let shutdown = async move {
                let _ = server_stop_rx.changed().await;
            };
            if let Err(e) = server::serve(addr, handler, shutdown).await {
                error!("Status server error: {:#}", e);
            }
        }))
    } else {
        None
    };

    service.start(config.interval()).await?;

    shutdown_signal().await;

    service.stop().await?;
    let _ = server_stop_tx.send(true);
    if let Some(task) = server_task {
        let _ = task.await;
    }

    info!("Security monitor shut down cleanly");
    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

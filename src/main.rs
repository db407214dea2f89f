//! Prometheus exporter for PrusaLink 3D printers.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use prusalink_exporter::config::LogFormat;
use prusalink_exporter::{ExporterConfig, HttpServer, MetricCollector, PrinterClient};

/// Prometheus exporter for PrusaLink 3D printers.
#[derive(Parser, Debug)]
#[command(name = "prusalink-exporter")]
#[command(about = "Export PrusaLink printer telemetry as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: String,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = ExporterConfig::load_from_file(&args.config)?;

    // Override listen address from CLI
    if let Some(listen) = args.listen {
        config.exporter.listen = listen;
    }

    // Initialize logging
    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("prusalink_exporter={}", log_level).parse()?)
        .add_directive(format!("reqwest={}", Level::WARN).parse()?)
        .add_directive(format!("hyper={}", Level::WARN).parse()?);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    info!("Starting PrusaLink Prometheus exporter");

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // One client per printer, all sharing the global scrape timeout
    let timeout = Duration::from_secs(config.scrape_timeout_secs);
    let mut printers = Vec::with_capacity(config.printers.len());
    for target in &config.printers {
        let client = PrinterClient::new(target, timeout)
            .map_err(|e| anyhow::anyhow!("Failed to build client for {}: {}", target.host, e))?;
        info!(printer = %target.host, "Configured printer");
        printers.push(client);
    }

    let collector = Arc::new(MetricCollector::new(printers));

    // Parse listen address
    let listen_addr = config
        .exporter
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let http_server = HttpServer::new(collector.clone(), listen_addr, config.exporter.path.clone());

    // Start HTTP server
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate()
                ).unwrap();
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for the server to drain
    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    // Print final stats
    let stats = collector.stats();
    info!(
        scrapes_total = stats.scrapes_total,
        printers_total = stats.printers_total,
        printers_up = stats.printers_up,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

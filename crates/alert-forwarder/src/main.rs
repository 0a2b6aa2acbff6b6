//! Alert forwarder service.
//!
//! Forwards Alertmanager webhooks to a Splunk HTTP Event Collector and raises
//! a synthetic alert when the Watchdog heartbeat goes silent.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use alert_forwarder::config::DEFAULT_CONFIG_PATH;
use alert_forwarder::sink::pool::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use alert_forwarder::{
    server, telemetry, Configuration, FileSource, HecSink, ServiceContext, ServiceOptions,
    SystemClock,
};

/// Forward Alertmanager alerts to an event collector and watch the Watchdog heartbeat
#[derive(Parser, Debug)]
#[command(name = "alert-forwarder")]
#[command(version)]
struct Cli {
    /// Absolute path to the configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8888)]
    port: u16,

    /// Seconds between configuration file checks
    #[arg(long, default_value_t = 15)]
    reload_interval: u64,

    /// Number of concurrent deliveries to the collector
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    delivery_workers: usize,

    /// Deliveries queued before webhook handling waits
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = telemetry::init(cli.log_json);

    let source = Arc::new(FileSource::new(&cli.config));
    let config = Configuration::load(source.as_ref()).with_context(|| {
        format!(
            "failure to parse configuration {}",
            source.path().display()
        )
    })?;
    log_level.apply(config.log_level);
    info!(
        config = %source.path().display(),
        collector = %config.collector.endpoint(),
        silenced = config.silenced,
        "Loaded configuration"
    );

    let sink = Arc::new(HecSink::new().context("Failed to build collector client")?);
    let service = ServiceContext::new(
        config,
        sink,
        Arc::new(SystemClock),
        ServiceOptions {
            reload_interval: Duration::from_secs(cli.reload_interval.max(1)),
            delivery_workers: cli.delivery_workers,
            queue_capacity: cli.queue_capacity,
        },
    );
    let tasks = service.spawn_periodic_tasks(source, Some(log_level));
    info!("Alert pipeline watchdog is running");

    let addr = format!("0.0.0.0:{}", cli.port);
    server::run_server(Arc::clone(&service.dispatcher), &addr, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    service.shutdown(tasks).await;
    info!("Alert forwarder stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

//! Audit log webhook server.
//!
//! This binary:
//! - Provisions the CloudWatch log group and today's log stream
//! - Starts the background delivery worker
//! - Serves `POST /` and `GET /up` until SIGINT/SIGTERM
//! - Drains queued entries to CloudWatch within a grace period before exiting

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auditlog::shutdown::shutdown_signal;
use auditlog::{
    router, AppState, CloudWatchLogs, Config, DeliveryQueue, DeliveryWorker, DrainOutcome,
    HealthFlag, LogSink, SinkClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    let log_stream = config.log_stream_name();
    info!(
        host = %config.host,
        port = config.port,
        region = %config.region,
        log_group = %config.log_group,
        log_stream = %log_stream,
        credentials_configured = config.aws_access_key_id.is_some(),
        "config_loaded"
    );

    let health = HealthFlag::new();
    let queue = DeliveryQueue::new();

    // Provision the sink; failure leaves the server up but unhealthy
    let sink_client = match CloudWatchLogs::from_config(&config) {
        Ok(sink) => {
            let sink: Arc<dyn LogSink> = Arc::new(sink);
            SinkClient::provision(sink, config.log_group.clone(), log_stream, &health).await
        }
        Err(e) => {
            warn!(error = %e, "sink_client_unavailable");
            health.mark_degraded("log sink client could not be created");
            None
        }
    };

    if sink_client.is_none() {
        warn!("continuing_without_log_sink");
    }

    let worker = DeliveryWorker::new(
        queue.clone(),
        sink_client,
        health.clone(),
        config.poll_interval,
    )
    .spawn();

    // Build the router
    let app = router(AppState::new(queue, health));

    // Bind to address
    let addr = SocketAddr::new(config.host, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Flush queued entries before exiting
    match worker.drain(config.shutdown_grace_period).await {
        DrainOutcome::Completed(stats) => info!(
            delivered = stats.delivered,
            failed = stats.failed,
            dropped = stats.dropped,
            "delivery_flushed"
        ),
        DrainOutcome::TimedOut { abandoned } => {
            warn!(abandoned = abandoned, "delivery_flush_incomplete")
        }
        DrainOutcome::Crashed => warn!("delivery_flush_failed"),
    }

    info!("web_server_shutdown_complete");

    Ok(())
}

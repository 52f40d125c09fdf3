//! Orgshare Share Ensurer
//!
//! Long-running consumer of the credential queue. For each credential
//! message it scans every region where the Well-Architected service is
//! enabled and ensures each visible workload is shared with the central
//! account. Messages are acked on success and nacked for redelivery on a
//! fatal error.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ACCOUNT_ID` | - | Central account id: share target and existing-share filter prefix (required) |
//! | `PERMISSION_TYPE` | - | Permission level granted on share creation (required) |
//! | `ORGSHARE_QUEUE_URL` | - | Credential queue URL (required) |
//! | `ORGSHARE_VISIBILITY_TIMEOUT` | `900` | SQS visibility timeout in seconds |
//! | `ORGSHARE_HEALTH_PORT` | `8081` | Health endpoint port |
//! | `LOG_FORMAT` | text | Set to `json` for JSON logs |
//! | `RUST_LOG` | `info` | Log level |

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use orgshare_core::{
    AwsParameterDirectory, AwsWorkloadServiceFactory, RegionResolver, WorkloadShareEnsurer,
};
use orgshare_queue::{sqs::SqsQueueConsumer, QueueConsumer, QueueError};

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("{} environment variable is required", key))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for local development)
    let _ = dotenvy::dotenv();

    orgshare_common::logging::init_logging("orgshare-ensurer");

    info!("Starting orgshare share ensurer");

    let central_account_id = env_required("ACCOUNT_ID")?;
    let permission_type = env_required("PERMISSION_TYPE")?;
    let queue_url = env_required("ORGSHARE_QUEUE_URL")?;
    // Default matches the 900s credential validity window
    let visibility_timeout: i32 = env_or_parse("ORGSHARE_VISIBILITY_TIMEOUT", 900);
    let health_port: u16 = env_or_parse("ORGSHARE_HEALTH_PORT", 8081);

    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let sqs_client = aws_sdk_sqs::Client::new(&config);
    let ssm_client = aws_sdk_ssm::Client::new(&config);

    let consumer = Arc::new(SqsQueueConsumer::from_queue_url(
        sqs_client,
        queue_url.clone(),
        visibility_timeout,
    ));
    info!(queue = %consumer.identifier(), "Consuming credential queue");

    let resolver = RegionResolver::new(Arc::new(AwsParameterDirectory::new(ssm_client)));
    let ensurer = Arc::new(WorkloadShareEnsurer::new(
        resolver,
        Arc::new(AwsWorkloadServiceFactory),
        central_account_id,
        permission_type,
    ));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Consumer loop
    let consumer_handle = {
        let consumer = consumer.clone();
        let ensurer = ensurer.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    polled = consumer.poll(10) => match polled {
                        Ok(messages) => {
                            for queued in messages {
                                process_message(consumer.as_ref(), ensurer.as_ref(), queued).await;
                            }
                        }
                        Err(QueueError::Stopped) => break,
                        Err(e) => {
                            error!(error = %e, "Queue poll failed");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            }
        })
    };

    // Health server
    let health_addr = SocketAddr::from(([0, 0, 0, 0], health_port));
    info!("Health server listening on http://{}/health", health_addr);

    let health_app = axum::Router::new()
        .route("/health", axum::routing::get(health_handler))
        .route("/ready", axum::routing::get(ready_handler));

    let health_listener = tokio::net::TcpListener::bind(health_addr).await?;
    let health_handle = {
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            axum::serve(health_listener, health_app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        })
    };

    info!("Orgshare share ensurer started");

    // Wait for shutdown
    shutdown_signal().await;
    info!("Shutdown signal received...");

    consumer.stop().await;
    let _ = shutdown_tx.send(());

    let _ = tokio::time::timeout(Duration::from_secs(30), async {
        let _ = consumer_handle.await;
        let _ = health_handle.await;
    })
    .await;

    if let Ok(Some(metrics)) = consumer.get_metrics().await {
        info!(
            polled = metrics.total_polled,
            acked = metrics.total_acked,
            nacked = metrics.total_nacked,
            pending = metrics.pending_messages,
            "Consumer totals at shutdown"
        );
    }

    info!("Orgshare share ensurer shutdown complete");
    Ok(())
}

async fn process_message(
    consumer: &dyn QueueConsumer,
    ensurer: &WorkloadShareEnsurer,
    queued: orgshare_common::QueuedCredentials,
) {
    let account = queued
        .payload
        .account_id()
        .unwrap_or("unknown")
        .to_string();

    match ensurer.ensure_for(&queued.payload).await {
        Ok(report) => {
            info!(
                account = %account,
                regions_visited = report.regions_visited,
                regions_skipped = report.regions_skipped,
                workloads_seen = report.workloads_seen,
                shares_created = report.shares_created,
                already_shared = report.already_shared,
                "Share ensure complete"
            );
            if let Err(e) = consumer.ack(&queued.receipt_handle).await {
                error!(account = %account, error = %e, "Failed to ack message");
            }
        }
        Err(e) => {
            error!(
                account = %account,
                error = %e,
                "Share ensure failed, message will be redelivered"
            );
            if let Err(e) = consumer.nack(&queued.receipt_handle, None).await {
                error!(account = %account, error = %e, "Failed to nack message");
            }
        }
    }
}

async fn health_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn ready_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "READY"
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

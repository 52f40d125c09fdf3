//! Orgshare Credential Sweep
//!
//! Assumes the configured role in every active account of the AWS
//! Organization and publishes the temporary credentials to the configured
//! SQS queues. One-shot: run it from a scheduler; exits non-zero on a
//! fatal error.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ROLE_NAME` | - | Role name assumed in every member account (required) |
//! | `ORGSHARE_QUEUE_URLS` | - | Comma-separated target queue URLs (required) |
//! | `ORGSHARE_SESSION_NAME` | `orgshare-assumer` | Role session name |
//! | `LOG_FORMAT` | text | Set to `json` for JSON logs |
//! | `RUST_LOG` | `info` | Log level |

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use orgshare_core::{
    AccountEnumerator, AwsCredentialBroker, AwsOrganizationDirectory, RoleAssumer,
};
use orgshare_queue::{sqs::SqsQueuePublisher, QueuePublisher};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("{} environment variable is required", key))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for local development)
    let _ = dotenvy::dotenv();

    orgshare_common::logging::init_logging("orgshare-assumer");

    info!("Starting orgshare credential sweep");

    let role_name = env_required("ROLE_NAME")?;
    let session_name = env_or("ORGSHARE_SESSION_NAME", "orgshare-assumer");
    let queue_urls: Vec<String> = env_required("ORGSHARE_QUEUE_URLS")?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if queue_urls.is_empty() {
        anyhow::bail!("ORGSHARE_QUEUE_URLS must name at least one queue");
    }

    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let org_client = aws_sdk_organizations::Client::new(&config);
    let sts_client = aws_sdk_sts::Client::new(&config);
    let sqs_client = aws_sdk_sqs::Client::new(&config);

    let publishers: Vec<Arc<dyn QueuePublisher>> = queue_urls
        .iter()
        .map(|url| {
            Arc::new(SqsQueuePublisher::new(sqs_client.clone(), url.clone()))
                as Arc<dyn QueuePublisher>
        })
        .collect();
    info!(queues = publishers.len(), role = %role_name, "Sweep configured");

    let enumerator = AccountEnumerator::new(Arc::new(AwsOrganizationDirectory::new(org_client)));
    let assumer = RoleAssumer::new(
        enumerator,
        Arc::new(AwsCredentialBroker::new(sts_client)),
        role_name,
        session_name,
    );

    let report = assumer.sweep(&publishers).await?;
    info!(
        accounts_seen = report.accounts_seen,
        assumed = report.assumed,
        skipped = report.skipped,
        messages_published = report.messages_published,
        "Credential sweep complete"
    );

    Ok(())
}

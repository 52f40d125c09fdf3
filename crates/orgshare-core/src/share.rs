//! Ensuring every visible workload is shared with the central account.

use async_trait::async_trait;
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::pages::{collect_all, paginate, Page};
use crate::regions::{RegionResolver, WELL_ARCHITECTED_SERVICE};
use orgshare_common::AssumedCredentials;

/// Regional view of the workload service under one identity.
#[async_trait]
pub trait WorkloadService: Send + Sync {
    /// One page of workload ids visible to the identity in this region.
    async fn workloads_page(&self, next_token: Option<String>) -> Result<Page<String>>;

    /// One page of share ids on a workload whose target account matches
    /// the prefix.
    async fn shares_page(
        &self,
        workload_id: &str,
        shared_with_prefix: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>>;

    /// Create a share granting `permission_type` to `shared_with`.
    async fn create_share(
        &self,
        workload_id: &str,
        shared_with: &str,
        permission_type: &str,
    ) -> Result<()>;
}

/// Builds a regional [`WorkloadService`] authenticated with assumed
/// credentials.
pub trait WorkloadServiceFactory: Send + Sync {
    fn for_region(&self, credentials: &AssumedCredentials, region: &str)
        -> Arc<dyn WorkloadService>;
}

/// Outcome summary of one ensure pass over a credential message.
#[derive(Debug, Clone, Default)]
pub struct EnsureReport {
    pub regions_visited: usize,
    /// Regions skipped because the workload listing failed (service not
    /// enabled, expired credentials, ...)
    pub regions_skipped: usize,
    pub workloads_seen: usize,
    pub shares_created: usize,
    pub already_shared: usize,
}

/// Iterates every enabled region for the Well-Architected service and
/// ensures each visible workload carries a share with the central
/// account.
///
/// A workload-listing failure skips that region; share listing/creation
/// failures abort the pass so queue redelivery applies.
pub struct WorkloadShareEnsurer {
    resolver: RegionResolver,
    factory: Arc<dyn WorkloadServiceFactory>,
    central_account_id: String,
    permission_type: String,
}

impl WorkloadShareEnsurer {
    pub fn new(
        resolver: RegionResolver,
        factory: Arc<dyn WorkloadServiceFactory>,
        central_account_id: String,
        permission_type: String,
    ) -> Self {
        Self {
            resolver,
            factory,
            central_account_id,
            permission_type,
        }
    }

    pub async fn ensure_for(&self, credentials: &AssumedCredentials) -> Result<EnsureReport> {
        let account = credentials.account_id().ok_or_else(|| {
            CoreError::Credentials("assumed-role ARN carries no account id".to_string())
        })?;
        info!(account = %account, "Ensuring workload shares");

        let regions = self.resolver.regions_for(WELL_ARCHITECTED_SERVICE).await?;

        let mut report = EnsureReport::default();
        for region in &regions {
            debug!(region = %region, "Scanning region");
            let service = self.factory.for_region(credentials, region);

            let workloads = match collect_all(|token| service.workloads_page(token)).await {
                Ok(workloads) => workloads,
                Err(e) if e.is_recoverable() => {
                    warn!(
                        region = %region,
                        error = %e,
                        "Workload listing failed, skipping region"
                    );
                    report.regions_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            report.regions_visited += 1;

            for workload_id in workloads {
                report.workloads_seen += 1;
                if self.has_existing_share(service.as_ref(), &workload_id).await? {
                    debug!(workload = %workload_id, "Workload already shared");
                    report.already_shared += 1;
                } else {
                    info!(workload = %workload_id, region = %region, "Sharing workload");
                    service
                        .create_share(
                            &workload_id,
                            &self.central_account_id,
                            &self.permission_type,
                        )
                        .await?;
                    report.shares_created += 1;
                }
            }
        }

        Ok(report)
    }

    // Check-then-create is not atomic: two concurrent invocations for the
    // same workload can both observe zero shares and create duplicates.
    async fn has_existing_share(
        &self,
        service: &dyn WorkloadService,
        workload_id: &str,
    ) -> Result<bool> {
        let pages = paginate(|token| {
            service.shares_page(workload_id, &self.central_account_id, token)
        });
        futures::pin_mut!(pages);
        while let Some(shares) = pages.try_next().await? {
            if !shares.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// AWS Well-Architected implementation of the regional service factory.
pub struct AwsWorkloadServiceFactory;

impl WorkloadServiceFactory for AwsWorkloadServiceFactory {
    fn for_region(
        &self,
        credentials: &AssumedCredentials,
        region: &str,
    ) -> Arc<dyn WorkloadService> {
        let session = &credentials.credentials;
        let expires_after = session
            .expiration
            .timestamp()
            .try_into()
            .ok()
            .map(|secs: u64| std::time::UNIX_EPOCH + std::time::Duration::from_secs(secs));

        let provider = aws_credential_types::Credentials::new(
            session.access_key_id.clone(),
            session.secret_access_key.clone(),
            Some(session.session_token.clone()),
            expires_after,
            "orgshare-assumed-role",
        );

        let config = aws_sdk_wellarchitected::Config::builder()
            .behavior_version(aws_sdk_wellarchitected::config::BehaviorVersion::latest())
            .region(aws_sdk_wellarchitected::config::Region::new(region.to_string()))
            .credentials_provider(provider)
            .build();

        Arc::new(AwsWorkloadService {
            client: aws_sdk_wellarchitected::Client::from_conf(config),
            region: region.to_string(),
        })
    }
}

struct AwsWorkloadService {
    client: aws_sdk_wellarchitected::Client,
    region: String,
}

#[async_trait]
impl WorkloadService for AwsWorkloadService {
    async fn workloads_page(&self, next_token: Option<String>) -> Result<Page<String>> {
        let out = self
            .client
            .list_workloads()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| CoreError::ListWorkloads {
                region: self.region.clone(),
                message: e.to_string(),
            })?;

        let ids = out
            .workload_summaries()
            .iter()
            .filter_map(|w| w.workload_id().map(str::to_string))
            .collect();

        Ok(Page::new(ids, out.next_token().map(str::to_string)))
    }

    async fn shares_page(
        &self,
        workload_id: &str,
        shared_with_prefix: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>> {
        let out = self
            .client
            .list_workload_shares()
            .workload_id(workload_id)
            .shared_with_prefix(shared_with_prefix)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| CoreError::Share(e.to_string()))?;

        let ids = out
            .workload_share_summaries()
            .iter()
            .filter_map(|s| s.share_id().map(str::to_string))
            .collect();

        Ok(Page::new(ids, out.next_token().map(str::to_string)))
    }

    async fn create_share(
        &self,
        workload_id: &str,
        shared_with: &str,
        permission_type: &str,
    ) -> Result<()> {
        self.client
            .create_workload_share()
            .workload_id(workload_id)
            .shared_with(shared_with)
            .permission_type(aws_sdk_wellarchitected::types::PermissionType::from(
                permission_type,
            ))
            .client_request_token(uuid::Uuid::new_v4().to_string())
            .send()
            .await
            .map_err(|e| CoreError::Share(e.to_string()))?;
        Ok(())
    }
}

//! Resolution of the regions where a service is enabled, via the SSM
//! public parameter catalog.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::pages::{collect_all, Page};

/// Service name of the Well-Architected Tool in the region catalog.
pub const WELL_ARCHITECTED_SERVICE: &str = "wellarchitectedtool";

/// Catalog path listing the regions a service is enabled in.
pub fn service_regions_path(service: &str) -> String {
    format!("/aws/service/global-infrastructure/services/{service}/regions")
}

/// Paginated parameter lookup under a path.
#[async_trait]
pub trait ParameterDirectory: Send + Sync {
    /// One page of parameter values under `path`.
    async fn parameters_page(
        &self,
        path: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>>;
}

/// Resolves the ordered region list for a named service. Fetched per
/// invocation, never cached. Lookup failures are fatal.
pub struct RegionResolver {
    parameters: Arc<dyn ParameterDirectory>,
}

impl RegionResolver {
    pub fn new(parameters: Arc<dyn ParameterDirectory>) -> Self {
        Self { parameters }
    }

    pub async fn regions_for(&self, service: &str) -> Result<Vec<String>> {
        let path = service_regions_path(service);
        let regions =
            collect_all(|token| self.parameters.parameters_page(&path, token)).await?;
        debug!(service = %service, count = regions.len(), "Resolved enabled regions");
        Ok(regions)
    }
}

/// AWS SSM Parameter Store implementation.
pub struct AwsParameterDirectory {
    client: aws_sdk_ssm::Client,
}

impl AwsParameterDirectory {
    pub fn new(client: aws_sdk_ssm::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ParameterDirectory for AwsParameterDirectory {
    async fn parameters_page(
        &self,
        path: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>> {
        let out = self
            .client
            .get_parameters_by_path()
            .path(path)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| CoreError::ResolveRegions(e.to_string()))?;

        let values = out
            .parameters()
            .iter()
            .filter_map(|p| p.value().map(str::to_string))
            .collect();

        Ok(Page::new(values, out.next_token().map(str::to_string)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeParameterDirectory {
        expected_path: String,
        pages: Vec<Vec<String>>,
    }

    #[async_trait]
    impl ParameterDirectory for FakeParameterDirectory {
        async fn parameters_page(
            &self,
            path: &str,
            next_token: Option<String>,
        ) -> Result<Page<String>> {
            assert_eq!(path, self.expected_path);
            let idx: usize = next_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            let next = if idx + 1 < self.pages.len() {
                Some((idx + 1).to_string())
            } else {
                None
            };
            Ok(Page::new(self.pages[idx].clone(), next))
        }
    }

    #[test]
    fn test_regions_path_template() {
        assert_eq!(
            service_regions_path("wellarchitectedtool"),
            "/aws/service/global-infrastructure/services/wellarchitectedtool/regions"
        );
    }

    #[tokio::test]
    async fn test_regions_span_pages_in_order() {
        let directory = FakeParameterDirectory {
            expected_path: service_regions_path(WELL_ARCHITECTED_SERVICE),
            pages: vec![
                vec!["us-east-1".to_string(), "us-west-2".to_string()],
                vec!["eu-west-1".to_string()],
            ],
        };

        let regions = RegionResolver::new(Arc::new(directory))
            .regions_for(WELL_ARCHITECTED_SERVICE)
            .await
            .unwrap();
        assert_eq!(regions, vec!["us-east-1", "us-west-2", "eu-west-1"]);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        struct FailingDirectory;

        #[async_trait]
        impl ParameterDirectory for FailingDirectory {
            async fn parameters_page(
                &self,
                _path: &str,
                _next_token: Option<String>,
            ) -> Result<Page<String>> {
                Err(CoreError::ResolveRegions("throttled".to_string()))
            }
        }

        let result = RegionResolver::new(Arc::new(FailingDirectory))
            .regions_for(WELL_ARCHITECTED_SERVICE)
            .await;
        assert!(matches!(result, Err(CoreError::ResolveRegions(_))));
    }
}

//! Cross-account role assumption and credential fan-out.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::accounts::AccountEnumerator;
use crate::error::{CoreError, Result};
use orgshare_common::{AssumedCredentials, AssumedRoleUser, SessionCredentials};
use orgshare_queue::QueuePublisher;

/// Fixed session duration. Credentials are useless after this window;
/// there is no refresh path.
pub const SESSION_DURATION_SECONDS: i32 = 900;

/// Obtains temporary credentials for a role in a target account.
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_seconds: i32,
    ) -> Result<AssumedCredentials>;
}

/// Outcome summary of one credential sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Active accounts enumerated
    pub accounts_seen: usize,
    /// Accounts whose role was assumed and credentials fully published
    pub assumed: usize,
    /// Accounts skipped on a recoverable failure
    pub skipped: usize,
    /// Messages published across all queues
    pub messages_published: usize,
}

/// Assumes the configured role in every active member account and
/// publishes the credentials to every configured queue.
///
/// Failure is isolated per account: an account whose role cannot be
/// assumed (or whose publish fails) is logged and skipped, never fatal to
/// the sweep. Account enumeration failures propagate.
pub struct RoleAssumer {
    enumerator: AccountEnumerator,
    broker: Arc<dyn CredentialBroker>,
    role_name: String,
    session_name: String,
}

impl RoleAssumer {
    pub fn new(
        enumerator: AccountEnumerator,
        broker: Arc<dyn CredentialBroker>,
        role_name: String,
        session_name: String,
    ) -> Self {
        Self {
            enumerator,
            broker,
            role_name,
            session_name,
        }
    }

    fn role_arn(&self, account: &str) -> String {
        format!("arn:aws:iam::{}:role/{}", account, self.role_name)
    }

    pub async fn sweep(&self, queues: &[Arc<dyn QueuePublisher>]) -> Result<SweepReport> {
        let accounts = self.enumerator.active_account_ids().await?;

        let mut report = SweepReport {
            accounts_seen: accounts.len(),
            ..Default::default()
        };

        for account in &accounts {
            info!(account = %account, "Assuming role");
            match self.assume_and_publish(account, queues).await {
                Ok(published) => {
                    report.assumed += 1;
                    report.messages_published += published;
                }
                Err(e) if e.is_recoverable() => {
                    warn!(account = %account, error = %e, "Skipping account");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    async fn assume_and_publish(
        &self,
        account: &str,
        queues: &[Arc<dyn QueuePublisher>],
    ) -> Result<usize> {
        let credentials = self
            .broker
            .assume_role(
                &self.role_arn(account),
                &self.session_name,
                SESSION_DURATION_SECONDS,
            )
            .await?;

        let mut published = 0;
        for queue in queues {
            queue.publish(&credentials).await?;
            published += 1;
            info!(
                account = %account,
                queue = %queue.identifier(),
                "Published credentials"
            );
        }
        Ok(published)
    }
}

fn account_from_role_arn(role_arn: &str) -> String {
    role_arn.split(':').nth(4).unwrap_or(role_arn).to_string()
}

/// AWS STS implementation of the broker.
pub struct AwsCredentialBroker {
    client: aws_sdk_sts::Client,
}

impl AwsCredentialBroker {
    pub fn new(client: aws_sdk_sts::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialBroker for AwsCredentialBroker {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_seconds: i32,
    ) -> Result<AssumedCredentials> {
        use aws_sdk_sts::error::ProvideErrorMetadata;

        let account = account_from_role_arn(role_arn);

        let out = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .duration_seconds(duration_seconds)
            .send()
            .await
            .map_err(|e| {
                let code = e
                    .as_service_error()
                    .and_then(|se| se.code())
                    .unwrap_or("Unknown")
                    .to_string();
                CoreError::AssumeRole {
                    account: account.clone(),
                    code,
                }
            })?;

        let creds = out.credentials().ok_or_else(|| CoreError::AssumeRole {
            account: account.clone(),
            code: "MissingCredentials".to_string(),
        })?;
        let user = out.assumed_role_user().ok_or_else(|| CoreError::AssumeRole {
            account: account.clone(),
            code: "MissingAssumedRoleUser".to_string(),
        })?;

        let exp = creds.expiration();
        let expiration = chrono::DateTime::from_timestamp(exp.secs(), exp.subsec_nanos())
            .ok_or_else(|| CoreError::AssumeRole {
                account,
                code: "InvalidExpiration".to_string(),
            })?;

        Ok(AssumedCredentials {
            credentials: SessionCredentials {
                access_key_id: creds.access_key_id().to_string(),
                secret_access_key: creds.secret_access_key().to_string(),
                session_token: creds.session_token().to_string(),
                expiration,
            },
            assumed_role_user: AssumedRoleUser {
                assumed_role_id: user.assumed_role_id().to_string(),
                arn: user.arn().to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{Account, AccountStatus, OrganizationDirectory};
    use crate::pages::Page;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FakeDirectory {
        accounts: Vec<Account>,
    }

    #[async_trait]
    impl OrganizationDirectory for FakeDirectory {
        async fn accounts_page(&self, _next_token: Option<String>) -> Result<Page<Account>> {
            Ok(Page::last(self.accounts.clone()))
        }
    }

    struct FakeBroker {
        failing_accounts: HashSet<String>,
    }

    #[async_trait]
    impl CredentialBroker for FakeBroker {
        async fn assume_role(
            &self,
            role_arn: &str,
            session_name: &str,
            duration_seconds: i32,
        ) -> Result<AssumedCredentials> {
            assert_eq!(duration_seconds, SESSION_DURATION_SECONDS);
            let account = account_from_role_arn(role_arn);
            if self.failing_accounts.contains(&account) {
                return Err(CoreError::AssumeRole {
                    account,
                    code: "AccessDenied".to_string(),
                });
            }
            Ok(AssumedCredentials {
                credentials: SessionCredentials {
                    access_key_id: format!("ASIA{account}"),
                    secret_access_key: "secret".to_string(),
                    session_token: "token".to_string(),
                    expiration: chrono::Utc::now() + chrono::Duration::seconds(900),
                },
                assumed_role_user: AssumedRoleUser {
                    assumed_role_id: format!("AROA:{session_name}"),
                    arn: format!("arn:aws:sts::{account}:assumed-role/OrgShareRole/{session_name}"),
                },
            })
        }
    }

    struct CollectingPublisher {
        name: String,
        messages: Mutex<Vec<AssumedCredentials>>,
    }

    impl CollectingPublisher {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                messages: Mutex::new(Vec::new()),
            })
        }

        fn message_count(&self) -> usize {
            self.messages.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl QueuePublisher for CollectingPublisher {
        fn identifier(&self) -> &str {
            &self.name
        }

        async fn publish(
            &self,
            payload: &AssumedCredentials,
        ) -> orgshare_queue::Result<String> {
            self.messages.lock().unwrap().push(payload.clone());
            Ok("message-id".to_string())
        }
    }

    fn assumer(accounts: &[&str], failing: &[&str]) -> RoleAssumer {
        let directory = FakeDirectory {
            accounts: accounts
                .iter()
                .map(|id| Account {
                    id: id.to_string(),
                    status: AccountStatus::Active,
                })
                .collect(),
        };
        let broker = FakeBroker {
            failing_accounts: failing.iter().map(|s| s.to_string()).collect(),
        };
        RoleAssumer::new(
            AccountEnumerator::new(Arc::new(directory)),
            Arc::new(broker),
            "OrgShareRole".to_string(),
            "orgshare-assumer".to_string(),
        )
    }

    #[tokio::test]
    async fn test_fan_out_is_accounts_times_queues() {
        let assumer = assumer(&["111111111111", "333333333333"], &[]);
        let q1 = CollectingPublisher::new("q1");
        let q2 = CollectingPublisher::new("q2");
        let queues: Vec<Arc<dyn QueuePublisher>> = vec![q1.clone(), q2.clone()];

        let report = assumer.sweep(&queues).await.unwrap();

        assert_eq!(report.accounts_seen, 2);
        assert_eq!(report.assumed, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.messages_published, 4);
        assert_eq!(q1.message_count(), 2);
        assert_eq!(q2.message_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_account_publishes_nothing() {
        let assumer = assumer(&["111111111111", "333333333333"], &["111111111111"]);
        let q1 = CollectingPublisher::new("q1");
        let queues: Vec<Arc<dyn QueuePublisher>> = vec![q1.clone()];

        let report = assumer.sweep(&queues).await.unwrap();

        assert_eq!(report.assumed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.messages_published, 1);

        let messages = q1.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].account_id(), Some("333333333333"));
    }

    #[tokio::test]
    async fn test_all_accounts_failing_is_not_fatal() {
        let assumer = assumer(&["111111111111"], &["111111111111"]);
        let q1 = CollectingPublisher::new("q1");
        let queues: Vec<Arc<dyn QueuePublisher>> = vec![q1.clone()];

        let report = assumer.sweep(&queues).await.unwrap();
        assert_eq!(report.assumed, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(q1.message_count(), 0);
    }

    #[test]
    fn test_role_arn_format() {
        let assumer = assumer(&[], &[]);
        assert_eq!(
            assumer.role_arn("123456789012"),
            "arn:aws:iam::123456789012:role/OrgShareRole"
        );
    }
}

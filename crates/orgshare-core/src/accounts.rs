//! Enumeration of active member accounts in the Organization.

use async_trait::async_trait;
use futures::TryStreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::pages::{paginate, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Suspended,
    PendingClosure,
}

/// A member account as reported by the organization directory.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub status: AccountStatus,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Read-only view of the organization's account directory.
#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    async fn accounts_page(&self, next_token: Option<String>) -> Result<Page<Account>>;
}

/// Lists the ids of all active accounts across the full paginated
/// directory listing. Directory failures are fatal.
pub struct AccountEnumerator {
    directory: Arc<dyn OrganizationDirectory>,
}

impl AccountEnumerator {
    pub fn new(directory: Arc<dyn OrganizationDirectory>) -> Self {
        Self { directory }
    }

    /// Active account ids in listing order, deduplicated across pages.
    pub async fn active_account_ids(&self) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();

        let pages = paginate(|token| self.directory.accounts_page(token));
        futures::pin_mut!(pages);
        while let Some(accounts) = pages.try_next().await? {
            for account in accounts {
                if account.is_active() && seen.insert(account.id.clone()) {
                    ids.push(account.id);
                }
            }
        }

        debug!(count = ids.len(), "Enumerated active accounts");
        Ok(ids)
    }
}

/// AWS Organizations implementation of the directory.
pub struct AwsOrganizationDirectory {
    client: aws_sdk_organizations::Client,
}

impl AwsOrganizationDirectory {
    pub fn new(client: aws_sdk_organizations::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrganizationDirectory for AwsOrganizationDirectory {
    async fn accounts_page(&self, next_token: Option<String>) -> Result<Page<Account>> {
        use aws_sdk_organizations::types::AccountStatus as SdkAccountStatus;

        let out = self
            .client
            .list_accounts()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| CoreError::ListAccounts(e.to_string()))?;

        let accounts = out
            .accounts()
            .iter()
            .filter_map(|a| {
                let id = a.id()?.to_string();
                let status = match a.status() {
                    Some(SdkAccountStatus::Active) => AccountStatus::Active,
                    Some(SdkAccountStatus::Suspended) => AccountStatus::Suspended,
                    _ => AccountStatus::PendingClosure,
                };
                Some(Account { id, status })
            })
            .collect();

        Ok(Page::new(accounts, out.next_token().map(str::to_string)))
    }
}

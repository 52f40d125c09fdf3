//! Core operations for sharing Well-Architected workloads across an AWS
//! Organization.
//!
//! Four operations, each behind a trait seam so remote services can be
//! substituted in tests:
//!
//! - [`AccountEnumerator`] lists active member accounts.
//! - [`RoleAssumer`] assumes a fixed role in each account and fans the
//!   temporary credentials out to the configured queues.
//! - [`RegionResolver`] looks up the regions where a service is enabled.
//! - [`WorkloadShareEnsurer`] consumes credential messages and ensures
//!   every visible workload is shared with the central account.

pub mod accounts;
pub mod assume;
pub mod error;
pub mod pages;
pub mod regions;
pub mod share;

pub use accounts::{
    Account, AccountEnumerator, AccountStatus, AwsOrganizationDirectory, OrganizationDirectory,
};
pub use assume::{
    AwsCredentialBroker, CredentialBroker, RoleAssumer, SweepReport, SESSION_DURATION_SECONDS,
};
pub use error::{CoreError, Result, Severity};
pub use pages::{collect_all, paginate, Page};
pub use regions::{
    AwsParameterDirectory, ParameterDirectory, RegionResolver, WELL_ARCHITECTED_SERVICE,
};
pub use share::{
    AwsWorkloadServiceFactory, EnsureReport, WorkloadService, WorkloadServiceFactory,
    WorkloadShareEnsurer,
};

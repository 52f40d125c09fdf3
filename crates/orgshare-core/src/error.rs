use thiserror::Error;

/// Whether a failure aborts the invocation or only the unit of work it
/// occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Skip the affected unit (account, region) and continue.
    Recoverable,
    /// Abort the remainder of the invocation.
    Fatal,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Organizations listing error: {0}")]
    ListAccounts(String),

    #[error("AssumeRole failed for account {account}: {code}")]
    AssumeRole { account: String, code: String },

    #[error("Region lookup error: {0}")]
    ResolveRegions(String),

    #[error("Workload listing error in {region}: {message}")]
    ListWorkloads { region: String, message: String },

    #[error("Workload share error: {0}")]
    Share(String),

    #[error("Queue error: {0}")]
    Queue(#[from] orgshare_queue::QueueError),

    #[error("Invalid credential payload: {0}")]
    Credentials(String),
}

impl CoreError {
    /// Severity taxonomy: a failed role assumption skips that account, a
    /// failed workload listing skips that region, a failed queue publish
    /// skips that account. Everything else aborts the invocation.
    pub fn severity(&self) -> Severity {
        match self {
            CoreError::AssumeRole { .. }
            | CoreError::ListWorkloads { .. }
            | CoreError::Queue(_) => Severity::Recoverable,
            CoreError::ListAccounts(_)
            | CoreError::ResolveRegions(_)
            | CoreError::Share(_)
            | CoreError::Credentials(_) => Severity::Fatal,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.severity() == Severity::Recoverable
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_unit_failures_are_recoverable() {
        let err = CoreError::AssumeRole {
            account: "111111111111".to_string(),
            code: "AccessDenied".to_string(),
        };
        assert!(err.is_recoverable());

        let err = CoreError::ListWorkloads {
            region: "eu-west-1".to_string(),
            message: "not enabled".to_string(),
        };
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_invocation_failures_are_fatal() {
        assert_eq!(
            CoreError::ListAccounts("boom".to_string()).severity(),
            Severity::Fatal
        );
        assert_eq!(
            CoreError::ResolveRegions("boom".to_string()).severity(),
            Severity::Fatal
        );
        assert_eq!(
            CoreError::Share("boom".to_string()).severity(),
            Severity::Fatal
        );
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod logging;

// ============================================================================
// Credential Message Types
// ============================================================================

/// The credential payload that flows through the queue, one per assumed
/// account.
///
/// Field names are PascalCase so the JSON body is wire-compatible with the
/// STS AssumeRole response document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssumedCredentials {
    pub credentials: SessionCredentials,
    pub assumed_role_user: AssumedRoleUser,
}

/// Short-lived session credentials for one member account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

/// Identity descriptor of the assumed role, as returned by STS.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssumedRoleUser {
    pub assumed_role_id: String,
    pub arn: String,
}

impl AssumedCredentials {
    /// Account id of the member account these credentials belong to,
    /// extracted from the assumed-role ARN
    /// (`arn:aws:sts::123456789012:assumed-role/...`).
    pub fn account_id(&self) -> Option<&str> {
        self.assumed_role_user
            .arn
            .split(':')
            .nth(4)
            .filter(|s| !s.is_empty())
    }

    /// Whether the session has already expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.credentials.expiration <= now
    }
}

/// A credential message received from a queue, with delivery metadata
/// needed to ack or nack it.
#[derive(Debug, Clone)]
pub struct QueuedCredentials {
    pub payload: AssumedCredentials,
    pub receipt_handle: String,
    pub broker_message_id: Option<String>,
    pub queue_identifier: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AssumedCredentials {
        AssumedCredentials {
            credentials: SessionCredentials {
                access_key_id: "ASIAEXAMPLE".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: "token".to_string(),
                expiration: "2026-01-01T00:15:00Z".parse().unwrap(),
            },
            assumed_role_user: AssumedRoleUser {
                assumed_role_id: "AROAEXAMPLE:orgshare-assumer".to_string(),
                arn: "arn:aws:sts::123456789012:assumed-role/OrgShareRole/orgshare-assumer"
                    .to_string(),
            },
        }
    }

    #[test]
    fn test_account_id_from_arn() {
        assert_eq!(sample().account_id(), Some("123456789012"));
    }

    #[test]
    fn test_account_id_missing_on_malformed_arn() {
        let mut creds = sample();
        creds.assumed_role_user.arn = "not-an-arn".to_string();
        assert_eq!(creds.account_id(), None);
    }

    #[test]
    fn test_wire_format_matches_sts_response() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("Credentials").is_some());
        assert_eq!(json["Credentials"]["AccessKeyId"], "ASIAEXAMPLE");
        assert_eq!(
            json["AssumedRoleUser"]["Arn"],
            "arn:aws:sts::123456789012:assumed-role/OrgShareRole/orgshare-assumer"
        );

        let back: AssumedCredentials = serde_json::from_value(json).unwrap();
        assert_eq!(back.credentials.session_token, "token");
    }

    #[test]
    fn test_expiration_check() {
        let creds = sample();
        assert!(!creds.is_expired("2026-01-01T00:00:00Z".parse().unwrap()));
        assert!(creds.is_expired("2026-01-01T00:15:00Z".parse().unwrap()));
    }
}

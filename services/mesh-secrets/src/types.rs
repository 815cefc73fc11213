//! Types for the data domain secret bundle

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// References a data domain publishes for the central governance account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct DomainReferences {
    /// Bucket holding the domain's data products
    pub bucket_name: String,
    /// Key prefix of the data products inside the bucket
    pub prefix: String,
    /// KMS key id (or alias) encrypting the bucket
    pub kms_key_id: String,
}

impl DomainReferences {
    pub fn new(
        bucket_name: impl Into<String>,
        prefix: impl Into<String>,
        kms_key_id: impl Into<String>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            prefix: prefix.into(),
            kms_key_id: kms_key_id.into(),
        }
    }

    /// Parse the JSON secret string of a domain secret.
    pub fn from_secret_string(arn: &str, payload: &str) -> Result<Self, SecretError> {
        serde_json::from_str(payload).map_err(|e| SecretError::MalformedPayload {
            arn: arn.to_string(),
            reason: e.to_string(),
        })
    }
}

/// A complete Secrets Manager secret ARN.
///
/// `arn:<partition>:secretsmanager:<region>:<account>:secret:<name>-<suffix>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretArn(String);

impl SecretArn {
    pub fn parse(arn: &str) -> Result<Self, SecretError> {
        let parts: Vec<&str> = arn.splitn(7, ':').collect();
        let valid = parts.len() == 7
            && parts[0] == "arn"
            && !parts[1].is_empty()
            && parts[2] == "secretsmanager"
            && !parts[3].is_empty()
            && !parts[4].is_empty()
            && parts[5] == "secret"
            && !parts[6].is_empty();

        if !valid {
            return Err(SecretError::InvalidArn(arn.to_string()));
        }
        Ok(Self(arn.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Account owning the secret.
    pub fn account(&self) -> &str {
        self.0.split(':').nth(4).unwrap_or_default()
    }
}

impl std::fmt::Display for SecretArn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur while resolving a domain secret
#[derive(Debug, Error)]
pub enum SecretError {
    /// Not a complete Secrets Manager ARN
    #[error("Invalid secret ARN: {0}")]
    InvalidArn(String),

    /// No bundle is known for this ARN
    #[error("Secret not found: {0}")]
    NotFound(String),

    /// Secret string is not a valid reference bundle
    #[error("Malformed secret payload for {arn}: {reason}")]
    MalformedPayload { arn: String, reason: String },

    /// The AWS CLI could not be run or returned an error
    #[error("Secret fetch failed for {arn}: {reason}")]
    CommandFailed { arn: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARN: &str = "arn:aws:secretsmanager:us-east-1:111111111111:secret:domain-config-AbCdEf";

    #[test]
    fn test_parse_complete_arn() {
        let arn = SecretArn::parse(ARN).unwrap();
        assert_eq!(arn.as_str(), ARN);
        assert_eq!(arn.account(), "111111111111");
    }

    #[test]
    fn test_reject_partial_arn() {
        assert!(matches!(
            SecretArn::parse("domain-config"),
            Err(SecretError::InvalidArn(_))
        ));
        assert!(SecretArn::parse("arn:aws:s3:::bucket").is_err());
        assert!(SecretArn::parse("arn:aws:secretsmanager:us-east-1:111111111111:secret:").is_err());
    }

    #[test]
    fn test_payload_parsing() {
        let payload = serde_json::json!({
            "BucketName": "clean-1-us-east-1",
            "Prefix": "data-products",
            "KmsKeyId": "alias/key1"
        })
        .to_string();
        let refs = DomainReferences::from_secret_string(ARN, &payload).unwrap();
        assert_eq!(
            refs,
            DomainReferences::new("clean-1-us-east-1", "data-products", "alias/key1")
        );
    }

    #[test]
    fn test_payload_missing_field() {
        let err = DomainReferences::from_secret_string(
            ARN,
            r#"{"BucketName":"clean-1-us-east-1","Prefix":"data-products"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SecretError::MalformedPayload { .. }));
        assert!(err.to_string().contains("KmsKeyId"));
    }
}

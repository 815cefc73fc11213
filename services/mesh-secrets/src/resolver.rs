//! Secret resolution strategies

use std::collections::HashMap;
use tracing::debug;

use crate::types::{DomainReferences, SecretArn, SecretError};

/// Resolves the reference bundle behind a domain secret ARN.
pub trait SecretResolver: Send + Sync {
    fn resolve(&self, secret_arn: &str) -> Result<DomainReferences, SecretError>;
}

/// Bundles known before synthesis, keyed by secret ARN.
///
/// Payloads are kept as raw secret strings so a malformed bundle fails at
/// resolution, the same way a live secret would.
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    payloads: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw JSON secret string
    pub fn with_payload(mut self, arn: impl Into<String>, payload: impl Into<String>) -> Self {
        self.insert_payload(arn, payload);
        self
    }

    /// Add an already structured bundle
    pub fn with_references(mut self, arn: impl Into<String>, refs: &DomainReferences) -> Self {
        self.insert_references(arn, refs);
        self
    }

    pub fn insert_payload(&mut self, arn: impl Into<String>, payload: impl Into<String>) {
        self.payloads.insert(arn.into(), payload.into());
    }

    pub fn insert_references(&mut self, arn: impl Into<String>, refs: &DomainReferences) {
        // Serializing a struct of three strings cannot fail
        let payload = serde_json::to_string(refs).unwrap_or_default();
        self.payloads.insert(arn.into(), payload);
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

impl SecretResolver for StaticSecrets {
    fn resolve(&self, secret_arn: &str) -> Result<DomainReferences, SecretError> {
        let arn = SecretArn::parse(secret_arn)?;
        let payload = self
            .payloads
            .get(arn.as_str())
            .ok_or_else(|| SecretError::NotFound(arn.to_string()))?;

        debug!(arn = %arn, "Resolved domain secret from static bundle");
        DomainReferences::from_secret_string(arn.as_str(), payload)
    }
}

/// Emits CloudFormation dynamic references instead of plaintext values.
///
/// The deployment engine substitutes the secret fields when it creates the
/// stack, so nothing is read at synthesis time. Only the ARN is checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicReferences;

impl DynamicReferences {
    pub fn reference(arn: &SecretArn, field: &str) -> String {
        format!("{{{{resolve:secretsmanager:{}:SecretString:{}::}}}}", arn, field)
    }
}

impl SecretResolver for DynamicReferences {
    fn resolve(&self, secret_arn: &str) -> Result<DomainReferences, SecretError> {
        let arn = SecretArn::parse(secret_arn)?;
        Ok(DomainReferences::new(
            Self::reference(&arn, "BucketName"),
            Self::reference(&arn, "Prefix"),
            Self::reference(&arn, "KmsKeyId"),
        ))
    }
}

//! AWS CLI secret prefetch
//!
//! Reads domain secrets with `aws secretsmanager get-secret-value` using the
//! caller's ambient credentials (profile, SSO or instance role). Synthesis is
//! synchronous, so bundles are fetched up front and served from memory.

use tokio::process::Command;
use tracing::{debug, info};

use crate::resolver::{SecretResolver, StaticSecrets};
use crate::types::{DomainReferences, SecretArn, SecretError};

/// Secrets fetched through the AWS CLI before synthesis.
#[derive(Debug, Clone, Default)]
pub struct AwsCliSecrets {
    cache: StaticSecrets,
}

impl AwsCliSecrets {
    /// Fetch every ARN. The first failure aborts the prefetch.
    pub async fn prefetch<I, S>(arns: I) -> Result<Self, SecretError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cache = StaticSecrets::new();

        for arn in arns {
            let arn = SecretArn::parse(arn.as_ref())?;
            let payload = fetch_secret_string(&arn).await?;
            // Validate now so a bad bundle is reported against the fetch
            DomainReferences::from_secret_string(arn.as_str(), &payload)?;
            cache.insert_payload(arn.as_str(), payload);
        }

        info!(count = cache.len(), "Prefetched domain secrets");
        Ok(Self { cache })
    }
}

impl SecretResolver for AwsCliSecrets {
    fn resolve(&self, secret_arn: &str) -> Result<DomainReferences, SecretError> {
        self.cache.resolve(secret_arn)
    }
}

/// Region embedded in the ARN; the secret may live outside the default region.
fn region_of(arn: &SecretArn) -> &str {
    arn.as_str().split(':').nth(3).unwrap_or_default()
}

async fn fetch_secret_string(arn: &SecretArn) -> Result<String, SecretError> {
    debug!(arn = %arn, "Fetching secret with aws CLI");

    let output = Command::new("aws")
        .args([
            "secretsmanager",
            "get-secret-value",
            "--secret-id",
            arn.as_str(),
            "--region",
            region_of(arn),
            "--query",
            "SecretString",
            "--output",
            "text",
        ])
        .output()
        .await
        .map_err(|e| SecretError::CommandFailed {
            arn: arn.to_string(),
            reason: format!("Failed to run aws CLI: {}", e),
        })?;

    if !output.status.success() {
        return Err(SecretError::CommandFailed {
            arn: arn.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    String::from_utf8(output.stdout)
        .map(|s| s.trim().to_string())
        .map_err(|_| SecretError::MalformedPayload {
            arn: arn.to_string(),
            reason: "Secret is not valid UTF-8".to_string(),
        })
}

//! Synthesis configuration
//!
//! A JSON file describing the governance account and its data domains:
//!
//! ```json
//! {
//!   "description": "Data mesh central governance",
//!   "lf_tags": [{ "key": "tag1", "values": ["LfTagValue1", "LfTagValue2"] }],
//!   "domains": [{
//!     "id": "Domain1",
//!     "account_id": "111111111111",
//!     "name": "Sales",
//!     "secret_arn": "arn:aws:secretsmanager:us-east-1:111111111111:secret:domain-config-AbCdEf"
//!   }],
//!   "secrets": {
//!     "arn:aws:secretsmanager:us-east-1:111111111111:secret:domain-config-AbCdEf": {
//!       "BucketName": "clean-111111111111-us-east-1",
//!       "Prefix": "data-products",
//!       "KmsKeyId": "alias/key1"
//!     }
//!   }
//! }
//! ```

use mesh_secrets::{
    AwsCliSecrets, DomainReferences, DynamicReferences, SecretResolver, StaticSecrets,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::GovernanceError;
use crate::governance::{CentralGovernance, CentralGovernanceProps, DataDomain, LfTag};
use crate::template::Template;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Where data domain references come from at synthesis time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecretSource {
    /// The `secrets` section of the config file
    #[default]
    Static,
    /// CloudFormation dynamic references, resolved at deploy time
    Dynamic,
    /// `aws secretsmanager get-secret-value`, fetched before synthesis
    AwsCli,
}

impl SecretSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretSource::Static => "static",
            SecretSource::Dynamic => "dynamic",
            SecretSource::AwsCli => "aws-cli",
        }
    }
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "static" => Ok(SecretSource::Static),
            "dynamic" => Ok(SecretSource::Dynamic),
            "aws-cli" | "awscli" => Ok(SecretSource::AwsCli),
            other => Err(format!("unknown secret source: {}", other)),
        }
    }
}

/// Governance account and data domains to synthesize
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub lf_tags: Vec<LfTag>,
    #[serde(default)]
    pub domains: Vec<DataDomain>,
    /// Domain references by secret ARN, used by [`SecretSource::Static`]
    #[serde(default)]
    pub secrets: BTreeMap<String, DomainReferences>,
}

impl MeshConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;
        let config: MeshConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: shown.clone(),
            source,
        })?;
        config.validate()?;

        debug!(
            path = %shown,
            domains = config.domains.len(),
            lf_tags = config.lf_tags.len(),
            "Loaded mesh config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        let mut accounts = HashSet::new();

        for domain in &self.domains {
            if domain.id.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "domain {} has an empty id",
                    domain.account_id
                )));
            }
            if !ids.insert(domain.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate domain id {}", domain.id)));
            }
            if domain.account_id.len() != 12
                || !domain.account_id.chars().all(|c| c.is_ascii_digit())
            {
                return Err(ConfigError::Invalid(format!(
                    "domain {} has account id {:?}, expected 12 digits",
                    domain.id, domain.account_id
                )));
            }
            if !accounts.insert(domain.account_id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "account {} is listed twice",
                    domain.account_id
                )));
            }
        }
        Ok(())
    }

    /// Secret ARNs of every domain, in declaration order
    pub fn secret_arns(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(|d| d.secret_arn.as_str())
    }

    /// Static resolver over the `secrets` section
    pub fn static_secrets(&self) -> StaticSecrets {
        let mut secrets = StaticSecrets::new();
        for (arn, refs) in &self.secrets {
            secrets.insert_references(arn.clone(), refs);
        }
        secrets
    }

    /// Build the resolver for `source`, prefetching secrets when needed.
    pub async fn resolver(
        &self,
        source: SecretSource,
    ) -> Result<Box<dyn SecretResolver>, mesh_secrets::SecretError> {
        let resolver: Box<dyn SecretResolver> = match source {
            SecretSource::Static => Box::new(self.static_secrets()),
            SecretSource::Dynamic => Box::new(DynamicReferences),
            SecretSource::AwsCli => Box::new(AwsCliSecrets::prefetch(self.secret_arns()).await?),
        };
        Ok(resolver)
    }

    /// Declare the governance account and register every domain.
    pub fn synthesize(
        &self,
        resolver: Box<dyn SecretResolver>,
    ) -> Result<CentralGovernance, GovernanceError> {
        let mut template = Template::new();
        if let Some(description) = &self.description {
            template = template.with_description(description.clone());
        }

        let props = CentralGovernanceProps {
            lf_tags: self.lf_tags.clone(),
        };
        let mut governance = CentralGovernance::new(template, props, resolver)?;
        for domain in &self.domains {
            governance.register(domain)?;
        }

        info!(
            domains = self.domains.len(),
            resources = governance.template().len(),
            "Synthesized central governance"
        );
        Ok(governance)
    }
}

//! Errors raised while declaring the governance account

use mesh_secrets::SecretError;
use thiserror::Error;

use crate::template::TemplateError;
use crate::workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// The domain secret could not be resolved; nothing was declared
    #[error("Failed to resolve references of data domain {domain}: {source}")]
    Secret {
        domain: String,
        #[source]
        source: SecretError,
    },

    #[error("Data domain account {0} is already registered")]
    DomainAlreadyRegistered(String),

    #[error("Invalid data domain {id}: {reason}")]
    InvalidDomain { id: String, reason: String },

    #[error("Invalid LF tag {key}: {reason}")]
    InvalidTag { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, GovernanceError>;

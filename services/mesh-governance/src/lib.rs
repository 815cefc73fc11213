//! Data Mesh Central Governance
//!
//! Synthesizes the CloudFormation template of a data mesh central governance
//! account: the central event bus, the data product registration workflow and
//! the Lake Formation footprint of every registered data domain.

pub mod config;
pub mod error;
pub mod governance;
pub mod intrinsics;
pub mod template;
pub mod workflow;

pub use config::{MeshConfig, SecretSource};
pub use error::GovernanceError;
pub use governance::{
    CentralGovernance, CentralGovernanceProps, DataDomain, DomainRegistration, LfAccessControlMode,
    LfTag, RegistrationRequest,
};
pub use template::Template;

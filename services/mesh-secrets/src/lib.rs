//! Data Domain Secret References
//!
//! A data domain account shares the location of its data products with the
//! central governance account through a Secrets Manager secret holding:
//!
//! ```json
//! {
//!   "BucketName": "clean-<ACCOUNT_ID>-<REGION>",
//!   "Prefix": "data-products",
//!   "KmsKeyId": "<KMS_ID>"
//! }
//! ```
//!
//! Resolution strategies:
//! - [`StaticSecrets`]: bundles known up front (config files, tests)
//! - [`DynamicReferences`]: CloudFormation `{{resolve:secretsmanager:...}}`
//!   references, resolved by the deployment engine
//! - [`AwsCliSecrets`]: fetches the bundles with the `aws` CLI before synthesis

pub mod aws_cli;
pub mod resolver;
pub mod types;

pub use aws_cli::AwsCliSecrets;
pub use resolver::{DynamicReferences, SecretResolver, StaticSecrets};
pub use types::{DomainReferences, SecretArn, SecretError};

//! Fixed names shared with data domain accounts
//!
//! These strings form the contract between the central governance account and
//! each data domain's own onboarding workflow. Every derivation is a pure
//! function of its inputs.

use super::types::LfAccessControlMode;

/// Event bus owned by the central governance account
pub const CENTRAL_BUS_NAME: &str = "central-mesh-bus";
/// Event bus every data domain account owns
pub const DOMAIN_BUS_NAME: &str = "data-mesh-bus";
/// Middle segment of every data domain database name
pub const DOMAIN_DATABASE_PREFIX: &str = "data-domain";
/// LF tag key carrying the data domain (line of business) name
pub const DOMAIN_TAG_KEY: &str = "LoB";
/// Source of events emitted by the registration workflow
pub const EVENT_SOURCE: &str = "com.central.stepfunction";
/// Suffix of the event detail type routed to a data domain
pub const RESOURCE_LINKS_SUFFIX: &str = "_createResourceLinks";
/// Log group of the registration state machine
pub const WORKFLOW_LOG_GROUP: &str = "/aws/vendedlogs/data-mesh/workflow";
/// Retention of the workflow log group
pub const WORKFLOW_LOG_RETENTION_DAYS: u32 = 7;
/// Glue error signalling the table is already registered
pub const TABLE_EXISTS_ERROR: &str = "Glue.AlreadyExistsException";
/// Default CDK bootstrap qualifier
pub const CDK_QUALIFIER: &str = "hnb659fds";

/// `{mode}-data-domain-{domain_id}`
pub fn database_name(mode: LfAccessControlMode, domain_id: &str) -> String {
    format!("{}-{}-{}", mode, DOMAIN_DATABASE_PREFIX, domain_id)
}

/// `{mode}-data-domain`, the database name in the domain account
pub fn domain_database_name(mode: LfAccessControlMode) -> String {
    format!("{}-{}", mode, DOMAIN_DATABASE_PREFIX)
}

/// Statement id of the cross-account bus policy for a domain
pub fn event_statement_id(domain_id: &str) -> String {
    format!("AllowDataDomainAccToPutEvents_{}", domain_id)
}

/// Event detail type only the domain's rule matches
pub fn resource_links_detail_type(domain_id: &str) -> String {
    format!("{}{}", domain_id, RESOURCE_LINKS_SUFFIX)
}

/// `Fn::Sub` template of the domain event bus ARN, in the central region
pub fn domain_bus_arn(domain_id: &str) -> String {
    format!(
        "arn:${{AWS::Partition}}:events:${{AWS::Region}}:{}:event-bus/{}",
        domain_id, DOMAIN_BUS_NAME
    )
}

/// `s3://{bucket}/{prefix}`
pub fn s3_location_uri(bucket: &str, prefix: &str) -> String {
    format!("s3://{}/{}", bucket, prefix)
}

/// `Fn::Sub` template of the S3 ARN of a bucket prefix
pub fn s3_prefix_arn(bucket: &str, prefix: &str) -> String {
    format!("arn:${{AWS::Partition}}:s3:::{}/{}", bucket, prefix)
}

/// `Fn::Sub` template of the KMS key ARN in the domain account
pub fn kms_key_arn(domain_id: &str, key_id: &str) -> String {
    format!(
        "arn:${{AWS::Partition}}:kms:${{AWS::Region}}:{}:{}",
        domain_id,
        if key_id.starts_with("alias/") {
            key_id.to_string()
        } else {
            format!("key/{}", key_id)
        }
    )
}

/// `Fn::Sub` template of the CDK CloudFormation execution role ARN
pub fn cdk_exec_role_arn() -> String {
    format!(
        "arn:${{AWS::Partition}}:iam::${{AWS::AccountId}}:role/cdk-{}-cfn-exec-role-${{AWS::AccountId}}-${{AWS::Region}}",
        CDK_QUALIFIER
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_names() {
        assert_eq!(
            database_name(LfAccessControlMode::Nrac, "111111111111"),
            "nrac-data-domain-111111111111"
        );
        assert_eq!(
            database_name(LfAccessControlMode::Tbac, "111111111111"),
            "tbac-data-domain-111111111111"
        );
        assert_eq!(domain_database_name(LfAccessControlMode::Tbac), "tbac-data-domain");
    }

    #[test]
    fn test_derivations_are_stable() {
        let id = "111111111111";
        assert_eq!(event_statement_id(id), event_statement_id(id));
        assert_eq!(event_statement_id(id), "AllowDataDomainAccToPutEvents_111111111111");
        assert_eq!(resource_links_detail_type(id), resource_links_detail_type(id));
        assert_eq!(resource_links_detail_type(id), "111111111111_createResourceLinks");
    }

    #[test]
    fn test_arns() {
        assert_eq!(
            domain_bus_arn("111111111111"),
            "arn:${AWS::Partition}:events:${AWS::Region}:111111111111:event-bus/data-mesh-bus"
        );
        assert_eq!(
            s3_location_uri("clean-222222222222-us-east-1", "data-products"),
            "s3://clean-222222222222-us-east-1/data-products"
        );
        assert_eq!(
            kms_key_arn("1", "alias/key1"),
            "arn:${AWS::Partition}:kms:${AWS::Region}:1:alias/key1"
        );
        assert_eq!(
            kms_key_arn("1", "abcd-1234"),
            "arn:${AWS::Partition}:kms:${AWS::Region}:1:key/abcd-1234"
        );
        assert!(cdk_exec_role_arn().contains("cdk-hnb659fds-cfn-exec-role-"));
    }
}

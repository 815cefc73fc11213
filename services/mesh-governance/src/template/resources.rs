//! Typed CloudFormation resource properties
//!
//! Only the resource types the governance account declares are modeled.
//! Field names serialize to the CloudFormation property names.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::iam::PolicyDocument;

/// A declared resource and its properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceKind {
    EventBus(EventBusProps),
    EventBusPolicy(EventBusPolicyProps),
    EventRule(EventRuleProps),
    IamRole(RoleProps),
    IamPolicy(PolicyProps),
    DataLakeSettings(DataLakeSettingsProps),
    GlueDatabase(DatabaseProps),
    PrincipalPermissions(PrincipalPermissionsProps),
    LfTag(LfTagProps),
    TagAssociation(TagAssociationProps),
    LakeFormationResource(LfResourceProps),
    LogGroup(LogGroupProps),
    StateMachine(StateMachineProps),
}

impl ResourceKind {
    /// CloudFormation resource type name
    pub fn resource_type(&self) -> &'static str {
        match self {
            ResourceKind::EventBus(_) => "AWS::Events::EventBus",
            ResourceKind::EventBusPolicy(_) => "AWS::Events::EventBusPolicy",
            ResourceKind::EventRule(_) => "AWS::Events::Rule",
            ResourceKind::IamRole(_) => "AWS::IAM::Role",
            ResourceKind::IamPolicy(_) => "AWS::IAM::Policy",
            ResourceKind::DataLakeSettings(_) => "AWS::LakeFormation::DataLakeSettings",
            ResourceKind::GlueDatabase(_) => "AWS::Glue::Database",
            ResourceKind::PrincipalPermissions(_) => "AWS::LakeFormation::PrincipalPermissions",
            ResourceKind::LfTag(_) => "AWS::LakeFormation::Tag",
            ResourceKind::TagAssociation(_) => "AWS::LakeFormation::TagAssociation",
            ResourceKind::LakeFormationResource(_) => "AWS::LakeFormation::Resource",
            ResourceKind::LogGroup(_) => "AWS::Logs::LogGroup",
            ResourceKind::StateMachine(_) => "AWS::StepFunctions::StateMachine",
        }
    }

    pub fn properties(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

// ============================================================
// EventBridge
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventBusProps {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventBusPolicyProps {
    pub event_bus_name: Value,
    pub statement_id: String,
    pub action: String,
    pub principal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventRuleProps {
    pub event_bus_name: Value,
    pub event_pattern: EventPattern,
    pub state: &'static str,
    pub targets: Vec<RuleTarget>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventPattern {
    pub source: Vec<String>,
    pub detail_type: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleTarget {
    pub arn: Value,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<Value>,
}

// ============================================================
// IAM
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleProps {
    pub assume_role_policy_document: PolicyDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyProps {
    pub policy_name: String,
    pub policy_document: PolicyDocument,
    pub roles: Vec<Value>,
}

// ============================================================
// Glue and Lake Formation
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataLakeSettingsProps {
    pub admins: Vec<DataLakePrincipal>,
    pub mutation_type: MutationType,
}

/// How data lake settings combine with the account's existing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MutationType {
    /// Add the principals to the existing administrators
    Append,
    /// Overwrite the administrator list
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataLakePrincipal {
    pub data_lake_principal_identifier: Value,
}

impl DataLakePrincipal {
    pub fn new(identifier: impl Into<Value>) -> Self {
        Self {
            data_lake_principal_identifier: identifier.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseProps {
    pub catalog_id: Value,
    pub database_input: DatabaseInput,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseInput {
    pub name: String,
    pub description: String,
    pub location_uri: String,
    pub parameters: BTreeMap<String, Value>,
}

/// Lake Formation permission names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    All,
    Associate,
    CreateTable,
    Describe,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PrincipalPermissionsProps {
    pub permissions: Vec<Permission>,
    pub permissions_with_grant_option: Vec<Permission>,
    pub principal: DataLakePrincipal,
    pub resource: LfResourceTarget,
}

/// Target of a Lake Formation grant or tag association
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LfResourceTarget {
    Database(DatabaseResource),
    #[serde(rename = "LFTag")]
    LfTag(LfTagPair),
    #[serde(rename = "LFTagPolicy")]
    LfTagPolicy(LfTagPolicyResource),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseResource {
    pub catalog_id: Value,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LfTagPair {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<Value>,
    pub tag_key: String,
    pub tag_values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagPolicyResourceType {
    Database,
    Table,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LfTagPolicyResource {
    pub catalog_id: Value,
    pub resource_type: TagPolicyResourceType,
    pub expression: Vec<LfTagPair>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LfTagProps {
    pub catalog_id: Value,
    pub tag_key: String,
    pub tag_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagAssociationProps {
    pub resource: LfResourceTarget,
    #[serde(rename = "LFTags")]
    pub lf_tags: Vec<LfTagPair>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LfResourceProps {
    pub resource_arn: Value,
    pub use_service_linked_role: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<Value>,
}

// ============================================================
// Logs and Step Functions
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogGroupProps {
    pub log_group_name: String,
    pub retention_in_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    All,
    Error,
    Fatal,
    Off,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateMachineProps {
    pub role_arn: Value,
    pub definition_string: Value,
    pub state_machine_type: &'static str,
    pub logging_configuration: LoggingConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoggingConfiguration {
    pub level: LogLevel,
    pub include_execution_data: bool,
    pub destinations: Vec<LogDestination>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogDestination {
    pub cloud_watch_logs_log_group: LogGroupTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogGroupTarget {
    pub log_group_arn: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lf_resource_target_names() {
        let target = LfResourceTarget::LfTagPolicy(LfTagPolicyResource {
            catalog_id: json!("123"),
            resource_type: TagPolicyResourceType::Table,
            expression: vec![LfTagPair {
                catalog_id: None,
                tag_key: "LoB".to_string(),
                tag_values: vec!["Sales".to_string()],
            }],
        });

        assert_eq!(
            serde_json::to_value(&target).unwrap(),
            json!({
                "LFTagPolicy": {
                    "CatalogId": "123",
                    "ResourceType": "TABLE",
                    "Expression": [{"TagKey": "LoB", "TagValues": ["Sales"]}]
                }
            })
        );
    }

    #[test]
    fn test_event_pattern_keys() {
        let pattern = EventPattern {
            source: vec!["com.central.stepfunction".to_string()],
            detail_type: vec!["1_createResourceLinks".to_string()],
        };
        let value = serde_json::to_value(&pattern).unwrap();
        assert_eq!(value["detail-type"], json!(["1_createResourceLinks"]));
        assert_eq!(value["source"], json!(["com.central.stepfunction"]));
    }

    #[test]
    fn test_permission_names() {
        assert_eq!(
            serde_json::to_value([Permission::CreateTable, Permission::All]).unwrap(),
            json!(["CREATE_TABLE", "ALL"])
        );
    }

    #[test]
    fn test_properties_untagged() {
        let kind = ResourceKind::LogGroup(LogGroupProps {
            log_group_name: "/aws/vendedlogs/x".to_string(),
            retention_in_days: 7,
        });
        assert_eq!(kind.resource_type(), "AWS::Logs::LogGroup");
        assert_eq!(
            kind.properties().unwrap(),
            json!({"LogGroupName": "/aws/vendedlogs/x", "RetentionInDays": 7})
        );
    }
}

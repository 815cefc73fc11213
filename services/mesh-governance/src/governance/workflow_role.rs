//! Role assumed by the registration state machine

use crate::template::iam::{PolicyDocument, PolicyStatement};
use crate::template::resources::{PolicyProps, RoleProps};
use crate::template::{ResourceHandle, ResourceKind, Template, TemplateError};

const STATES_SERVICE: &str = "states.amazonaws.com";

/// Handles of the workflow role and its base policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowRole {
    pub role: ResourceHandle,
    pub policy: ResourceHandle,
}

fn base_policy() -> PolicyDocument {
    PolicyDocument::new(vec![
        PolicyStatement::allow()
            .sid("LakeFormationGrants")
            .actions([
                "lakeformation:GrantPermissions",
                "lakeformation:BatchGrantPermissions",
                "lakeformation:RevokePermissions",
                "lakeformation:ListPermissions",
                "lakeformation:GetDataAccess",
                "lakeformation:AddLFTagsToResource",
                "lakeformation:GetResourceLFTags",
            ])
            .resource("*"),
        PolicyStatement::allow()
            .sid("GlueCatalog")
            .actions([
                "glue:CreateTable",
                "glue:UpdateTable",
                "glue:DeleteTable",
                "glue:GetTable",
                "glue:GetTables",
                "glue:GetDatabase",
                "glue:GetDatabases",
                "glue:GetPartitions",
            ])
            .resource("*"),
        PolicyStatement::allow()
            .sid("CrossAccountShares")
            .actions([
                "ram:CreateResourceShare",
                "ram:AssociateResourceShare",
                "ram:GetResourceShares",
                "ram:ListResources",
            ])
            .resource("*"),
        PolicyStatement::allow()
            .sid("ExecutionLogging")
            .actions([
                "logs:CreateLogDelivery",
                "logs:GetLogDelivery",
                "logs:UpdateLogDelivery",
                "logs:DeleteLogDelivery",
                "logs:ListLogDeliveries",
                "logs:PutResourcePolicy",
                "logs:DescribeResourcePolicies",
                "logs:DescribeLogGroups",
            ])
            .resource("*"),
    ])
}

/// Declare the workflow role and its catalog, grant and logging permissions.
pub fn declare_workflow_role(
    template: &mut Template,
    id: &str,
) -> Result<WorkflowRole, TemplateError> {
    let role = template.declare(
        id,
        ResourceKind::IamRole(RoleProps {
            assume_role_policy_document: PolicyDocument::assumed_by(STATES_SERVICE),
            description: Some("Role used by the data mesh registration workflow".to_string()),
        }),
    )?;

    let policy = template.declare(
        &format!("{}Policy", id),
        ResourceKind::IamPolicy(PolicyProps {
            policy_name: format!("{}Policy", id),
            policy_document: base_policy(),
            roles: vec![template.ref_of(role)?],
        }),
    )?;

    Ok(WorkflowRole { role, policy })
}

//! Lake Formation building blocks
//!
//! - administrator settings: principals allowed to create databases and tags
//! - S3 location registration: registers a data domain prefix with Lake
//!   Formation through a scoped data access role

use mesh_secrets::DomainReferences;

use super::naming;
use crate::intrinsics;
use crate::template::iam::{PolicyDocument, PolicyStatement};
use crate::template::resources::{
    DataLakePrincipal, DataLakeSettingsProps, LfResourceProps, MutationType, PolicyProps,
    RoleProps,
};
use crate::template::{ResourceHandle, ResourceKind, Template, TemplateError};

const LAKE_FORMATION_SERVICE: &str = "lakeformation.amazonaws.com";

/// Declare the data lake settings adding `admins` to the Lake Formation
/// administrators. Administrators already present in the account are kept.
pub fn declare_lf_admins(
    template: &mut Template,
    id: &str,
    admins: Vec<serde_json::Value>,
) -> Result<ResourceHandle, TemplateError> {
    template.declare(
        id,
        ResourceKind::DataLakeSettings(DataLakeSettingsProps {
            admins: admins.into_iter().map(DataLakePrincipal::new).collect(),
            mutation_type: MutationType::Append,
        }),
    )
}

/// A data domain location registered with Lake Formation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3LocationRegistration {
    /// `s3://bucket/prefix`
    pub location_uri: String,
    pub data_access_role: ResourceHandle,
    pub data_access_policy: ResourceHandle,
    pub resource: ResourceHandle,
}

fn data_access_policy(refs: &DomainReferences, domain_account: &str) -> PolicyDocument {
    let bucket_arn = format!("arn:${{AWS::Partition}}:s3:::{}", refs.bucket_name);
    let objects_arn = format!("{}/*", naming::s3_prefix_arn(&refs.bucket_name, &refs.prefix));

    PolicyDocument::new(vec![
        PolicyStatement::allow()
            .sid("DataProductObjects")
            .actions([
                "s3:GetObject*",
                "s3:GetBucket*",
                "s3:List*",
                "s3:DeleteObject*",
                "s3:PutObject",
                "s3:PutObjectLegalHold",
                "s3:PutObjectRetention",
                "s3:PutObjectTagging",
                "s3:PutObjectVersionTagging",
                "s3:Abort*",
            ])
            .resource(intrinsics::sub(bucket_arn))
            .resource(intrinsics::sub(objects_arn)),
        PolicyStatement::allow()
            .sid("DataProductKey")
            .actions([
                "kms:Encrypt",
                "kms:Decrypt",
                "kms:ReEncrypt*",
                "kms:GenerateDataKey*",
                "kms:DescribeKey",
            ])
            .resource(intrinsics::sub(naming::kms_key_arn(
                domain_account,
                &refs.kms_key_id,
            ))),
    ])
}

/// Register `s3://bucket/prefix` of a data domain with Lake Formation.
pub fn declare_s3_location(
    template: &mut Template,
    id: &str,
    refs: &DomainReferences,
    domain_account: &str,
) -> Result<S3LocationRegistration, TemplateError> {
    let data_access_role = template.declare(
        &format!("{}DataAccessRole", id),
        ResourceKind::IamRole(RoleProps {
            assume_role_policy_document: PolicyDocument::assumed_by(LAKE_FORMATION_SERVICE),
            description: Some(format!(
                "Lake Formation data access role for {}",
                naming::s3_location_uri(&refs.bucket_name, &refs.prefix)
            )),
        }),
    )?;

    let data_access_policy = template.declare(
        &format!("{}DataAccessPolicy", id),
        ResourceKind::IamPolicy(PolicyProps {
            policy_name: format!("{}DataAccessPolicy", id),
            policy_document: data_access_policy(refs, domain_account),
            roles: vec![template.ref_of(data_access_role)?],
        }),
    )?;

    let resource = template.declare(
        &format!("{}Resource", id),
        ResourceKind::LakeFormationResource(LfResourceProps {
            resource_arn: intrinsics::sub(naming::s3_prefix_arn(&refs.bucket_name, &refs.prefix)),
            use_service_linked_role: false,
            role_arn: Some(template.att_of(data_access_role, "Arn")?),
        }),
    )?;
    // The role must be able to read the location before it is registered
    template.add_dependency(resource, data_access_policy)?;

    Ok(S3LocationRegistration {
        location_uri: naming::s3_location_uri(&refs.bucket_name, &refs.prefix),
        data_access_role,
        data_access_policy,
        resource,
    })
}

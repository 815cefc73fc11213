//! Data domain onboarding
//!
//! Registering a data domain declares, in dependency order:
//! 1. one Glue database per access control mode, and ALL on it for the workflow role
//! 2. the Lake Formation registration of the domain's bucket prefix
//! 3. in tag based mode: the domain name as a value of the shared `LoB` tag,
//!    its association with the TBAC database, and the grants sharing the tag
//!    (and the central tags) with the domain account
//! 4. the bus policy letting the domain account put events on the central bus
//! 5. the rule forwarding `<account>_createResourceLinks` events to the
//!    domain's own bus
//!
//! A registration either declares all of this or nothing.

use mesh_secrets::DomainReferences;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::lake_formation::{self, S3LocationRegistration};
use super::naming;
use super::types::{AccessModes, DataDomain, LfAccessControlMode};
use super::{CentralGovernance, DeclaredTag};
use crate::error::{GovernanceError, Result};
use crate::intrinsics;
use crate::template::iam::{PolicyDocument, PolicyStatement};
use crate::template::resources::{
    DataLakePrincipal, DatabaseInput, DatabaseProps, DatabaseResource, EventBusPolicyProps,
    EventPattern, EventRuleProps, LfResourceTarget, LfTagPair, LfTagPolicyResource, LfTagProps,
    Permission, PolicyProps, PrincipalPermissionsProps, RoleProps, RuleTarget,
    TagAssociationProps, TagPolicyResourceType,
};
use crate::template::{
    DependencyGroup, RemovalPolicy, ResourceHandle, ResourceKind, Template, TemplateError,
};

const EVENTS_SERVICE: &str = "events.amazonaws.com";
/// The `LoB` tag, shared by every tag based domain. A tag key exists once per catalog.
const DOMAIN_TAG_ID: &str = "DataDomainLfTag";

/// Database declared for one access control mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDatabase {
    pub mode: LfAccessControlMode,
    pub name: String,
    pub database: ResourceHandle,
    /// ALL on the database for the workflow role
    pub workflow_grant: ResourceHandle,
}

/// Declarations of the tag based access control branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSharing {
    /// The shared `LoB` tag carrying the domain name as one of its values
    pub tag: ResourceHandle,
    pub association: ResourceHandle,
    pub tag_grant: ResourceHandle,
    pub table_policy_grant: ResourceHandle,
    pub database_policy_grant: ResourceHandle,
    /// ASSOCIATE on each central tag, after all central tags exist
    pub central_tag_grants: Vec<ResourceHandle>,
}

impl TagSharing {
    pub fn tag_policy_grants(&self) -> [ResourceHandle; 2] {
        [self.table_policy_grant, self.database_policy_grant]
    }
}

/// Everything declared for one data domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRegistration {
    pub id: String,
    pub domain_id: String,
    pub domain_name: String,
    pub modes: AccessModes,
    pub databases: Vec<DomainDatabase>,
    pub location: S3LocationRegistration,
    pub tag_sharing: Option<TagSharing>,
    pub bus_policy: ResourceHandle,
    pub rule_role: ResourceHandle,
    pub rule: ResourceHandle,
    /// Detail type the rule matches
    pub detail_type: String,
}

impl DomainRegistration {
    pub fn database(&self, mode: LfAccessControlMode) -> Option<&DomainDatabase> {
        self.databases.iter().find(|d| d.mode == mode)
    }
}

impl CentralGovernance {
    /// Register a data domain described by a config entry.
    pub fn register(&mut self, domain: &DataDomain) -> Result<&DomainRegistration> {
        self.register_data_domain(
            &domain.id,
            &domain.account_id,
            &domain.name,
            &domain.secret_arn,
            domain.lf_access_mode,
        )
    }

    /// Register a data domain account with the central governance account.
    ///
    /// # Arguments
    /// * `id` - Construct id prefixing the domain's resources
    /// * `domain_id` - Account id of the data domain
    /// * `domain_name` - Name of the data domain, e.g. the line of business
    /// * `domain_secret_arn` - Complete ARN of the domain configuration secret
    /// * `lf_access_control_mode` - Access control mode; both when `None`
    pub fn register_data_domain(
        &mut self,
        id: &str,
        domain_id: &str,
        domain_name: &str,
        domain_secret_arn: &str,
        lf_access_control_mode: Option<LfAccessControlMode>,
    ) -> Result<&DomainRegistration> {
        validate_domain(id, domain_id, domain_name)?;

        if self.registrations.iter().any(|r| r.domain_id == domain_id) {
            return Err(GovernanceError::DomainAlreadyRegistered(domain_id.to_string()));
        }

        let modes = AccessModes::from_selection(lf_access_control_mode);
        // Tag policy grants match on the tag value alone
        if modes.includes_tag_based()
            && self
                .registrations
                .iter()
                .any(|r| r.tag_sharing.is_some() && r.domain_name == domain_name)
        {
            return Err(GovernanceError::InvalidDomain {
                id: id.to_string(),
                reason: format!(
                    "{} is already the {} tag value of another data domain",
                    domain_name,
                    naming::DOMAIN_TAG_KEY
                ),
            });
        }

        let refs = self
            .resolver
            .resolve(domain_secret_arn)
            .map_err(|source| GovernanceError::Secret {
                domain: domain_id.to_string(),
                source,
            })?;
        debug!(domain = %domain_id, bucket = %refs.bucket_name, "Resolved data domain references");

        let checkpoint = self.template.clone();

        let registration = match self.declare_domain(id, domain_id, domain_name, &refs, modes) {
            Ok(registration) => registration,
            Err(e) => {
                warn!(domain = %domain_id, error = %e, "Data domain registration rolled back");
                self.template = checkpoint;
                return Err(e.into());
            }
        };

        info!(
            domain = %domain_id,
            name = %domain_name,
            modes = ?modes.modes(),
            location = %registration.location.location_uri,
            "Data domain registered"
        );

        if let Some(sharing) = &registration.tag_sharing {
            self.domain_tag = Some(sharing.tag);
        }
        self.registrations.push(registration);
        Ok(&self.registrations[self.registrations.len() - 1])
    }

    fn declare_domain(
        &mut self,
        id: &str,
        domain_id: &str,
        domain_name: &str,
        refs: &DomainReferences,
        modes: AccessModes,
    ) -> std::result::Result<DomainRegistration, TemplateError> {
        let template = &mut self.template;
        let location_uri = naming::s3_location_uri(&refs.bucket_name, &refs.prefix);

        let mut databases = Vec::with_capacity(modes.modes().len());
        for &mode in modes.modes() {
            let name = naming::database_name(mode, domain_id);

            let mut parameters = BTreeMap::new();
            parameters.insert("data_owner".to_string(), json!(domain_id));
            parameters.insert("data_owner_name".to_string(), json!(domain_name));
            parameters.insert("pii_flag".to_string(), json!(false));
            parameters.insert("access_mode".to_string(), json!(mode));

            let database = template.declare(
                &format!("{}DataDomainDatabase-{}", id, mode),
                ResourceKind::GlueDatabase(DatabaseProps {
                    catalog_id: intrinsics::account_id(),
                    database_input: DatabaseInput {
                        name: name.clone(),
                        description: format!(
                            "Database for data products in {} data domain. Account id: {}. LF Access Control mode: {}",
                            domain_name, domain_id, mode
                        ),
                        location_uri: location_uri.clone(),
                        parameters,
                    },
                }),
            )?;
            template.add_dependency(database, self.lf_admins)?;

            let workflow_grant = template.declare(
                &format!("{}WorkflowRoleDbAccess-{}", id, mode),
                ResourceKind::PrincipalPermissions(PrincipalPermissionsProps {
                    permissions: vec![Permission::All],
                    permissions_with_grant_option: vec![],
                    principal: DataLakePrincipal::new(
                        template.att_of(self.workflow_role.role, "Arn")?,
                    ),
                    resource: LfResourceTarget::Database(DatabaseResource {
                        catalog_id: intrinsics::account_id(),
                        name: name.clone(),
                    }),
                }),
            )?;
            template.add_dependency(workflow_grant, database)?;

            databases.push(DomainDatabase {
                mode,
                name,
                database,
                workflow_grant,
            });
        }

        let location = lake_formation::declare_s3_location(
            template,
            &format!("{}LFLocation", id),
            refs,
            domain_id,
        )?;

        let tag_sharing = match databases
            .iter()
            .find(|d| d.mode == LfAccessControlMode::Tbac)
        {
            Some(tbac) if modes.includes_tag_based() => Some(declare_tag_sharing(
                template,
                id,
                domain_id,
                domain_name,
                tbac,
                self.domain_tag,
                &self.lf_tags,
            )?),
            _ => None,
        };

        let bus_policy = template.declare(
            &format!("{}Policy", id),
            ResourceKind::EventBusPolicy(EventBusPolicyProps {
                event_bus_name: template.ref_of(self.event_bus)?,
                statement_id: naming::event_statement_id(domain_id),
                action: "events:PutEvents".to_string(),
                principal: domain_id.to_string(),
            }),
        )?;

        let domain_bus_arn = intrinsics::sub(naming::domain_bus_arn(domain_id));

        let rule_role = template.declare(
            &format!("{}RuleRole", id),
            ResourceKind::IamRole(RoleProps {
                assume_role_policy_document: PolicyDocument::assumed_by(EVENTS_SERVICE),
                description: Some(format!(
                    "Forwards registration events to data domain {}",
                    domain_id
                )),
            }),
        )?;
        let rule_role_policy = template.declare(
            &format!("{}RuleRolePolicy", id),
            ResourceKind::IamPolicy(PolicyProps {
                policy_name: format!("{}RuleRolePolicy", id),
                policy_document: PolicyDocument::new(vec![PolicyStatement::allow()
                    .action("events:PutEvents")
                    .resource(domain_bus_arn.clone())]),
                roles: vec![template.ref_of(rule_role)?],
            }),
        )?;

        let detail_type = naming::resource_links_detail_type(domain_id);
        let rule = template.declare(
            &format!("{}Rule", id),
            ResourceKind::EventRule(EventRuleProps {
                event_bus_name: template.ref_of(self.event_bus)?,
                event_pattern: EventPattern {
                    source: vec![naming::EVENT_SOURCE.to_string()],
                    detail_type: vec![detail_type.clone()],
                },
                state: "ENABLED",
                targets: vec![RuleTarget {
                    arn: domain_bus_arn,
                    id: "DomainEventBus".to_string(),
                    role_arn: Some(template.att_of(rule_role, "Arn")?),
                }],
            }),
        )?;
        template.add_dependency(rule, rule_role_policy)?;
        template.set_removal_policy(rule, RemovalPolicy::Destroy)?;

        Ok(DomainRegistration {
            id: id.to_string(),
            domain_id: domain_id.to_string(),
            domain_name: domain_name.to_string(),
            modes,
            databases,
            location,
            tag_sharing,
            bus_policy,
            rule_role,
            rule,
            detail_type,
        })
    }
}

fn domain_tag_pair(domain_name: &str) -> LfTagPair {
    LfTagPair {
        catalog_id: Some(intrinsics::account_id()),
        tag_key: naming::DOMAIN_TAG_KEY.to_string(),
        tag_values: vec![domain_name.to_string()],
    }
}

fn tag_policy_grant(
    domain_id: &str,
    domain_name: &str,
    resource_type: TagPolicyResourceType,
    permissions: Vec<Permission>,
) -> ResourceKind {
    ResourceKind::PrincipalPermissions(PrincipalPermissionsProps {
        permissions: permissions.clone(),
        permissions_with_grant_option: permissions,
        principal: DataLakePrincipal::new(domain_id),
        resource: LfResourceTarget::LfTagPolicy(LfTagPolicyResource {
            catalog_id: intrinsics::account_id(),
            resource_type,
            expression: vec![LfTagPair {
                catalog_id: None,
                tag_key: naming::DOMAIN_TAG_KEY.to_string(),
                tag_values: vec![domain_name.to_string()],
            }],
        }),
    })
}

/// Add `domain_name` to the values of the shared `LoB` tag.
fn add_domain_tag_value(
    template: &mut Template,
    tag: ResourceHandle,
    domain_name: &str,
) -> std::result::Result<(), TemplateError> {
    let logical_id = template.logical_id(tag)?.to_string();
    match template.kind_mut(tag)? {
        ResourceKind::LfTag(props) if props.tag_key == naming::DOMAIN_TAG_KEY => {
            if !props.tag_values.iter().any(|v| v == domain_name) {
                props.tag_values.push(domain_name.to_string());
            }
            Ok(())
        }
        _ => Err(TemplateError::UnexpectedKind {
            logical_id,
            expected: "LoB tag",
        }),
    }
}

/// Declare the tag based access control resources of a domain.
///
/// The first tag based domain declares the shared `LoB` tag; later ones pass
/// its handle as `domain_tag` and add their name to its values.
///
/// Central tag grants depend on every central tag, so they fail with
/// [`TemplateError::UnknownDependency`] unless the tags were declared in
/// this template first.
pub fn declare_tag_sharing(
    template: &mut Template,
    id: &str,
    domain_id: &str,
    domain_name: &str,
    tbac_database: &DomainDatabase,
    domain_tag: Option<ResourceHandle>,
    central_tags: &[DeclaredTag],
) -> std::result::Result<TagSharing, TemplateError> {
    let tag = match domain_tag {
        Some(tag) => {
            add_domain_tag_value(template, tag, domain_name)?;
            tag
        }
        None => {
            let tag = template.declare(
                DOMAIN_TAG_ID,
                ResourceKind::LfTag(LfTagProps {
                    catalog_id: intrinsics::account_id(),
                    tag_key: naming::DOMAIN_TAG_KEY.to_string(),
                    tag_values: vec![domain_name.to_string()],
                }),
            )?;
            template.add_dependency(tag, tbac_database.database)?;
            tag
        }
    };

    let association = template.declare(
        &format!("{}DbTagAssoc", id),
        ResourceKind::TagAssociation(TagAssociationProps {
            resource: LfResourceTarget::Database(DatabaseResource {
                catalog_id: intrinsics::account_id(),
                name: tbac_database.name.clone(),
            }),
            lf_tags: vec![domain_tag_pair(domain_name)],
        }),
    )?;
    template.add_dependency(association, tag)?;
    template.add_dependency(association, tbac_database.database)?;

    let tag_grant = template.declare(
        &format!("{}GrantDataDomainTag", id),
        ResourceKind::PrincipalPermissions(PrincipalPermissionsProps {
            permissions: vec![Permission::Associate],
            permissions_with_grant_option: vec![Permission::Associate],
            principal: DataLakePrincipal::new(domain_id),
            resource: LfResourceTarget::LfTag(domain_tag_pair(domain_name)),
        }),
    )?;
    template.add_dependency(tag_grant, tag)?;

    let table_policy_grant = template.declare(
        &format!("{}LFPolicyTable", id),
        tag_policy_grant(
            domain_id,
            domain_name,
            TagPolicyResourceType::Table,
            vec![Permission::All],
        ),
    )?;
    template.add_dependency(table_policy_grant, tag)?;

    let database_policy_grant = template.declare(
        &format!("{}LFPolicyDatabase", id),
        tag_policy_grant(
            domain_id,
            domain_name,
            TagPolicyResourceType::Database,
            vec![Permission::CreateTable, Permission::Describe],
        ),
    )?;
    template.add_dependency(database_policy_grant, tag)?;

    let all_central_tags: DependencyGroup = central_tags.iter().map(|t| t.handle).collect();
    let mut central_tag_grants = Vec::with_capacity(central_tags.len());
    for central in central_tags {
        let grant = template.declare(
            &format!("{}GrantDataDomainTag{}", id, central.tag.key),
            ResourceKind::PrincipalPermissions(PrincipalPermissionsProps {
                permissions: vec![Permission::Associate],
                permissions_with_grant_option: vec![Permission::Associate],
                principal: DataLakePrincipal::new(domain_id),
                resource: LfResourceTarget::LfTag(LfTagPair {
                    catalog_id: Some(intrinsics::account_id()),
                    tag_key: central.tag.key.clone(),
                    tag_values: central.tag.values.clone(),
                }),
            }),
        )?;
        template.add_group_dependency(grant, &all_central_tags)?;
        central_tag_grants.push(grant);
    }

    Ok(TagSharing {
        tag,
        association,
        tag_grant,
        table_policy_grant,
        database_policy_grant,
        central_tag_grants,
    })
}

fn validate_domain(id: &str, domain_id: &str, domain_name: &str) -> Result<()> {
    let reason = if !id.chars().any(|c| c.is_ascii_alphanumeric()) {
        Some("construct id has no alphanumeric characters".to_string())
    } else if domain_id.len() != 12 || !domain_id.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("account id {:?} is not a 12-digit AWS account id", domain_id))
    } else if domain_name.trim().is_empty() {
        Some("domain name is empty".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => Err(GovernanceError::InvalidDomain {
            id: id.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

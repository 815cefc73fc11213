//! Central Governance
//!
//! Declares the data product registration workflow of the central governance
//! account and registers data domain accounts (producers and consumers).
//!
//! Construction declares, once per governance account:
//! - the central event bus used to talk to data domains
//! - the workflow role, made a Lake Formation administrator together with the
//!   CDK execution role so databases and tags can be created
//! - the optional LF tags shared with tag based domains
//! - the registration state machine, logging everything to a one-week log group
//!
//! ## Example Usage
//!
//! ```ignore
//! use mesh_governance::{CentralGovernance, CentralGovernanceProps, LfTag};
//! use mesh_governance::template::Template;
//! use mesh_secrets::DynamicReferences;
//!
//! let props = CentralGovernanceProps {
//!     lf_tags: vec![LfTag::new("tag1", ["LfTagValue1", "LfTagValue2"])],
//! };
//! let mut governance =
//!     CentralGovernance::new(Template::new(), props, Box::new(DynamicReferences))?;
//! governance.register_data_domain("Domain1", "111111111111", "Sales", SECRET_ARN, None)?;
//! let document = governance.template().render()?;
//! ```

pub mod lake_formation;
pub mod naming;
pub mod onboarding;
pub mod types;
pub mod workflow_role;

use mesh_secrets::SecretResolver;
use tracing::{debug, info};

use crate::error::{GovernanceError, Result};
use crate::intrinsics;
use crate::template::resources::{
    EventBusProps, LfTagProps, LogDestination, LogGroupProps, LogGroupTarget, LogLevel,
    LoggingConfiguration, PolicyProps, StateMachineProps,
};
use crate::template::iam::{PolicyDocument, PolicyStatement};
use crate::template::{RemovalPolicy, ResourceHandle, ResourceKind, Template};
use crate::workflow::{registration_workflow, WorkflowGraph};

pub use lake_formation::S3LocationRegistration;
pub use onboarding::{DomainRegistration, TagSharing};
pub use types::*;
pub use workflow_role::WorkflowRole;

const BUS_ID: &str = "centralEventBus";
const WORKFLOW_ROLE_ID: &str = "WorkflowRole";
const LF_ADMINS_ID: &str = "LfAdmins";
const SEND_EVENTS_ID: &str = "sendEvents";
const LOG_GROUP_ID: &str = "centralGovStateMachineLogs";
const STATE_MACHINE_ID: &str = "RegisterDataProduct";

/// Domain tag declared by the registrar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredTag {
    pub tag: LfTag,
    pub handle: ResourceHandle,
}

/// Central governance account of a data mesh
pub struct CentralGovernance {
    template: Template,
    resolver: Box<dyn SecretResolver>,
    event_bus: ResourceHandle,
    workflow_role: WorkflowRole,
    lf_admins: ResourceHandle,
    lf_tags: Vec<DeclaredTag>,
    domain_tag: Option<ResourceHandle>,
    send_events: ResourceHandle,
    log_group: ResourceHandle,
    state_machine: ResourceHandle,
    workflow: WorkflowGraph,
    registrations: Vec<DomainRegistration>,
}

impl std::fmt::Debug for CentralGovernance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CentralGovernance")
            .field("resources", &self.template.len())
            .field("lf_tags", &self.lf_tags.len())
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

impl CentralGovernance {
    /// Declare the governance account resources into `template`.
    pub fn new(
        mut template: Template,
        props: CentralGovernanceProps,
        resolver: Box<dyn SecretResolver>,
    ) -> Result<Self> {
        validate_tags(&props.lf_tags)?;

        let event_bus = template.declare(
            BUS_ID,
            ResourceKind::EventBus(EventBusProps {
                name: naming::CENTRAL_BUS_NAME.to_string(),
            }),
        )?;
        template.set_removal_policy(event_bus, RemovalPolicy::Destroy)?;

        let workflow_role = workflow_role::declare_workflow_role(&mut template, WORKFLOW_ROLE_ID)?;

        // CDK needs administrative standing to create databases and tags,
        // the workflow needs it to create tables and grant on them
        let admins = vec![
            intrinsics::sub(naming::cdk_exec_role_arn()),
            template.att_of(workflow_role.role, "Arn")?,
        ];
        let lf_admins = lake_formation::declare_lf_admins(&mut template, LF_ADMINS_ID, admins)?;

        let mut lf_tags = Vec::with_capacity(props.lf_tags.len());
        for tag in props.lf_tags {
            let handle = template.declare(
                &format!("CentralLfTag{}", tag.key),
                ResourceKind::LfTag(LfTagProps {
                    catalog_id: intrinsics::account_id(),
                    tag_key: tag.key.clone(),
                    tag_values: tag.values.clone(),
                }),
            )?;
            template.add_dependency(handle, lf_admins)?;
            debug!(key = %tag.key, values = tag.values.len(), "Declared central LF tag");
            lf_tags.push(DeclaredTag { tag, handle });
        }

        let send_events = template.declare(
            SEND_EVENTS_ID,
            ResourceKind::IamPolicy(PolicyProps {
                policy_name: SEND_EVENTS_ID.to_string(),
                policy_document: PolicyDocument::new(vec![PolicyStatement::allow()
                    .action("events:Put*")
                    .resource(template.att_of(event_bus, "Arn")?)]),
                roles: vec![template.ref_of(workflow_role.role)?],
            }),
        )?;

        let bus_arn_placeholder = format!("${{{}.Arn}}", template.logical_id(event_bus)?);
        let workflow = registration_workflow(&bus_arn_placeholder)?;

        let log_group = template.declare(
            LOG_GROUP_ID,
            ResourceKind::LogGroup(LogGroupProps {
                log_group_name: naming::WORKFLOW_LOG_GROUP.to_string(),
                retention_in_days: naming::WORKFLOW_LOG_RETENTION_DAYS,
            }),
        )?;
        template.set_removal_policy(log_group, RemovalPolicy::Destroy)?;

        let state_machine = template.declare(
            STATE_MACHINE_ID,
            ResourceKind::StateMachine(StateMachineProps {
                role_arn: template.att_of(workflow_role.role, "Arn")?,
                definition_string: intrinsics::sub(workflow.to_definition()?),
                state_machine_type: "STANDARD",
                logging_configuration: LoggingConfiguration {
                    level: LogLevel::All,
                    include_execution_data: true,
                    destinations: vec![LogDestination {
                        cloud_watch_logs_log_group: LogGroupTarget {
                            log_group_arn: template.att_of(log_group, "Arn")?,
                        },
                    }],
                },
            }),
        )?;
        // Executions must not start before the role can act
        template.add_dependency(state_machine, workflow_role.policy)?;
        template.add_dependency(state_machine, send_events)?;

        template.add_output(
            "CentralEventBusName",
            template.ref_of(event_bus)?,
            Some("Name of the central data mesh event bus"),
        )?;
        template.add_output(
            "CentralEventBusArn",
            template.att_of(event_bus, "Arn")?,
            Some("ARN of the central data mesh event bus"),
        )?;
        template.add_output(
            "WorkflowRoleArn",
            template.att_of(workflow_role.role, "Arn")?,
            None,
        )?;
        template.add_output(
            "RegisterDataProductStateMachineArn",
            template.ref_of(state_machine)?,
            Some("State machine registering data products of a data domain"),
        )?;

        info!(
            resources = template.len(),
            lf_tags = lf_tags.len(),
            "Central governance declared"
        );

        Ok(Self {
            template,
            resolver,
            event_bus,
            workflow_role,
            lf_admins,
            lf_tags,
            domain_tag: None,
            send_events,
            log_group,
            state_machine,
            workflow,
            registrations: Vec::new(),
        })
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn into_template(self) -> Template {
        self.template
    }

    pub fn event_bus(&self) -> ResourceHandle {
        self.event_bus
    }

    pub fn workflow_role(&self) -> WorkflowRole {
        self.workflow_role
    }

    /// Lake Formation administrator settings
    pub fn lf_admins(&self) -> ResourceHandle {
        self.lf_admins
    }

    pub fn lf_tags(&self) -> &[DeclaredTag] {
        &self.lf_tags
    }

    /// The `LoB` tag, once a tag based domain is registered
    pub fn domain_tag(&self) -> Option<ResourceHandle> {
        self.domain_tag
    }

    pub fn send_events_policy(&self) -> ResourceHandle {
        self.send_events
    }

    pub fn log_group(&self) -> ResourceHandle {
        self.log_group
    }

    pub fn state_machine(&self) -> ResourceHandle {
        self.state_machine
    }

    /// The declared registration workflow
    pub fn workflow(&self) -> &WorkflowGraph {
        &self.workflow
    }

    pub fn registrations(&self) -> &[DomainRegistration] {
        &self.registrations
    }
}

fn validate_tags(tags: &[LfTag]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for tag in tags {
        let reason = if tag.key.is_empty() {
            Some("tag key is empty")
        } else if tag.key == naming::DOMAIN_TAG_KEY {
            Some("tag key is reserved for data domain names")
        } else if tag.values.is_empty() {
            Some("tag has no values")
        } else if !seen.insert(tag.key.as_str()) {
            Some("tag key is declared twice")
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(GovernanceError::InvalidTag {
                key: tag.key.clone(),
                reason: reason.to_string(),
            });
        }
    }
    Ok(())
}

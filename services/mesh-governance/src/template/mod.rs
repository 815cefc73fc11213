//! Resource Graph
//!
//! An arena of declared CloudFormation resources. Every declaration returns a
//! [`ResourceHandle`]; dependency edges are added by passing handles, so a
//! resource can only depend on something that was declared before it.
//!
//! ```ignore
//! let mut template = Template::new();
//! let bus = template.declare("centralEventBus", ResourceKind::EventBus(props))?;
//! let rule = template.declare("Domain1Rule", ResourceKind::EventRule(rule_props))?;
//! template.add_dependency(rule, bus)?;
//! let json = template.render()?;
//! ```

pub mod iam;
pub mod resources;

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use uuid::Uuid;

use crate::intrinsics;
pub use resources::ResourceKind;

const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
const MAX_LOGICAL_ID_LEN: usize = 255;

/// Handle to a resource declared in a [`Template`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    template: Uuid,
    index: usize,
}

/// What happens to a resource when it leaves the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

impl RemovalPolicy {
    fn as_deletion_policy(self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
        }
    }
}

/// A declared resource
#[derive(Debug, Clone)]
pub struct Resource {
    pub logical_id: String,
    pub kind: ResourceKind,
    pub removal_policy: Option<RemovalPolicy>,
    depends_on: BTreeSet<usize>,
}

#[derive(Debug, Clone)]
struct Output {
    name: String,
    value: Value,
    description: Option<String>,
}

/// Handles that can be depended on as a single unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGroup {
    members: Vec<ResourceHandle>,
}

impl DependencyGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, handle: ResourceHandle) {
        if !self.members.contains(&handle) {
            self.members.push(handle);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.members.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl FromIterator<ResourceHandle> for DependencyGroup {
    fn from_iter<I: IntoIterator<Item = ResourceHandle>>(iter: I) -> Self {
        let mut group = Self::new();
        for handle in iter {
            group.add(handle);
        }
        group
    }
}

/// Errors raised while declaring or rendering resources
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("There is already a resource with logical id {0}")]
    DuplicateLogicalId(String),

    #[error("Invalid logical id: {0:?}")]
    InvalidLogicalId(String),

    #[error("Handle does not belong to this template (resource #{0})")]
    UnknownDependency(usize),

    #[error("Resource {0} cannot depend on itself")]
    SelfDependency(String),

    #[error("Resource {dependent} depends on {dependency}, which is declared after it")]
    DanglingOrder { dependent: String, dependency: String },

    #[error("Resource {logical_id} is not a {expected}")]
    UnexpectedKind {
        logical_id: String,
        expected: &'static str,
    },

    #[error("Failed to serialize {logical_id}: {reason}")]
    Serialization { logical_id: String, reason: String },
}

/// A CloudFormation template under construction
#[derive(Debug, Clone)]
pub struct Template {
    id: Uuid,
    description: Option<String>,
    resources: Vec<Resource>,
    logical_ids: HashMap<String, usize>,
    outputs: Vec<Output>,
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

impl Template {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            description: None,
            resources: Vec::new(),
            logical_ids: HashMap::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a resource. The construct id becomes its logical id once
    /// stripped to ASCII alphanumerics.
    pub fn declare(
        &mut self,
        construct_id: &str,
        kind: ResourceKind,
    ) -> Result<ResourceHandle, TemplateError> {
        let logical_id = logical_id_for(construct_id)?;
        if self.logical_ids.contains_key(&logical_id) {
            return Err(TemplateError::DuplicateLogicalId(logical_id));
        }

        let index = self.resources.len();
        self.logical_ids.insert(logical_id.clone(), index);
        self.resources.push(Resource {
            logical_id,
            kind,
            removal_policy: None,
            depends_on: BTreeSet::new(),
        });

        Ok(ResourceHandle {
            template: self.id,
            index,
        })
    }

    /// Order `dependent` after `dependency` in the deployment.
    pub fn add_dependency(
        &mut self,
        dependent: ResourceHandle,
        dependency: ResourceHandle,
    ) -> Result<(), TemplateError> {
        let dependent_index = self.check(dependent)?;
        let dependency_index = self.check(dependency)?;

        if dependent_index == dependency_index {
            return Err(TemplateError::SelfDependency(
                self.resources[dependent_index].logical_id.clone(),
            ));
        }
        if dependency_index > dependent_index {
            return Err(TemplateError::DanglingOrder {
                dependent: self.resources[dependent_index].logical_id.clone(),
                dependency: self.resources[dependency_index].logical_id.clone(),
            });
        }

        self.resources[dependent_index]
            .depends_on
            .insert(dependency_index);
        Ok(())
    }

    /// Order `dependent` after every member of `group`.
    pub fn add_group_dependency(
        &mut self,
        dependent: ResourceHandle,
        group: &DependencyGroup,
    ) -> Result<(), TemplateError> {
        for dependency in group.iter() {
            self.add_dependency(dependent, dependency)?;
        }
        Ok(())
    }

    pub fn set_removal_policy(
        &mut self,
        handle: ResourceHandle,
        policy: RemovalPolicy,
    ) -> Result<(), TemplateError> {
        let index = self.check(handle)?;
        self.resources[index].removal_policy = Some(policy);
        Ok(())
    }

    pub fn resource(&self, handle: ResourceHandle) -> Result<&Resource, TemplateError> {
        let index = self.check(handle)?;
        Ok(&self.resources[index])
    }

    pub fn logical_id(&self, handle: ResourceHandle) -> Result<&str, TemplateError> {
        Ok(self.resource(handle)?.logical_id.as_str())
    }

    /// Logical ids the resource depends on, in declaration order
    pub fn dependencies(&self, handle: ResourceHandle) -> Result<Vec<&str>, TemplateError> {
        let resource = self.resource(handle)?;
        Ok(resource
            .depends_on
            .iter()
            .map(|&i| self.resources[i].logical_id.as_str())
            .collect())
    }

    pub fn depends_on(
        &self,
        dependent: ResourceHandle,
        dependency: ResourceHandle,
    ) -> Result<bool, TemplateError> {
        let dependent_index = self.check(dependent)?;
        let dependency_index = self.check(dependency)?;
        Ok(self.resources[dependent_index]
            .depends_on
            .contains(&dependency_index))
    }

    /// `{"Ref": logical_id}` of a declared resource
    pub fn ref_of(&self, handle: ResourceHandle) -> Result<Value, TemplateError> {
        Ok(intrinsics::reference(self.logical_id(handle)?))
    }

    /// `{"Fn::GetAtt": [logical_id, attribute]}` of a declared resource
    pub fn att_of(&self, handle: ResourceHandle, attribute: &str) -> Result<Value, TemplateError> {
        Ok(intrinsics::get_att(self.logical_id(handle)?, attribute))
    }

    pub fn add_output(
        &mut self,
        name: &str,
        value: Value,
        description: Option<&str>,
    ) -> Result<(), TemplateError> {
        let name = logical_id_for(name)?;
        if self.outputs.iter().any(|o| o.name == name) {
            return Err(TemplateError::DuplicateLogicalId(name));
        }
        self.outputs.push(Output {
            name,
            value,
            description: description.map(str::to_string),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Resources of a CloudFormation type, e.g. `AWS::Glue::Database`
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources
            .iter()
            .filter(move |r| r.kind.resource_type() == resource_type)
    }

    /// Properties of a declared resource, for updates after declaration
    pub fn kind_mut(
        &mut self,
        handle: ResourceHandle,
    ) -> Result<&mut ResourceKind, TemplateError> {
        let index = self.check(handle)?;
        Ok(&mut self.resources[index].kind)
    }

    /// Re-check that every dependency precedes its dependent.
    pub fn validate(&self) -> Result<(), TemplateError> {
        for (index, resource) in self.resources.iter().enumerate() {
            for &dependency in &resource.depends_on {
                if dependency == index {
                    return Err(TemplateError::SelfDependency(resource.logical_id.clone()));
                }
                if dependency > index {
                    return Err(TemplateError::DanglingOrder {
                        dependent: resource.logical_id.clone(),
                        dependency: self.resources[dependency].logical_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Render the CloudFormation template document.
    pub fn render(&self) -> Result<Value, TemplateError> {
        self.validate()?;

        let mut resources = BTreeMap::new();
        for resource in &self.resources {
            let properties =
                resource
                    .kind
                    .properties()
                    .map_err(|e| TemplateError::Serialization {
                        logical_id: resource.logical_id.clone(),
                        reason: e.to_string(),
                    })?;

            let mut body = Map::new();
            body.insert("Type".to_string(), json!(resource.kind.resource_type()));
            body.insert("Properties".to_string(), properties);

            if !resource.depends_on.is_empty() {
                let depends_on: Vec<&str> = resource
                    .depends_on
                    .iter()
                    .map(|&i| self.resources[i].logical_id.as_str())
                    .collect();
                body.insert("DependsOn".to_string(), json!(depends_on));
            }

            if let Some(policy) = resource.removal_policy {
                body.insert("DeletionPolicy".to_string(), json!(policy.as_deletion_policy()));
                body.insert(
                    "UpdateReplacePolicy".to_string(),
                    json!(policy.as_deletion_policy()),
                );
            }

            resources.insert(resource.logical_id.clone(), Value::Object(body));
        }

        let mut document = Map::new();
        document.insert(
            "AWSTemplateFormatVersion".to_string(),
            json!(TEMPLATE_FORMAT_VERSION),
        );
        if let Some(description) = &self.description {
            document.insert("Description".to_string(), json!(description));
        }
        document.insert("Resources".to_string(), json!(resources));

        if !self.outputs.is_empty() {
            let outputs: BTreeMap<&str, Value> = self
                .outputs
                .iter()
                .map(|o| {
                    let mut body = json!({ "Value": o.value });
                    if let Some(description) = &o.description {
                        body["Description"] = json!(description);
                    }
                    (o.name.as_str(), body)
                })
                .collect();
            document.insert("Outputs".to_string(), json!(outputs));
        }

        Ok(Value::Object(document))
    }

    fn check(&self, handle: ResourceHandle) -> Result<usize, TemplateError> {
        if handle.template != self.id || handle.index >= self.resources.len() {
            return Err(TemplateError::UnknownDependency(handle.index));
        }
        Ok(handle.index)
    }
}

fn logical_id_for(construct_id: &str) -> Result<String, TemplateError> {
    let id: String = construct_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    if id.is_empty() || id.len() > MAX_LOGICAL_ID_LEN {
        return Err(TemplateError::InvalidLogicalId(construct_id.to_string()));
    }
    Ok(id)
}

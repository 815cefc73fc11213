//! IAM policy documents

use serde::Serialize;
use serde_json::{json, Value};

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: &'static str,
    pub statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION,
            statement: statements,
        }
    }

    /// Trust policy letting an AWS service assume the role.
    pub fn assumed_by(service: &str) -> Self {
        Self::new(vec![PolicyStatement::allow()
            .action("sts:AssumeRole")
            .principal(json!({ "Service": service }))])
    }

    /// Every action named by any Allow statement.
    pub fn allowed_actions(&self) -> impl Iterator<Item = &str> {
        self.statement
            .iter()
            .filter(|s| s.effect == Effect::Allow)
            .flat_map(|s| s.action.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Value>,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<Value>,
}

impl PolicyStatement {
    pub fn allow() -> Self {
        Self {
            sid: None,
            effect: Effect::Allow,
            principal: None,
            action: Vec::new(),
            resource: Vec::new(),
        }
    }

    pub fn sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action.push(action.into());
        self
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn resource(mut self, resource: impl Into<Value>) -> Self {
        self.resource.push(resource.into());
        self
    }

    pub fn principal(mut self, principal: Value) -> Self {
        self.principal = Some(principal);
        self
    }
}

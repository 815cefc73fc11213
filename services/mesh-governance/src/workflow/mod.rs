//! Step Functions Workflow Graphs
//!
//! Typed Amazon States Language documents. A graph is only declared here;
//! the Step Functions service executes it.
//!
//! Supported states: `Task`, `Choice`, `Pass`, `Map`, `Succeed`, `Fail`.

pub mod registration;

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

pub use registration::registration_workflow;

/// Errors raised while assembling a workflow graph
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("State {0} is declared twice")]
    DuplicateState(String),

    #[error("StartAt names unknown state {0}")]
    MissingStart(String),

    #[error("State {from} transitions to unknown state {to}")]
    UnknownState { from: String, to: String },

    #[error("State {0} must either have Next or End")]
    MissingTransition(String),

    #[error("Failed to serialize workflow: {0}")]
    Serialization(String),
}

/// `ResultPath` of a state. `Discard` renders as JSON `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultPath {
    Discard,
    Path(String),
}

impl Serialize for ResultPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResultPath::Discard => serializer.serialize_none(),
            ResultPath::Path(path) => serializer.serialize_str(path),
        }
    }
}

/// Error handler attached to a Task
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Catcher {
    pub error_equals: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<ResultPath>,
    pub next: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskState {
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<ResultPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub catch: Vec<Catcher>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<bool>,
}

impl TaskState {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            parameters: None,
            result_path: None,
            output_path: None,
            catch: Vec::new(),
            next: None,
            end: None,
        }
    }

    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn result_path(mut self, path: ResultPath) -> Self {
        self.result_path = Some(path);
        self
    }

    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Route the listed errors to `next` instead of failing the execution.
    pub fn catch(mut self, errors: &[&str], result_path: ResultPath, next: &str) -> Self {
        self.catch.push(Catcher {
            error_equals: errors.iter().map(|e| e.to_string()).collect(),
            result_path: Some(result_path),
            next: next.to_string(),
        });
        self
    }

    pub fn next(mut self, state: impl Into<String>) -> Self {
        self.next = Some(state.into());
        self.end = None;
        self
    }

    pub fn end(mut self) -> Self {
        self.next = None;
        self.end = Some(true);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChoiceRule {
    pub variable: String,
    pub string_equals: String,
    pub next: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChoiceState {
    pub choices: Vec<ChoiceRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ChoiceState {
    pub fn new() -> Self {
        Self {
            choices: Vec::new(),
            default: None,
        }
    }

    pub fn when_string_equals(
        mut self,
        variable: impl Into<String>,
        value: impl Into<String>,
        next: impl Into<String>,
    ) -> Self {
        self.choices.push(ChoiceRule {
            variable: variable.into(),
            string_equals: value.into(),
            next: next.into(),
        });
        self
    }

    pub fn otherwise(mut self, next: impl Into<String>) -> Self {
        self.default = Some(next.into());
        self
    }
}

impl Default for ChoiceState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PassState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<ResultPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<bool>,
}

/// Runs `iterator` once per item of `items_path`, in parallel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MapState {
    pub items_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    pub iterator: Box<WorkflowGraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_selector: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<ResultPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Type")]
pub enum State {
    Task(TaskState),
    Choice(ChoiceState),
    Pass(PassState),
    Map(MapState),
    Succeed,
    Fail {
        #[serde(rename = "Error", skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(rename = "Cause", skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
}

impl State {
    /// States this one may hand control to
    fn transitions(&self) -> Vec<&str> {
        match self {
            State::Task(task) => task
                .next
                .iter()
                .map(String::as_str)
                .chain(task.catch.iter().map(|c| c.next.as_str()))
                .collect(),
            State::Choice(choice) => choice
                .choices
                .iter()
                .map(|c| c.next.as_str())
                .chain(choice.default.as_deref())
                .collect(),
            State::Pass(pass) => pass.next.iter().map(String::as_str).collect(),
            State::Map(map) => map.next.iter().map(String::as_str).collect(),
            State::Succeed | State::Fail { .. } => Vec::new(),
        }
    }

    fn is_terminated(&self) -> bool {
        match self {
            State::Task(task) => task.next.is_some() || task.end == Some(true),
            State::Pass(pass) => pass.next.is_some() || pass.end == Some(true),
            State::Map(map) => map.next.is_some() || map.end == Some(true),
            State::Choice(_) | State::Succeed | State::Fail { .. } => true,
        }
    }
}

/// A state machine definition, or the iterator of a Map state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkflowGraph {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub start_at: String,
    pub states: BTreeMap<String, State>,
}

impl WorkflowGraph {
    pub fn new(start_at: impl Into<String>) -> Self {
        Self {
            comment: None,
            start_at: start_at.into(),
            states: BTreeMap::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn add_state(&mut self, name: &str, state: State) -> Result<(), WorkflowError> {
        if self.states.contains_key(name) {
            return Err(WorkflowError::DuplicateState(name.to_string()));
        }
        self.states.insert(name.to_string(), state);
        Ok(())
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    /// Every state, including those nested in Map iterators
    pub fn all_states(&self) -> Vec<(&str, &State)> {
        let mut out = Vec::new();
        for (name, state) in &self.states {
            out.push((name.as_str(), state));
            if let State::Map(map) = state {
                out.extend(map.iterator.all_states());
            }
        }
        out
    }

    /// Tasks calling the given service integration resource suffix,
    /// e.g. `lakeformation:grantPermissions`
    pub fn tasks_calling(&self, integration: &str) -> Vec<&str> {
        self.all_states()
            .into_iter()
            .filter_map(|(name, state)| match state {
                State::Task(task) if task.resource.ends_with(integration) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Check StartAt and every transition, in this graph and nested ones.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if !self.states.contains_key(&self.start_at) {
            return Err(WorkflowError::MissingStart(self.start_at.clone()));
        }

        for (name, state) in &self.states {
            if !state.is_terminated() {
                return Err(WorkflowError::MissingTransition(name.clone()));
            }
            for target in state.transitions() {
                if !self.states.contains_key(target) {
                    return Err(WorkflowError::UnknownState {
                        from: name.clone(),
                        to: target.to_string(),
                    });
                }
            }
            if let State::Map(map) = state {
                map.iterator.validate()?;
            }
        }
        Ok(())
    }

    pub fn to_definition(&self) -> Result<String, WorkflowError> {
        self.validate()?;
        serde_json::to_string(self).map_err(|e| WorkflowError::Serialization(e.to_string()))
    }
}

//! Declarative stack model
//!
//! A stack is a named collection of resources managed as one convergence
//! unit by the remote control plane. The pipeline supplies a
//! `StackDescription` and only ever observes the plane's state through
//! `StackObservation`; it never mirrors resource state locally.

use crate::ids::StackName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Desired state of one stack: name, template, parameters
///
/// Equality is structural: the template is a parsed JSON value and the
/// parameters a sorted map, so key order and whitespace in the source
/// never force a spurious update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    pub name: StackName,
    /// Declarative resource graph; opaque to the pipeline
    pub template: serde_json::Value,
    /// Parameter substitutions applied by the control plane
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl StackDescription {
    pub fn new(name: StackName, template: serde_json::Value) -> Self {
        Self {
            name,
            template,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Whether applying `self` over `applied` would change anything
    pub fn differs_from(&self, applied: &StackDescription) -> bool {
        self.template != applied.template || self.parameters != applied.parameters
    }
}

/// Lifecycle state reported by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackState {
    /// No stack with this name exists
    Absent,
    CreateInProgress,
    UpdateInProgress,
    /// Converged on the last applied description
    Stable,
    Failed,
    /// Update failed and the plane restored the previous description
    RolledBack,
}

impl StackState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StackState::Stable | StackState::Failed | StackState::RolledBack
        )
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            StackState::CreateInProgress | StackState::UpdateInProgress
        )
    }
}

/// One observation of a stack via the control plane's describe call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackObservation {
    pub state: StackState,
    /// Output values exported by the stack, e.g. a service endpoint
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// Remote-reported cause when state is Failed or RolledBack
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl StackObservation {
    pub fn absent() -> Self {
        Self {
            state: StackState::Absent,
            outputs: BTreeMap::new(),
            failure_reason: None,
        }
    }

    pub fn in_state(state: StackState) -> Self {
        Self {
            state,
            outputs: BTreeMap::new(),
            failure_reason: None,
        }
    }
}

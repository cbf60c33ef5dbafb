//! Deployment run results and diagnostics
//!
//! A `DeploymentResult` is created once per orchestrator run and is the
//! only externally observable artifact of that run. It is structured
//! data so calling automation can branch on `outcome` instead of
//! scraping log text.

use crate::ids::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Terminal outcome of a deployment run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentOutcome {
    Success,
    Failed,
    TimedOut,
}

/// Pipeline stage that produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Credentials,
    Publish,
    Reconcile,
    Verify,
    Orchestrate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Credentials => "credentials",
            Stage::Publish => "publish",
            Stage::Reconcile => "reconcile",
            Stage::Verify => "verify",
            Stage::Orchestrate => "orchestrate",
        };
        write!(f, "{}", name)
    }
}

/// One entry in the ordered diagnostics trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub at: DateTime<Utc>,
    pub stage: Stage,
    pub message: String,
}

impl DiagnosticEvent {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.stage, self.at.to_rfc3339(), self.message)
    }
}

/// The sole externally observable artifact of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub run_id: RunId,
    pub outcome: DeploymentOutcome,
    /// Outputs exported by the reconciled stack
    pub stack_outputs: BTreeMap<String, String>,
    /// Ordered trail of everything that happened during the run
    pub diagnostics: Vec<DiagnosticEvent>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DeploymentResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, DeploymentOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serializes_for_automation() {
        let result = DeploymentResult {
            run_id: RunId::generate(),
            outcome: DeploymentOutcome::Failed,
            stack_outputs: BTreeMap::new(),
            diagnostics: vec![DiagnosticEvent::new(Stage::Reconcile, "stack failed")],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "FAILED");
        assert_eq!(json["diagnostics"][0]["stage"], "reconcile");
    }
}

//! Result rendering

use clap::ValueEnum;
use slipway_types::{DeploymentResult, DiagnosticEvent};
use tabled::{Table, Tabled};

/// How to print the deployment result
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// One-line run summary row
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "run")]
    run_id: String,
    outcome: String,
    #[tabled(rename = "duration")]
    duration: String,
    outputs: String,
}

impl SummaryRow {
    fn from_result(result: &DeploymentResult) -> Self {
        let outputs = result
            .stack_outputs
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            run_id: result.run_id.to_string(),
            outcome: format!("{:?}", result.outcome),
            duration: format!("{}s", (result.finished_at - result.started_at).num_seconds()),
            outputs,
        }
    }
}

/// One diagnostic trail row
#[derive(Tabled)]
struct DiagnosticRow {
    at: String,
    stage: String,
    message: String,
}

impl DiagnosticRow {
    fn from_event(event: &DiagnosticEvent) -> Self {
        Self {
            at: event.at.format("%H:%M:%S").to_string(),
            stage: event.stage.to_string(),
            message: event.message.clone(),
        }
    }
}

/// Print a result in the chosen format
pub fn print_result(result: &DeploymentResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Table => {
            println!("{}", Table::new(vec![SummaryRow::from_result(result)]));
            if !result.diagnostics.is_empty() {
                let rows: Vec<DiagnosticRow> = result
                    .diagnostics
                    .iter()
                    .map(DiagnosticRow::from_event)
                    .collect();
                println!("{}", Table::new(rows));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use slipway_types::{DeploymentOutcome, RunId, Stage};
    use std::collections::BTreeMap;

    fn result() -> DeploymentResult {
        DeploymentResult {
            run_id: RunId::generate(),
            outcome: DeploymentOutcome::Success,
            stack_outputs: BTreeMap::from([(
                "ServiceEndpoint".to_string(),
                "alb-123.elb.example.com".to_string(),
            )]),
            diagnostics: vec![DiagnosticEvent::new(
                Stage::Verify,
                "endpoint reported healthy".to_string(),
            )],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_table_renders_outcome_and_outputs() {
        let rendered = Table::new(vec![SummaryRow::from_result(&result())]).to_string();
        assert!(rendered.contains("Success"));
        assert!(rendered.contains("ServiceEndpoint=alb-123.elb.example.com"));
    }

    #[test]
    fn test_diagnostic_rows_carry_stage_and_message() {
        let result = result();
        let rows: Vec<DiagnosticRow> = result
            .diagnostics
            .iter()
            .map(DiagnosticRow::from_event)
            .collect();
        let rendered = Table::new(rows).to_string();
        assert!(rendered.contains("verify"));
        assert!(rendered.contains("endpoint reported healthy"));
    }
}

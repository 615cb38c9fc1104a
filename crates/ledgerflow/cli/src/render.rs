//! Event and report rendering for the terminal.

use ledgerflow_engine::{
    EventSink, Stage, StageOutcome, WorkflowEvent, WorkflowHalted, WorkflowReport, WorkflowState,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// How events and results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One human-readable line per event
    Text,
    /// One JSON object per line
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Text
    }
}

impl OutputFormat {
    pub fn sink(self) -> Arc<dyn EventSink> {
        match self {
            Self::Text => Arc::new(ConsoleEventSink),
            Self::Json => Arc::new(JsonLinesEventSink),
        }
    }
}

/// Prints events as short status lines.
pub struct ConsoleEventSink;

impl EventSink for ConsoleEventSink {
    fn emit(&self, event: &WorkflowEvent) {
        if let Some(line) = describe(event) {
            println!("{line}");
        }
    }
}

/// Prints every event as a JSON line on stdout.
pub struct JsonLinesEventSink;

impl EventSink for JsonLinesEventSink {
    fn emit(&self, event: &WorkflowEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!(error = %err, "Unserializable workflow event"),
        }
    }
}

/// Text form of an event; `None` for events not worth a line.
pub fn describe(event: &WorkflowEvent) -> Option<String> {
    let line = match event {
        WorkflowEvent::WorkflowStarted {
            workflow_id,
            workflow,
        } => format!("▶ {workflow} workflow {workflow_id}"),
        WorkflowEvent::StageStarted { stage } => format!("  {stage}: submitting"),
        WorkflowEvent::Submitted {
            stage,
            tx_ref,
            preliminary,
            accepted,
            attempt,
        } => match (accepted, tx_ref) {
            (true, Some(tx_ref)) => {
                format!("  {stage}: submitted {tx_ref} ({preliminary}, attempt {attempt})")
            }
            _ => format!("  {stage}: not accepted ({preliminary}, attempt {attempt})"),
        },
        WorkflowEvent::Resubmitting {
            stage,
            attempt,
            code,
            delay_ms,
        } => format!("  {stage}: {code}, resubmitting (attempt {attempt}) in {delay_ms}ms"),
        WorkflowEvent::Confirmed {
            stage,
            tx_ref,
            result,
            ledger_index,
        } => match ledger_index {
            Some(index) => format!("  {stage}: {result} in ledger {index} ({})", tx_ref.short()),
            None => format!("  {stage}: {result} ({})", tx_ref.short()),
        },
        WorkflowEvent::Unconfirmed {
            stage, attempts, ..
        } => format!("  {stage}: not validated after {attempts} checks"),
        WorkflowEvent::IdentifierResolved {
            stage,
            identifier,
            attempts,
        } => format!("  {stage}: identifier {identifier} (lookup {attempts})"),
        WorkflowEvent::IdentifierMissing {
            stage,
            tx_ref,
            attempts,
        } => format!("  {stage}: no identifier on {tx_ref} after {attempts} lookups"),
        WorkflowEvent::StageFailed {
            stage,
            message,
            fatal,
            ..
        } => {
            let mark = if *fatal { "✗" } else { "!" };
            format!("{mark} {stage}: {message}")
        }
        WorkflowEvent::HoldingsObserved {
            account,
            class,
            holdings,
        } => {
            let mut line = format!("  {account} {class}: {} object(s)", holdings.len());
            for holding in holdings {
                let id = holding.issuance_id.as_deref().or(holding.object_id.as_deref());
                line.push_str(&format!(
                    "\n    {} = {}",
                    id.unwrap_or("-"),
                    holding.amount.as_deref().unwrap_or("-")
                ));
            }
            line
        }
        WorkflowEvent::ObservationFailed {
            account,
            class,
            message,
        } => format!("! {account} {class}: {message}"),
        WorkflowEvent::WorkflowHalted {
            stage,
            kind,
            last_reference,
            ..
        } => match last_reference {
            Some(reference) => format!("✗ halted at {stage} ({kind:?}); last transaction {reference}"),
            None => format!("✗ halted at {stage} ({kind:?})"),
        },
        WorkflowEvent::WorkflowCompleted { stages, .. } => {
            format!("✓ completed, {stages} stage(s) recorded")
        }
        WorkflowEvent::Transitioned { .. } => return None,
    };
    Some(line)
}

/// Final report on stdout.
pub fn print_report<S: Stage>(report: &WorkflowReport<S>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Text => {
            println!("Final stage: {}", report.stage.name());
            if let Some(identifier) = &report.identifier {
                println!("Identifier:  {identifier}");
            }
            print_records(&report.state);
        }
    }
}

/// Journal of a single-stage workflow.
pub fn print_state(state: &WorkflowState, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(state),
        OutputFormat::Text => print_records(state),
    }
}

/// Halt summary: stderr in text mode, a JSON object on stdout otherwise.
pub fn print_halted(halted: &WorkflowHalted, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&json!({
            "halted_at": halted.stage,
            "kind": halted.kind(),
            "error": halted.error.to_string(),
            "last_reference": halted.last_reference,
            "state": halted.state,
        })),
        OutputFormat::Text => {
            eprintln!("error: {halted}");
            print_records(&halted.state);
        }
    }
}

fn print_records(state: &WorkflowState) {
    for record in state.records() {
        let status = match &record.outcome {
            StageOutcome::Completed { verdict } => format!("{verdict:?}"),
            StageOutcome::Failed { kind, .. } => format!("failed ({kind:?})"),
            StageOutcome::Observed { holdings } => format!("{holdings} holding(s)"),
        };
        let reference = record.reference().map(|r| r.to_string()).unwrap_or_default();
        println!(
            "  #{} {:<14} {:<22} {}",
            record.index,
            record.stage.name(),
            status,
            reference
        );
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::warn!(error = %err, "Unserializable report"),
    }
}

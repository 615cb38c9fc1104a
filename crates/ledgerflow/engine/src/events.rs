//! Structured workflow events.
//!
//! The orchestrators and the lifecycle describe what happened through
//! [`WorkflowEvent`]s; rendering them for people is the sink's business.

use crate::error::ErrorKind;
use crate::policy::StageKind;
use crate::state_reader::{Holding, HoldingClass};
use ledgerflow_types::{AccountRef, DerivedIdentifier, EngineResult, TxRef};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    WorkflowStarted {
        workflow_id: Uuid,
        workflow: String,
    },
    StageStarted {
        stage: StageKind,
    },
    Submitted {
        stage: StageKind,
        tx_ref: Option<TxRef>,
        preliminary: EngineResult,
        accepted: bool,
        attempt: u32,
    },
    Resubmitting {
        stage: StageKind,
        attempt: u32,
        code: EngineResult,
        delay_ms: u64,
    },
    Confirmed {
        stage: StageKind,
        tx_ref: TxRef,
        result: EngineResult,
        ledger_index: Option<u64>,
    },
    Unconfirmed {
        stage: StageKind,
        tx_ref: Option<TxRef>,
        attempts: u32,
    },
    IdentifierResolved {
        stage: StageKind,
        identifier: DerivedIdentifier,
        attempts: u32,
    },
    IdentifierMissing {
        stage: StageKind,
        tx_ref: TxRef,
        attempts: u32,
    },
    StageFailed {
        stage: StageKind,
        kind: ErrorKind,
        message: String,
        fatal: bool,
    },
    Transitioned {
        from: String,
        to: String,
    },
    HoldingsObserved {
        account: AccountRef,
        class: HoldingClass,
        holdings: Vec<Holding>,
    },
    ObservationFailed {
        account: AccountRef,
        class: HoldingClass,
        message: String,
    },
    WorkflowHalted {
        workflow_id: Uuid,
        stage: StageKind,
        kind: ErrorKind,
        last_reference: Option<TxRef>,
    },
    WorkflowCompleted {
        workflow_id: Uuid,
        stages: usize,
    },
}

/// Receives events as they happen. Must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &WorkflowEvent);
}

/// Forwards events to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::StageFailed {
                stage,
                kind,
                message,
                fatal,
            } => tracing::warn!(stage = %stage, kind = ?kind, fatal, "{message}"),
            WorkflowEvent::WorkflowHalted {
                workflow_id,
                stage,
                kind,
                last_reference,
            } => tracing::error!(
                workflow_id = %workflow_id,
                stage = %stage,
                kind = ?kind,
                last_reference = ?last_reference.as_ref().map(TxRef::as_str),
                "Workflow halted"
            ),
            other => match serde_json::to_string(other) {
                Ok(json) => tracing::info!(event = %json, "Workflow event"),
                Err(err) => tracing::warn!(error = %err, "Unserializable workflow event"),
            },
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().clone()
    }

    pub fn transitions(&self) -> Vec<(String, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                WorkflowEvent::Transitioned { from, to } => Some((from.clone(), to.clone())),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &WorkflowEvent) {
        self.events.lock().push(event.clone());
    }
}

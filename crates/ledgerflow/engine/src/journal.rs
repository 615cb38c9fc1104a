//! Append-only workflow journal.

use crate::error::{ErrorKind, FlowError};
use crate::lifecycle::LifecycleOutcome;
use crate::policy::StageKind;
use chrono::{DateTime, Utc};
use ledgerflow_types::{
    ConfirmationOutcome, DerivedIdentifier, SubmissionResult, TransactionDescriptor, TxRef, Verdict,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Completed {
        verdict: Verdict,
    },
    Failed {
        kind: ErrorKind,
        message: String,
        fatal: bool,
    },
    /// Verification read this many holdings.
    Observed {
        holdings: usize,
    },
}

impl StageOutcome {
    pub fn failed(error: &FlowError, fatal: bool) -> Self {
        Self::Failed {
            kind: error.kind(),
            message: error.to_string(),
            fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Failed { fatal: true, .. })
    }
}

/// Hash-chained journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub index: u64,
    pub stage: StageKind,
    pub descriptor: Option<TransactionDescriptor>,
    pub submission: Option<SubmissionResult>,
    pub confirmation: Option<ConfirmationOutcome>,
    pub identifier: Option<DerivedIdentifier>,
    pub outcome: StageOutcome,
    pub recorded_at: DateTime<Utc>,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

impl StageRecord {
    /// The reference this stage's transaction was accepted under, if any.
    pub fn reference(&self) -> Option<&TxRef> {
        self.confirmation
            .as_ref()
            .map(|c| &c.reference)
            .or_else(|| self.submission.as_ref().and_then(|s| s.reference.as_ref()))
    }
}

/// Contents of a record before it is chained.
#[derive(Debug, Clone)]
pub struct StageEntry {
    pub stage: StageKind,
    pub descriptor: Option<TransactionDescriptor>,
    pub submission: Option<SubmissionResult>,
    pub confirmation: Option<ConfirmationOutcome>,
    pub identifier: Option<DerivedIdentifier>,
    pub outcome: StageOutcome,
}

impl StageEntry {
    pub fn new(stage: StageKind, outcome: StageOutcome) -> Self {
        Self {
            stage,
            descriptor: None,
            submission: None,
            confirmation: None,
            identifier: None,
            outcome,
        }
    }

    pub fn with_descriptor(mut self, descriptor: TransactionDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: Option<LifecycleOutcome>) -> Self {
        if let Some(lifecycle) = lifecycle {
            self.submission = Some(lifecycle.submission);
            self.confirmation = lifecycle.confirmation;
        }
        self
    }

    pub fn with_identifier(mut self, identifier: DerivedIdentifier) -> Self {
        self.identifier = Some(identifier);
        self
    }
}

/// Ordered history of one workflow run. Records are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    workflow_id: Uuid,
    records: Vec<StageRecord>,
}

impl WorkflowState {
    pub fn new(workflow_id: Uuid) -> Self {
        Self {
            workflow_id,
            records: Vec::new(),
        }
    }

    pub fn workflow_id(&self) -> Uuid {
        self.workflow_id
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&StageRecord> {
        self.records.last()
    }

    pub fn record_for(&self, stage: StageKind) -> Option<&StageRecord> {
        self.records.iter().find(|record| record.stage == stage)
    }

    /// Most recent transaction reference anywhere in the journal.
    pub fn last_reference(&self) -> Option<&TxRef> {
        self.records.iter().rev().find_map(StageRecord::reference)
    }

    pub fn append(&mut self, entry: StageEntry) -> &StageRecord {
        let index = self.records.len() as u64;
        let recorded_at = Utc::now();
        let previous_hash = self.records.last().map(|r| r.entry_hash.clone());

        let mut record = StageRecord {
            index,
            stage: entry.stage,
            descriptor: entry.descriptor,
            submission: entry.submission,
            confirmation: entry.confirmation,
            identifier: entry.identifier,
            outcome: entry.outcome,
            recorded_at,
            previous_hash,
            entry_hash: String::new(),
        };
        record.entry_hash = compute_entry_hash(&self.workflow_id, &record);

        tracing::debug!(
            workflow_id = %self.workflow_id,
            index,
            stage = %record.stage,
            "Stage recorded"
        );
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub fn verify_chain(&self) -> bool {
        let mut previous_hash: Option<&str> = None;
        for (position, record) in self.records.iter().enumerate() {
            if record.index != position as u64 {
                return false;
            }
            if record.previous_hash.as_deref() != previous_hash {
                return false;
            }
            if record.entry_hash != compute_entry_hash(&self.workflow_id, record) {
                return false;
            }
            previous_hash = Some(&record.entry_hash);
        }
        true
    }
}

fn compute_entry_hash(workflow_id: &Uuid, record: &StageRecord) -> String {
    let material = serde_json::json!({
        "workflow_id": workflow_id,
        "index": record.index,
        "stage": record.stage,
        "descriptor": record.descriptor,
        "submission": record.submission,
        "confirmation": record.confirmation,
        "identifier": record.identifier,
        "outcome": record.outcome,
        "recorded_at": record.recorded_at,
        "previous_hash": record.previous_hash,
    });

    let bytes = serde_json::to_vec(&material).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerflow_types::AccountRef;

    fn authorization_entry() -> StageEntry {
        let holder = AccountRef::parse("rNB4HFHi7Cqoz9Uv8x6JzBrn4xLBKeQLTt").unwrap();
        StageEntry::new(
            StageKind::Authorization,
            StageOutcome::Completed {
                verdict: Verdict::Success,
            },
        )
        .with_descriptor(TransactionDescriptor::mpt_authorize(
            holder,
            &DerivedIdentifier::new("ABCD1234"),
        ))
        .with_identifier(DerivedIdentifier::new("ABCD1234"))
    }

    #[test]
    fn verifies_hash_chain() {
        let mut state = WorkflowState::new(Uuid::new_v4());
        state.append(authorization_entry());
        state.append(StageEntry::new(
            StageKind::Verification,
            StageOutcome::Observed { holdings: 2 },
        ));

        assert_eq!(state.len(), 2);
        assert_eq!(
            state.records()[1].previous_hash.as_deref(),
            Some(state.records()[0].entry_hash.as_str())
        );
        assert!(state.verify_chain());
    }

    #[test]
    fn detects_tampered_records() {
        let mut state = WorkflowState::new(Uuid::new_v4());
        state.append(authorization_entry());

        // Rewrite history outside the append API.
        let mut tampered = state.clone();
        tampered.records[0].identifier = Some(DerivedIdentifier::new("FFFF0000"));
        assert!(!tampered.verify_chain());

        let mut reordered = state.clone();
        reordered.records[0].index = 3;
        assert!(!reordered.verify_chain());
    }

    #[test]
    fn last_reference_skips_records_without_one() {
        let mut state = WorkflowState::new(Uuid::new_v4());
        state.append(StageEntry::new(
            StageKind::Verification,
            StageOutcome::Observed { holdings: 0 },
        ));
        assert!(state.last_reference().is_none());
        assert!(!state.last().unwrap().outcome.is_fatal());
    }
}

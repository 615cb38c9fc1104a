//! Workflow stage enumerations and the forward-only machine that walks them.

use crate::error::FlowError;
use serde::Serialize;
use std::fmt::Debug;

/// A workflow's stage enumeration.
pub trait Stage: Copy + Eq + Debug + Serialize + Send + Sync {
    const INITIAL: Self;

    fn name(self) -> &'static str;
}

/// Stages of the issue → authorize → transfer → report workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Created,
    AuthorizationRequested,
    AuthorizationResolved,
    TransferSubmitted,
    TransferResolved,
    Reported,
}

impl Stage for WorkflowStage {
    const INITIAL: Self = Self::Created;

    fn name(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AuthorizationRequested => "authorization_requested",
            Self::AuthorizationResolved => "authorization_resolved",
            Self::TransferSubmitted => "transfer_submitted",
            Self::TransferResolved => "transfer_resolved",
            Self::Reported => "reported",
        }
    }
}

/// Stages of the lock → release → report escrow workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStage {
    Created,
    Locked,
    ReleaseSubmitted,
    ReleaseResolved,
    Reported,
}

impl Stage for EscrowStage {
    const INITIAL: Self = Self::Created;

    fn name(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Locked => "locked",
            Self::ReleaseSubmitted => "release_submitted",
            Self::ReleaseResolved => "release_resolved",
            Self::Reported => "reported",
        }
    }
}

/// Forward-only stage tracker. A transition names the stage it expects to
/// leave, so a skipped or repeated step is an error rather than a silent jump.
#[derive(Debug, Clone)]
pub struct StageMachine<S: Stage> {
    stage: S,
}

impl<S: Stage> Default for StageMachine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Stage> StageMachine<S> {
    pub fn new() -> Self {
        Self { stage: S::INITIAL }
    }

    pub fn current(&self) -> S {
        self.stage
    }

    /// Move `expected -> next`, returning the stage left.
    pub fn advance(&mut self, expected: S, next: S) -> Result<S, FlowError> {
        if self.stage != expected {
            return Err(FlowError::stage_violation(expected.name(), self.stage.name()));
        }
        self.stage = next;
        Ok(expected)
    }
}

impl StageMachine<WorkflowStage> {
    pub fn mark_authorization_requested(&mut self) -> Result<WorkflowStage, FlowError> {
        self.advance(WorkflowStage::Created, WorkflowStage::AuthorizationRequested)
    }

    pub fn mark_authorization_resolved(&mut self) -> Result<WorkflowStage, FlowError> {
        self.advance(
            WorkflowStage::AuthorizationRequested,
            WorkflowStage::AuthorizationResolved,
        )
    }

    pub fn mark_transfer_submitted(&mut self) -> Result<WorkflowStage, FlowError> {
        self.advance(
            WorkflowStage::AuthorizationResolved,
            WorkflowStage::TransferSubmitted,
        )
    }

    pub fn mark_transfer_resolved(&mut self) -> Result<WorkflowStage, FlowError> {
        self.advance(WorkflowStage::TransferSubmitted, WorkflowStage::TransferResolved)
    }

    pub fn mark_reported(&mut self) -> Result<WorkflowStage, FlowError> {
        self.advance(WorkflowStage::TransferResolved, WorkflowStage::Reported)
    }
}

impl StageMachine<EscrowStage> {
    pub fn mark_locked(&mut self) -> Result<EscrowStage, FlowError> {
        self.advance(EscrowStage::Created, EscrowStage::Locked)
    }

    pub fn mark_release_submitted(&mut self) -> Result<EscrowStage, FlowError> {
        self.advance(EscrowStage::Locked, EscrowStage::ReleaseSubmitted)
    }

    pub fn mark_release_resolved(&mut self) -> Result<EscrowStage, FlowError> {
        self.advance(EscrowStage::ReleaseSubmitted, EscrowStage::ReleaseResolved)
    }

    pub fn mark_reported(&mut self) -> Result<EscrowStage, FlowError> {
        self.advance(EscrowStage::ReleaseResolved, EscrowStage::Reported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_stages_advance_in_order() {
        let mut machine = StageMachine::<WorkflowStage>::new();
        assert!(machine.mark_authorization_requested().is_ok());
        assert!(machine.mark_authorization_resolved().is_ok());
        assert!(machine.mark_transfer_submitted().is_ok());
        assert!(machine.mark_transfer_resolved().is_ok());
        assert!(machine.mark_reported().is_ok());
        assert_eq!(machine.current(), WorkflowStage::Reported);
    }

    #[test]
    fn rejects_skipping_authorization() {
        let mut machine = StageMachine::<WorkflowStage>::new();
        let err = machine.mark_transfer_submitted().unwrap_err();
        assert!(err
            .to_string()
            .contains("expected 'authorization_resolved', got 'created'"));
        assert_eq!(machine.current(), WorkflowStage::Created);
    }

    #[test]
    fn escrow_stages_cannot_repeat() {
        let mut machine = StageMachine::<EscrowStage>::new();
        machine.mark_locked().unwrap();
        assert!(machine.mark_locked().is_err());
        assert_eq!(machine.current(), EscrowStage::Locked);
    }
}

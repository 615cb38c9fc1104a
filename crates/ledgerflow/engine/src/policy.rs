//! Per-stage failure policy.

use crate::error::{ErrorKind, FlowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Issuance,
    Authorization,
    Transfer,
    Verification,
    EscrowCreate,
    EscrowFinish,
    /// AMM pool deposit.
    Deposit,
}

impl StageKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Issuance => "issuance",
            Self::Authorization => "authorization",
            Self::Transfer => "transfer",
            Self::Verification => "verification",
            Self::EscrowCreate => "escrow_create",
            Self::EscrowFinish => "escrow_finish",
            Self::Deposit => "deposit",
        }
    }

    /// Stages whose output a later stage consumes.
    pub fn produces_identifier(self) -> bool {
        matches!(self, Self::Issuance | Self::EscrowCreate)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Halt the workflow.
    Fatal,
    /// Record the failure and continue.
    NonFatal,
}

/// `stage -> fatal | non-fatal`.
///
/// Identifier-producing stages are fatal and verification is non-fatal no
/// matter what the table says. Transport failures and cancellation halt any
/// stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StagePolicyTable {
    policies: BTreeMap<StageKind, FailurePolicy>,
}

impl Default for StagePolicyTable {
    fn default() -> Self {
        let policies = [
            (StageKind::Issuance, FailurePolicy::Fatal),
            (StageKind::Authorization, FailurePolicy::NonFatal),
            (StageKind::Transfer, FailurePolicy::NonFatal),
            (StageKind::Verification, FailurePolicy::NonFatal),
            (StageKind::EscrowCreate, FailurePolicy::Fatal),
            (StageKind::EscrowFinish, FailurePolicy::NonFatal),
            (StageKind::Deposit, FailurePolicy::NonFatal),
        ]
        .into_iter()
        .collect();
        Self { policies }
    }
}

impl StagePolicyTable {
    pub fn set(&mut self, stage: StageKind, policy: FailurePolicy) -> &mut Self {
        self.policies.insert(stage, policy);
        self
    }

    pub fn policy_for(&self, stage: StageKind) -> FailurePolicy {
        if stage.produces_identifier() {
            return FailurePolicy::Fatal;
        }
        if stage == StageKind::Verification {
            return FailurePolicy::NonFatal;
        }
        self.policies
            .get(&stage)
            .copied()
            .unwrap_or(FailurePolicy::Fatal)
    }

    pub fn is_fatal(&self, stage: StageKind, error: &FlowError) -> bool {
        match error.kind() {
            ErrorKind::Transport | ErrorKind::Cancelled => stage != StageKind::Verification,
            _ => self.policy_for(stage) == FailurePolicy::Fatal,
        }
    }
}

//! Submission acknowledgements and confirmation outcomes.

use crate::ids::TxRef;
use crate::result::{EngineResult, ResultClass};
use serde::{Deserialize, Serialize};

/// Immediate acknowledgement of one submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    /// The network took the transaction for relay.
    pub accepted: bool,
    /// Present only when `accepted`.
    pub reference: Option<TxRef>,
    /// Preliminary engine result from the receiving server.
    pub preliminary: EngineResult,
    /// Human readable explanation of the preliminary result, if any.
    pub raw_error: Option<String>,
}

impl SubmissionResult {
    pub fn accepted(reference: TxRef, preliminary: EngineResult) -> Self {
        Self {
            accepted: true,
            reference: Some(reference),
            preliminary,
            raw_error: None,
        }
    }

    pub fn rejected(preliminary: EngineResult, raw_error: Option<String>) -> Self {
        Self {
            accepted: false,
            reference: None,
            preliminary,
            raw_error,
        }
    }

    pub fn class(&self) -> ResultClass {
        self.preliminary.classify()
    }
}

/// Final word from the ledger on a relayed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationOutcome {
    pub reference: TxRef,
    /// `meta.TransactionResult` of the validated transaction.
    pub result: EngineResult,
    pub validated: bool,
    pub ledger_index: Option<u64>,
}

impl ConfirmationOutcome {
    pub fn is_success(&self) -> bool {
        self.validated && self.result.is_success()
    }
}

/// Overall classification of a finished transaction lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    PermanentFailure,
    TemporaryFailure,
    Unconfirmed,
    Cancelled,
}

impl From<ResultClass> for Verdict {
    /// A pending result that is still pending when a lifecycle ends was never
    /// confirmed.
    fn from(class: ResultClass) -> Self {
        match class {
            ResultClass::Success => Self::Success,
            ResultClass::Permanent => Self::PermanentFailure,
            ResultClass::Temporary => Self::TemporaryFailure,
            ResultClass::Pending => Self::Unconfirmed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_follows_classification() {
        let verdict = |code: &str| Verdict::from(EngineResult::parse(code).unwrap().classify());
        assert_eq!(verdict("tesSUCCESS"), Verdict::Success);
        assert_eq!(verdict("tecUNFUNDED_PAYMENT"), Verdict::PermanentFailure);
        assert_eq!(verdict("telINSUF_FEE_P"), Verdict::TemporaryFailure);
        assert_eq!(verdict("terQUEUED"), Verdict::Unconfirmed);
    }

    #[test]
    fn confirmation_success_requires_validation() {
        let reference = TxRef::parse("D".repeat(64)).unwrap();
        let outcome = ConfirmationOutcome {
            reference,
            result: EngineResult::success(),
            validated: false,
            ledger_index: None,
        };
        assert!(!outcome.is_success());
    }
}

use ledgerflow_types::{EngineResult, TxRef, TypesError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No interpretable answer from the network; acceptance is unknown.
    Transport,
    /// The ledger refused the transaction with a permanent result.
    Rejection,
    /// The transaction was not seen in a validated ledger within the bound.
    Timeout,
    /// A derived identifier never appeared on a confirmed transaction.
    NotFound,
    /// A read-only state query failed.
    Observability,
    Cancelled,
    /// A condition required before submitting does not hold.
    Precondition,
    Configuration,
}

/// Ledgerflow engine errors.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    #[error("Transport failure during {operation}: {message}")]
    Transport { operation: String, message: String },

    #[error("Malformed response to {operation}: {message}")]
    MalformedResponse { operation: String, message: String },

    #[error("Transaction rejected with {code}{}", reference_suffix(.reference))]
    Rejected {
        code: EngineResult,
        reference: Option<TxRef>,
    },

    #[error("Transaction not confirmed after {attempts} attempts{}", reference_suffix(.reference))]
    Unconfirmed {
        reference: Option<TxRef>,
        attempts: u32,
    },

    #[error("Identifier '{field}' absent from {reference} after {attempts} lookups")]
    IdentifierNotFound {
        field: &'static str,
        reference: TxRef,
        attempts: u32,
    },

    #[error("State query failed: {0}")]
    Observability(String),

    #[error("Cancelled{}", reference_suffix(.reference))]
    Cancelled { reference: Option<TxRef> },

    #[error("Submission refused by server ({code}): {message}")]
    SubmitRefused { code: String, message: String },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Stage order violation: expected '{expected}', got '{actual}'")]
    StageViolation {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Types(#[from] TypesError),
}

fn reference_suffix(reference: &Option<TxRef>) -> String {
    match reference {
        Some(reference) => format!(" (last transaction {reference})"),
        None => String::new(),
    }
}

impl FlowError {
    pub fn transport(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn malformed(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::MalformedResponse {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn stage_violation(expected: &'static str, actual: &'static str) -> Self {
        Self::StageViolation { expected, actual }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::MalformedResponse { .. } => ErrorKind::Transport,
            Self::Rejected { .. } => ErrorKind::Rejection,
            Self::Unconfirmed { .. } => ErrorKind::Timeout,
            Self::IdentifierNotFound { .. } => ErrorKind::NotFound,
            Self::Observability(_) => ErrorKind::Observability,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::SubmitRefused { .. }
            | Self::Precondition(_)
            | Self::StageViolation { .. }
            | Self::Types(_) => ErrorKind::Precondition,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// The most recent transaction reference the error knows about.
    pub fn last_reference(&self) -> Option<&TxRef> {
        match self {
            Self::Rejected { reference, .. }
            | Self::Unconfirmed { reference, .. }
            | Self::Cancelled { reference } => reference.as_ref(),
            Self::IdentifierNotFound { reference, .. } => Some(reference),
            _ => None,
        }
    }
}

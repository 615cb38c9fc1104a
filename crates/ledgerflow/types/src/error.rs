use thiserror::Error;

/// Errors raised while constructing or parsing ledger data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid account address: '{0}'")]
    InvalidAccount(String),

    #[error("Invalid transaction reference: '{0}'")]
    InvalidTxRef(String),

    #[error("Unknown engine result code: '{0}'")]
    UnknownResultCode(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid currency code: '{0}'")]
    InvalidCurrency(String),

    #[error("Invalid issuance parameters: {0}")]
    InvalidIssuance(String),

    #[error("Invalid escrow parameters: {0}")]
    InvalidEscrow(String),

    #[error("Time out of ledger range: {0}")]
    TimeOutOfRange(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

//! Boundary traits for the ledger network client and signing identities.

use crate::error::FlowError;
use async_trait::async_trait;
use ledgerflow_types::{AccountRef, SubmissionResult, TransactionDescriptor, TxRef};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Read-only request kinds issued by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerQuery {
    TransactionLookup {
        reference: TxRef,
    },
    AccountInfo {
        account: AccountRef,
    },
    AccountObjects {
        account: AccountRef,
        object_type: Option<String>,
        limit: u32,
        marker: Option<Value>,
    },
}

impl LedgerQuery {
    pub fn method(&self) -> &'static str {
        match self {
            Self::TransactionLookup { .. } => "tx",
            Self::AccountInfo { .. } => "account_info",
            Self::AccountObjects { .. } => "account_objects",
        }
    }

    /// Request parameters in the network's JSON shape. Account state is always
    /// read from the validated ledger.
    pub fn params(&self) -> Value {
        match self {
            Self::TransactionLookup { reference } => json!({
                "transaction": reference.as_str(),
                "binary": false,
            }),
            Self::AccountInfo { account } => json!({
                "account": account.as_str(),
                "ledger_index": "validated",
            }),
            Self::AccountObjects {
                account,
                object_type,
                limit,
                marker,
            } => {
                let mut params = json!({
                    "account": account.as_str(),
                    "ledger_index": "validated",
                    "limit": limit,
                });
                if let Some(object_type) = object_type {
                    params["type"] = json!(object_type);
                }
                if let Some(marker) = marker {
                    params["marker"] = marker.clone();
                }
                params
            }
        }
    }
}

/// A response the network produced. Error responses such as `txnNotFound`
/// are answers, not failures; only the absence of any answer is an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryResponse {
    Success { result: Value },
    Error { code: String, message: Option<String> },
}

impl QueryResponse {
    pub fn success(result: Value) -> Self {
        Self::Success { result }
    }

    pub fn error(code: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: None,
        }
    }

    pub fn is_error_code(&self, expected: &str) -> bool {
        matches!(self, Self::Error { code, .. } if code == expected)
    }
}

/// How a signing identity authorizes a submission.
#[derive(Clone, PartialEq, Eq)]
pub enum SubmitAuthorization {
    /// A transaction already signed elsewhere.
    SignedBlob(String),
    /// Let the server sign with the account's secret (trusted endpoints only).
    ServerSign { secret: String },
}

impl fmt::Debug for SubmitAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignedBlob(blob) => f.debug_tuple("SignedBlob").field(blob).finish(),
            Self::ServerSign { .. } => f
                .debug_struct("ServerSign")
                .field("secret", &"<redacted>")
                .finish(),
        }
    }
}

/// An account reference plus the capability to authorize submissions for it.
pub trait SigningIdentity: Send + Sync {
    fn account(&self) -> &AccountRef;

    fn authorize(&self, tx_json: &Value) -> Result<SubmitAuthorization, FlowError>;
}

/// Opaque RPC boundary to the ledger network.
///
/// Implementations serialize requests: at most one is in flight at a time.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn connect(&self) -> Result<(), FlowError>;

    async fn disconnect(&self) -> Result<(), FlowError>;

    async fn submit(
        &self,
        descriptor: &TransactionDescriptor,
        signer: &dyn SigningIdentity,
    ) -> Result<SubmissionResult, FlowError>;

    async fn query(&self, query: &LedgerQuery) -> Result<QueryResponse, FlowError>;
}

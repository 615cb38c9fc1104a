//! Derived-identifier resolution.
//!
//! Metadata on a validated transaction can trail its validation, so the
//! resolver re-reads the transaction a bounded number of times before
//! declaring the identifier absent.

use crate::cancel::CancelSignal;
use crate::client::{LedgerClient, LedgerQuery, QueryResponse};
use crate::error::FlowError;
use crate::retry::{poll, PollOutcome, RetryPolicy, Sleeper};
use ledgerflow_types::{ConfirmationOutcome, DerivedIdentifier};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Where on a transaction record a derived identifier lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierField {
    /// `meta.mpt_issuance_id` of an issuance creation.
    MptIssuanceId,
    /// The sequence the transaction consumed (escrow offer sequence).
    AccountSequence,
}

impl IdentifierField {
    pub fn name(self) -> &'static str {
        match self {
            Self::MptIssuanceId => "mpt_issuance_id",
            Self::AccountSequence => "Sequence",
        }
    }

    pub fn extract(self, transaction: &Value) -> Option<DerivedIdentifier> {
        match self {
            Self::MptIssuanceId => transaction
                .pointer("/meta/mpt_issuance_id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(DerivedIdentifier::new),
            Self::AccountSequence => transaction
                .pointer("/tx_json/Sequence")
                .or_else(|| transaction.get("Sequence"))
                .and_then(Value::as_u64)
                .map(|sequence| DerivedIdentifier::new(sequence.to_string())),
        }
    }
}

impl fmt::Display for IdentifierField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found {
        identifier: DerivedIdentifier,
        attempts: u32,
    },
    /// Still absent after every permitted lookup.
    NotFound { attempts: u32 },
    Cancelled,
}

#[derive(Clone)]
pub struct IdentifierResolver {
    client: Arc<dyn LedgerClient>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl IdentifierResolver {
    pub fn new(client: Arc<dyn LedgerClient>, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            client,
            policy,
            sleeper,
        }
    }

    /// Only successful confirmations carry identifiers; anything else is a
    /// caller bug and is refused.
    pub async fn resolve(
        &self,
        confirmed: &ConfirmationOutcome,
        field: IdentifierField,
        cancel: &CancelSignal,
    ) -> Result<Resolution, FlowError> {
        if !confirmed.is_success() {
            return Err(FlowError::Precondition(format!(
                "cannot resolve {field} from {} with result {}",
                confirmed.reference, confirmed.result
            )));
        }

        let query = LedgerQuery::TransactionLookup {
            reference: confirmed.reference.clone(),
        };
        let outcome = poll(&self.policy, self.sleeper.as_ref(), cancel, |attempt| {
            let query = &query;
            async move {
                match self.client.query(query).await? {
                    QueryResponse::Success { result } => Ok(field.extract(&result)),
                    QueryResponse::Error { code, .. } if code == "txnNotFound" => Ok(None),
                    QueryResponse::Error { code, message } => Err(FlowError::transport(
                        "tx",
                        format!(
                            "{code} on identifier lookup {attempt}: {}",
                            message.unwrap_or_default()
                        ),
                    )),
                }
            }
        })
        .await?;

        Ok(match outcome {
            PollOutcome::Ready {
                value: identifier,
                attempts,
            } => {
                tracing::info!(
                    tx_ref = %confirmed.reference.short(),
                    field = %field,
                    identifier = %identifier,
                    attempts,
                    "Identifier resolved"
                );
                Resolution::Found {
                    identifier,
                    attempts,
                }
            }
            PollOutcome::Exhausted { attempts } => {
                tracing::warn!(
                    tx_ref = %confirmed.reference,
                    field = %field,
                    attempts,
                    "Identifier not found"
                );
                Resolution::NotFound { attempts }
            }
            PollOutcome::Cancelled { .. } => Resolution::Cancelled,
        })
    }
}

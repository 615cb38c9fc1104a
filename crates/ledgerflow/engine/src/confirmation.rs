//! Confirmation waiter.

use crate::cancel::CancelSignal;
use crate::client::{LedgerClient, LedgerQuery, QueryResponse};
use crate::error::FlowError;
use crate::retry::{poll, PollOutcome, RetryPolicy, Sleeper};
use ledgerflow_types::{ConfirmationOutcome, EngineResult, TxRef};
use serde_json::Value;
use std::sync::Arc;

/// Terminal state of one wait for validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    /// Included in a validated ledger, with whatever result it got there.
    Validated(ConfirmationOutcome),
    /// Not seen validated within the poll bound.
    Unconfirmed { reference: TxRef, attempts: u32 },
    Cancelled { reference: TxRef },
}

/// Polls transaction lookups until the transaction is validated or the
/// confirmation policy is exhausted.
#[derive(Clone)]
pub struct ConfirmationWaiter {
    client: Arc<dyn LedgerClient>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ConfirmationWaiter {
    pub fn new(client: Arc<dyn LedgerClient>, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            client,
            policy,
            sleeper,
        }
    }

    pub async fn await_validation(
        &self,
        reference: &TxRef,
        cancel: &CancelSignal,
    ) -> Result<Confirmation, FlowError> {
        let query = LedgerQuery::TransactionLookup {
            reference: reference.clone(),
        };

        let outcome = poll(&self.policy, self.sleeper.as_ref(), cancel, |attempt| {
            let query = &query;
            async move {
                let response = self.client.query(query).await?;
                let confirmed = interpret_lookup(reference, &response)?;
                if confirmed.is_none() {
                    tracing::debug!(tx_ref = %reference.short(), attempt, "Awaiting validation");
                }
                Ok(confirmed)
            }
        })
        .await?;

        Ok(match outcome {
            PollOutcome::Ready { value, attempts } => {
                tracing::info!(
                    tx_ref = %reference.short(),
                    code = %value.result,
                    attempts,
                    "Transaction validated"
                );
                Confirmation::Validated(value)
            }
            PollOutcome::Exhausted { attempts } => {
                tracing::warn!(tx_ref = %reference.short(), attempts, "Transaction unconfirmed");
                Confirmation::Unconfirmed {
                    reference: reference.clone(),
                    attempts,
                }
            }
            PollOutcome::Cancelled { .. } => Confirmation::Cancelled {
                reference: reference.clone(),
            },
        })
    }
}

/// Read a transaction-lookup response. `None` while the transaction is unknown
/// or not yet in a validated ledger.
pub fn interpret_lookup(
    reference: &TxRef,
    response: &QueryResponse,
) -> Result<Option<ConfirmationOutcome>, FlowError> {
    let result = match response {
        QueryResponse::Error { code, .. } if code == "txnNotFound" => return Ok(None),
        QueryResponse::Error { code, message } => {
            return Err(FlowError::transport(
                "tx",
                format!("{code}: {}", message.as_deref().unwrap_or("no message")),
            ))
        }
        QueryResponse::Success { result } => result,
    };

    if !result.get("validated").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(None);
    }

    let code = result
        .pointer("/meta/TransactionResult")
        .and_then(Value::as_str)
        .ok_or_else(|| FlowError::malformed("tx", "validated transaction without meta.TransactionResult"))?;
    let engine_result =
        EngineResult::parse(code).map_err(|e| FlowError::malformed("tx", e.to_string()))?;

    Ok(Some(ConfirmationOutcome {
        reference: reference.clone(),
        result: engine_result,
        validated: true,
        ledger_index: result.get("ledger_index").and_then(Value::as_u64),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::client::{LedgerClient, SigningIdentity};
    use crate::retry::RecordingSleeper;
    use crate::testing::{ScriptedLedger, StaticIdentity, TxScript};
    use ledgerflow_types::{AccountRef, Amount, TransactionDescriptor, TxKind};
    use serde_json::json;
    use std::time::Duration;

    async fn submitted(ledger: &ScriptedLedger, script: TxScript) -> TxRef {
        ledger.script(TxKind::Payment, script);
        ledger.connect().await.unwrap();
        let identity =
            StaticIdentity::new(AccountRef::parse("rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe").unwrap());
        let descriptor = TransactionDescriptor::payment(
            identity.account().clone(),
            &AccountRef::parse("rNB4HFHi7Cqoz9Uv8x6JzBrn4xLBKeQLTt").unwrap(),
            &Amount::Drops(10),
        );
        ledger
            .submit(&descriptor, &identity)
            .await
            .unwrap()
            .reference
            .unwrap()
    }

    fn waiter(ledger: Arc<ScriptedLedger>, sleeper: Arc<RecordingSleeper>, attempts: u32) -> ConfirmationWaiter {
        ConfirmationWaiter::new(
            ledger,
            RetryPolicy::fixed(attempts, Duration::from_millis(500)),
            sleeper,
        )
    }

    #[tokio::test]
    async fn waits_through_pending_lookups() {
        let ledger = Arc::new(ScriptedLedger::new());
        let reference = submitted(&ledger, TxScript::validated("tesSUCCESS").not_found_for(1).pending_for(2)).await;
        let sleeper = Arc::new(RecordingSleeper::new());

        let confirmation = waiter(ledger.clone(), sleeper.clone(), 10)
            .await_validation(&reference, &CancelSignal::never())
            .await
            .unwrap();

        match confirmation {
            Confirmation::Validated(outcome) => {
                assert!(outcome.is_success());
                assert!(outcome.ledger_index.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ledger.lookups_of(&reference), 4);
        assert_eq!(sleeper.delays().len(), 3);
    }

    #[tokio::test]
    async fn bounded_wait_ends_unconfirmed() {
        let ledger = Arc::new(ScriptedLedger::new());
        let reference = submitted(&ledger, TxScript::never_validated()).await;
        let sleeper = Arc::new(RecordingSleeper::new());

        let confirmation = waiter(ledger.clone(), sleeper.clone(), 4)
            .await_validation(&reference, &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(
            confirmation,
            Confirmation::Unconfirmed {
                reference: reference.clone(),
                attempts: 4
            }
        );
        assert_eq!(ledger.lookups_of(&reference), 4);
    }

    #[tokio::test]
    async fn cancellation_is_distinct_from_unconfirmed() {
        let ledger = Arc::new(ScriptedLedger::new());
        let reference = submitted(&ledger, TxScript::never_validated()).await;
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let confirmation = waiter(ledger, Arc::new(RecordingSleeper::new()), 4)
            .await_validation(&reference, &signal)
            .await
            .unwrap();
        assert_eq!(confirmation, Confirmation::Cancelled { reference });
    }

    #[test]
    fn unknown_final_codes_are_malformed() {
        let reference = TxRef::parse("C".repeat(64)).unwrap();
        let response = QueryResponse::success(json!({
            "validated": true,
            "meta": { "TransactionResult": "xyzUNKNOWN" },
        }));
        let err = interpret_lookup(&reference, &response).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);

        let remote = QueryResponse::error("noNetwork");
        assert!(interpret_lookup(&reference, &remote).is_err());
    }
}

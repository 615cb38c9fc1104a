//! Account readiness preflight.

use crate::cancel::CancelSignal;
use crate::client::{LedgerClient, LedgerQuery, QueryResponse};
use crate::error::FlowError;
use crate::retry::{poll, PollOutcome, RetryPolicy, Sleeper};
use ledgerflow_types::AccountRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// What `account_info` reports about an existing account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account: AccountRef,
    pub sequence: Option<u64>,
    pub balance_drops: Option<u64>,
}

/// Waits, within a bound, for accounts to exist on the validated ledger.
#[derive(Clone)]
pub struct AccountReadiness {
    client: Arc<dyn LedgerClient>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl AccountReadiness {
    pub fn new(client: Arc<dyn LedgerClient>, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            client,
            policy,
            sleeper,
        }
    }

    pub async fn await_account(
        &self,
        account: &AccountRef,
        cancel: &CancelSignal,
    ) -> Result<AccountSnapshot, FlowError> {
        let query = LedgerQuery::AccountInfo {
            account: account.clone(),
        };

        let outcome = poll(&self.policy, self.sleeper.as_ref(), cancel, |_| {
            let query = &query;
            async move {
                match self.client.query(query).await? {
                    QueryResponse::Success { result } => {
                        let data = result.get("account_data").cloned().unwrap_or(Value::Null);
                        Ok(Some(AccountSnapshot {
                            account: account.clone(),
                            sequence: data.get("Sequence").and_then(Value::as_u64),
                            balance_drops: data
                                .get("Balance")
                                .and_then(Value::as_str)
                                .and_then(|b| b.parse().ok()),
                        }))
                    }
                    QueryResponse::Error { code, .. } if code == "actNotFound" => Ok(None),
                    QueryResponse::Error { code, message } => Err(FlowError::transport(
                        "account_info",
                        format!("{code}: {}", message.unwrap_or_default()),
                    )),
                }
            }
        })
        .await?;

        match outcome {
            PollOutcome::Ready { value, attempts } => {
                tracing::debug!(account = %account, attempts, "Account ready");
                Ok(value)
            }
            PollOutcome::Exhausted { attempts } => Err(FlowError::Precondition(format!(
                "account {account} not found on the validated ledger after {attempts} checks"
            ))),
            PollOutcome::Cancelled { .. } => Err(FlowError::Cancelled { reference: None }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RecordingSleeper;
    use crate::testing::ScriptedLedger;
    use crate::ErrorKind;
    use std::time::Duration;

    fn account() -> AccountRef {
        AccountRef::parse("rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe").unwrap()
    }

    async fn readiness(ledger: Arc<ScriptedLedger>) -> AccountReadiness {
        ledger.connect().await.unwrap();
        AccountReadiness::new(
            ledger,
            RetryPolicy::fixed(3, Duration::from_secs(3)),
            Arc::new(RecordingSleeper::new()),
        )
    }

    #[tokio::test]
    async fn waits_for_a_funding_account() {
        let ledger = Arc::new(ScriptedLedger::new());
        ledger.missing_account(&account(), Some(2));
        let snapshot = readiness(ledger)
            .await
            .await_account(&account(), &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(snapshot.sequence, Some(1));
        assert_eq!(snapshot.balance_drops, Some(100_000_000));
    }

    #[tokio::test]
    async fn never_funded_account_fails_the_precondition() {
        let ledger = Arc::new(ScriptedLedger::new());
        ledger.missing_account(&account(), None);
        let err = readiness(ledger)
            .await
            .await_account(&account(), &CancelSignal::never())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }
}

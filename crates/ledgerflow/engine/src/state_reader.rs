//! Read-only holdings queries.

use crate::client::{LedgerClient, LedgerQuery, QueryResponse};
use crate::config::ReportingConfig;
use crate::error::FlowError;
use ledgerflow_types::AccountRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Ledger object class to report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingClass {
    /// A holder's balance of some issuance.
    MpToken,
    /// An issuer's issuance definitions.
    MptIssuance,
    Escrow,
}

impl HoldingClass {
    pub fn object_type(self) -> &'static str {
        match self {
            Self::MpToken => "mptoken",
            Self::MptIssuance => "mpt_issuance",
            Self::Escrow => "escrow",
        }
    }

    fn amount_field(self) -> &'static str {
        match self {
            Self::MpToken => "MPTAmount",
            Self::MptIssuance => "OutstandingAmount",
            Self::Escrow => "Amount",
        }
    }
}

impl fmt::Display for HoldingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.object_type())
    }
}

/// One ledger object owned by an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub object_id: Option<String>,
    pub issuance_id: Option<String>,
    pub amount: Option<String>,
    pub raw: Value,
}

impl Holding {
    fn from_object(class: HoldingClass, object: Value) -> Self {
        let text = |name: &str| object.get(name).and_then(Value::as_str).map(str::to_string);
        let issuance_id = match class {
            HoldingClass::MpToken => text("MPTokenIssuanceID"),
            HoldingClass::MptIssuance => text("mpt_issuance_id"),
            HoldingClass::Escrow => None,
        };
        // Unset MPT balances are omitted from the object entirely.
        let amount = text(class.amount_field()).or_else(|| match class {
            HoldingClass::MpToken | HoldingClass::MptIssuance => Some("0".to_string()),
            HoldingClass::Escrow => None,
        });

        Self {
            object_id: text("index"),
            issuance_id,
            amount,
            raw: object,
        }
    }
}

/// Queries the validated ledger for an account's objects of one class.
///
/// Every failure comes back as an `Observability` error; callers treat it as
/// informational.
#[derive(Clone)]
pub struct StateReader {
    client: Arc<dyn LedgerClient>,
    config: ReportingConfig,
}

impl StateReader {
    pub fn new(client: Arc<dyn LedgerClient>, config: ReportingConfig) -> Self {
        Self { client, config }
    }

    pub async fn holdings(
        &self,
        account: &AccountRef,
        class: HoldingClass,
    ) -> Result<Vec<Holding>, FlowError> {
        let mut holdings = Vec::new();
        let mut marker: Option<Value> = None;

        for page in 1..=self.config.max_pages.max(1) {
            let query = LedgerQuery::AccountObjects {
                account: account.clone(),
                object_type: Some(class.object_type().to_string()),
                limit: self.config.page_limit,
                marker: marker.take(),
            };
            let result = match self.client.query(&query).await {
                Ok(QueryResponse::Success { result }) => result,
                Ok(QueryResponse::Error { code, message }) => {
                    return Err(FlowError::Observability(format!(
                        "account_objects for {account}: {code}{}",
                        message.map(|m| format!(" ({m})")).unwrap_or_default()
                    )))
                }
                Err(err) => return Err(FlowError::Observability(err.to_string())),
            };

            let objects = result
                .get("account_objects")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    FlowError::Observability(format!(
                        "account_objects for {account}: response has no object list"
                    ))
                })?;
            holdings.extend(
                objects
                    .iter()
                    .cloned()
                    .map(|object| Holding::from_object(class, object)),
            );

            marker = result.get("marker").filter(|m| !m.is_null()).cloned();
            if marker.is_none() {
                break;
            }
            if page == self.config.max_pages {
                tracing::warn!(
                    account = %account,
                    class = %class,
                    pages = page,
                    "Holdings truncated at page limit"
                );
            }
        }

        tracing::debug!(account = %account, class = %class, count = holdings.len(), "Holdings read");
        Ok(holdings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLedger;
    use crate::ErrorKind;
    use serde_json::json;

    fn holder() -> AccountRef {
        AccountRef::parse("rNB4HFHi7Cqoz9Uv8x6JzBrn4xLBKeQLTt").unwrap()
    }

    async fn connected() -> Arc<ScriptedLedger> {
        let ledger = Arc::new(ScriptedLedger::new());
        ledger.connect().await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn follows_markers_across_pages() {
        let ledger = connected().await;
        for n in 0..5 {
            ledger.add_object(
                &holder(),
                "mptoken",
                json!({
                    "index": format!("OBJ{n}"),
                    "MPTokenIssuanceID": "ABCD1234",
                    "MPTAmount": "1000",
                }),
            );
        }
        let reader = StateReader::new(
            ledger.clone(),
            ReportingConfig {
                page_limit: 2,
                max_pages: 10,
            },
        );

        let holdings = reader.holdings(&holder(), HoldingClass::MpToken).await.unwrap();
        assert_eq!(holdings.len(), 5);
        assert_eq!(holdings[0].issuance_id.as_deref(), Some("ABCD1234"));
        assert_eq!(holdings[4].object_id.as_deref(), Some("OBJ4"));
        assert_eq!(ledger.queries().len(), 3);
    }

    #[tokio::test]
    async fn page_bound_truncates() {
        let ledger = connected().await;
        for n in 0..5 {
            ledger.add_object(&holder(), "escrow", json!({ "index": n.to_string(), "Amount": "10" }));
        }
        let reader = StateReader::new(
            ledger.clone(),
            ReportingConfig {
                page_limit: 1,
                max_pages: 2,
            },
        );
        let holdings = reader.holdings(&holder(), HoldingClass::Escrow).await.unwrap();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].amount.as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn failures_are_observability_errors() {
        let ledger = connected().await;
        ledger.fail_objects("actNotFound");
        let reader = StateReader::new(ledger.clone(), ReportingConfig::default());
        let err = reader
            .holdings(&holder(), HoldingClass::MpToken)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Observability);

        ledger.disconnect().await.unwrap();
        let err = reader
            .holdings(&holder(), HoldingClass::MpToken)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Observability);
    }

    #[test]
    fn missing_mpt_balance_reads_as_zero() {
        let holding = Holding::from_object(
            HoldingClass::MpToken,
            json!({ "MPTokenIssuanceID": "ABCD1234" }),
        );
        assert_eq!(holding.amount.as_deref(), Some("0"));
    }
}

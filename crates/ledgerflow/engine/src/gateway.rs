//! Submission gateway.

use crate::client::{LedgerClient, SigningIdentity};
use crate::error::FlowError;
use ledgerflow_types::{SubmissionResult, TransactionDescriptor};
use std::sync::Arc;

/// Sends one descriptor to the network and returns its acknowledgement.
///
/// A transport failure is an `Err`: the caller cannot know whether the network
/// saw the transaction. A ledger refusal is an `Ok` with `accepted == false`.
#[derive(Clone)]
pub struct SubmissionGateway {
    client: Arc<dyn LedgerClient>,
}

impl SubmissionGateway {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self { client }
    }

    pub async fn submit(
        &self,
        descriptor: &TransactionDescriptor,
        signer: &dyn SigningIdentity,
    ) -> Result<SubmissionResult, FlowError> {
        if descriptor.sender() != signer.account() {
            return Err(FlowError::Precondition(format!(
                "descriptor sender {} does not match signing account {}",
                descriptor.sender(),
                signer.account()
            )));
        }

        let result = self.client.submit(descriptor, signer).await?;
        if result.accepted && result.reference.is_none() {
            return Err(FlowError::malformed(
                "submit",
                "accepted submission carried no transaction hash",
            ));
        }

        tracing::debug!(
            kind = %descriptor.kind(),
            sender = %descriptor.sender(),
            code = %result.preliminary,
            accepted = result.accepted,
            "Submission acknowledged"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedLedger, StaticIdentity, TxScript};
    use ledgerflow_types::{AccountRef, Amount, TxKind};

    fn account(address: &str) -> AccountRef {
        AccountRef::parse(address).unwrap()
    }

    #[tokio::test]
    async fn refuses_mismatched_signer() {
        let ledger = Arc::new(ScriptedLedger::new());
        let gateway = SubmissionGateway::new(ledger.clone());
        let sender = account("rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe");
        let other = StaticIdentity::new(account("rNB4HFHi7Cqoz9Uv8x6JzBrn4xLBKeQLTt"));
        let descriptor =
            TransactionDescriptor::payment(sender.clone(), &sender, &Amount::Drops(1));

        let err = gateway.submit(&descriptor, &other).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Precondition);
        assert!(ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn returns_the_preliminary_acknowledgement() {
        let ledger = Arc::new(ScriptedLedger::new());
        ledger.script(TxKind::Payment, TxScript::rejected("temBAD_AMOUNT"));
        ledger.connect().await.unwrap();
        let gateway = SubmissionGateway::new(ledger.clone());
        let sender = StaticIdentity::new(account("rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe"));
        let descriptor = TransactionDescriptor::payment(
            sender.account().clone(),
            &account("rNB4HFHi7Cqoz9Uv8x6JzBrn4xLBKeQLTt"),
            &Amount::Drops(1),
        );

        let result = gateway.submit(&descriptor, &sender).await.unwrap();
        assert!(!result.accepted);
        assert!(result.reference.is_none());
        assert_eq!(result.preliminary.code(), "temBAD_AMOUNT");
        assert_eq!(ledger.submitted().len(), 1);
    }
}

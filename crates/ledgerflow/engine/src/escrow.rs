//! Conditional escrow workflow: lock → wait → release → report.

use crate::cancel::CancelSignal;
use crate::client::SigningIdentity;
use crate::error::FlowError;
use crate::journal::WorkflowState;
use crate::orchestrator::{
    AccountHoldings, DependencyOrchestrator, Halt, HaltAt, WorkflowHalted, WorkflowReport,
};
use crate::policy::StageKind;
use crate::resolver::IdentifierField;
use crate::retry::pause;
use crate::session::with_connection;
use crate::stage::{EscrowStage, StageMachine};
use crate::state_reader::HoldingClass;
use chrono::Utc;
use ledgerflow_types::{
    from_ripple_time, to_ripple_time, CryptoCondition, DerivedIdentifier, EscrowCreateParams,
    TransactionDescriptor,
};
use std::sync::Arc;
use std::time::Duration;

/// Lock XRP from `creator` for `destination`, then release it once the
/// finish time has passed.
#[derive(Clone)]
pub struct EscrowPlan {
    pub creator: Arc<dyn SigningIdentity>,
    /// Receives the funds and submits the release.
    pub destination: Arc<dyn SigningIdentity>,
    pub amount_drops: u64,
    /// Offset of `FinishAfter` from the moment the escrow is built.
    pub finish_delay: Duration,
    pub cancel_delay: Option<Duration>,
    pub condition: CryptoCondition,
    /// Extra wait past `FinishAfter`, so the next closed ledger is past it too.
    pub release_margin: Duration,
}

impl EscrowPlan {
    pub fn new(
        creator: Arc<dyn SigningIdentity>,
        destination: Arc<dyn SigningIdentity>,
        amount_drops: u64,
    ) -> Self {
        Self {
            creator,
            destination,
            amount_drops,
            finish_delay: Duration::from_secs(15),
            cancel_delay: None,
            condition: CryptoCondition::generate(),
            release_margin: Duration::from_secs(5),
        }
    }

    pub fn with_finish_delay(mut self, delay: Duration) -> Self {
        self.finish_delay = delay;
        self
    }

    pub fn with_cancel_delay(mut self, delay: Duration) -> Self {
        self.cancel_delay = Some(delay);
        self
    }

    pub fn with_condition(mut self, condition: CryptoCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_release_margin(mut self, margin: Duration) -> Self {
        self.release_margin = margin;
        self
    }
}

fn ripple_time_after(delay: Duration) -> Result<u32, FlowError> {
    let delay = chrono::Duration::from_std(delay)
        .map_err(|err| FlowError::Configuration(format!("escrow delay: {err}")))?;
    Ok(to_ripple_time(Utc::now() + delay)?)
}

impl DependencyOrchestrator {
    pub async fn run_escrow(
        &self,
        plan: &EscrowPlan,
        cancel: &CancelSignal,
    ) -> Result<WorkflowReport<EscrowStage>, WorkflowHalted> {
        let mut state = self.begin("escrow");
        let body_state = &mut state;
        let outcome = with_connection(self.client_ref(), move || {
            self.escrow_stages(plan, cancel, body_state)
        })
        .await;

        match outcome {
            Ok(Ok((stage, sequence, holdings))) => {
                Ok(self.complete(stage, Some(sequence), holdings, state))
            }
            Ok(Err((stage, error))) => Err(self.halt(stage, error, state)),
            Err(error) => Err(self.halt(StageKind::EscrowCreate, error, state)),
        }
    }

    async fn escrow_stages(
        &self,
        plan: &EscrowPlan,
        cancel: &CancelSignal,
        state: &mut WorkflowState,
    ) -> Result<(EscrowStage, DerivedIdentifier, Vec<AccountHoldings>), Halt> {
        let creator = plan.creator.account().clone();
        let destination = plan.destination.account().clone();
        let mut machine = StageMachine::<EscrowStage>::new();

        self.preflight(&[&creator, &destination], cancel)
            .await
            .at(StageKind::EscrowCreate)?;

        let finish_after = ripple_time_after(plan.finish_delay).at(StageKind::EscrowCreate)?;
        let cancel_after = plan
            .cancel_delay
            .map(ripple_time_after)
            .transpose()
            .at(StageKind::EscrowCreate)?;
        let params = EscrowCreateParams {
            destination: destination.clone(),
            amount_drops: plan.amount_drops,
            finish_after: Some(finish_after),
            cancel_after,
            condition: Some(plan.condition.condition().to_string()),
        };
        let create = TransactionDescriptor::escrow_create(creator.clone(), &params)
            .map_err(FlowError::from)
            .at(StageKind::EscrowCreate)?;

        let sequence = self
            .identifier_stage(
                state,
                StageKind::EscrowCreate,
                &create,
                plan.creator.as_ref(),
                IdentifierField::AccountSequence,
                cancel,
            )
            .await
            .at(StageKind::EscrowCreate)?;
        let offer_sequence: u32 = sequence
            .as_str()
            .parse()
            .map_err(|_| FlowError::malformed("tx", format!("offer sequence '{sequence}'")))
            .at(StageKind::EscrowCreate)?;
        self.moved(&mut machine, StageMachine::mark_locked)
            .at(StageKind::EscrowFinish)?;

        let margin = chrono::Duration::from_std(plan.release_margin)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let release_at = from_ripple_time(finish_after) + margin;
        let wait = (release_at - Utc::now()).to_std().unwrap_or_default();
        tracing::info!(
            offer_sequence,
            finish_after = %from_ripple_time(finish_after),
            wait_ms = wait.as_millis() as u64,
            "Escrow locked, waiting for release time"
        );
        if !pause(self.sleeper(), wait, cancel).await {
            let error = FlowError::Cancelled {
                reference: state.last_reference().cloned(),
            };
            self.record_failure(state, StageKind::EscrowFinish, None, None, &error);
            return Err((StageKind::EscrowFinish, error));
        }

        self.moved(&mut machine, StageMachine::mark_release_submitted)
            .at(StageKind::EscrowFinish)?;
        let finish = TransactionDescriptor::escrow_finish(
            destination,
            &creator,
            offer_sequence,
            Some((plan.condition.condition(), plan.condition.fulfillment())),
        );
        self.optional_stage(
            state,
            StageKind::EscrowFinish,
            &finish,
            plan.destination.as_ref(),
            cancel,
        )
        .await
        .at(StageKind::EscrowFinish)?;
        self.moved(&mut machine, StageMachine::mark_release_resolved)
            .at(StageKind::EscrowFinish)?;

        let holdings = self
            .verify(state, &[(creator, HoldingClass::Escrow)])
            .await;
        self.moved(&mut machine, StageMachine::<EscrowStage>::mark_reported)
            .at(StageKind::Verification)?;

        Ok((machine.current(), sequence, holdings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::config::EngineConfig;
    use crate::events::RecordingEventSink;
    use crate::retry::RecordingSleeper;
    use crate::testing::{ScriptedLedger, StaticIdentity, TxScript};
    use crate::ErrorKind;
    use ledgerflow_types::{AccountRef, TxKind};

    fn plan() -> EscrowPlan {
        let creator =
            StaticIdentity::new(AccountRef::parse("rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe").unwrap());
        let destination =
            StaticIdentity::new(AccountRef::parse("rNB4HFHi7Cqoz9Uv8x6JzBrn4xLBKeQLTt").unwrap());
        EscrowPlan::new(Arc::new(creator), Arc::new(destination), 1_000_000)
            .with_condition(CryptoCondition::from_preimage(&[7u8; 32]))
    }

    fn orchestrator(
        ledger: Arc<ScriptedLedger>,
        sleeper: Arc<RecordingSleeper>,
    ) -> DependencyOrchestrator {
        DependencyOrchestrator::new(ledger, EngineConfig::default())
            .unwrap()
            .with_sleeper(sleeper)
            .with_event_sink(Arc::new(RecordingEventSink::new()))
    }

    #[tokio::test]
    async fn releases_with_the_creation_sequence() {
        let ledger = Arc::new(ScriptedLedger::new());
        ledger.script(TxKind::EscrowCreate, TxScript::validated("tesSUCCESS").with_sequence(42));
        let sleeper = Arc::new(RecordingSleeper::new());
        let plan = plan();

        let report = orchestrator(ledger.clone(), sleeper.clone())
            .run_escrow(&plan, &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(report.stage, EscrowStage::Reported);
        assert_eq!(report.identifier.as_ref().map(|id| id.as_str()), Some("42"));
        assert_eq!(report.state.len(), 3);
        assert_eq!(
            ledger.submitted_kinds(),
            vec![TxKind::EscrowCreate, TxKind::EscrowFinish]
        );

        let finish = &ledger.submitted()[1];
        assert_eq!(finish.sender(), plan.destination.account());
        assert_eq!(finish.field("OfferSequence"), Some(&serde_json::json!(42)));
        assert_eq!(
            finish.field("Fulfillment").and_then(|v| v.as_str()),
            Some(plan.condition.fulfillment())
        );
        assert!(sleeper.delays().iter().any(|d| *d >= Duration::from_secs(15)));
    }

    #[tokio::test]
    async fn failed_release_is_reported_not_fatal() {
        let ledger = Arc::new(ScriptedLedger::new());
        ledger.script(TxKind::EscrowFinish, TxScript::validated("tecNO_PERMISSION"));
        let report = orchestrator(ledger, Arc::new(RecordingSleeper::new()))
            .run_escrow(&plan(), &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(report.failed_stages(), vec![StageKind::EscrowFinish]);
    }

    #[tokio::test]
    async fn cancelled_before_release() {
        let ledger = Arc::new(ScriptedLedger::new());
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let halted = orchestrator(ledger.clone(), Arc::new(RecordingSleeper::new()))
            .run_escrow(&plan().with_finish_delay(Duration::from_secs(30)), &signal)
            .await
            .unwrap_err();
        assert_eq!(halted.kind(), ErrorKind::Cancelled);
        assert!(!ledger.submitted_kinds().contains(&TxKind::EscrowFinish));
        assert_eq!(ledger.disconnects(), 1);
    }
}

//! Issue → authorize → transfer → report against a scripted ledger.

use ledgerflow_engine::testing::{ScriptedLedger, StaticIdentity, TxScript};
use ledgerflow_engine::{
    cancel_pair, CancelSignal, DependencyOrchestrator, EngineConfig, ErrorKind, MptPlan,
    RecordingEventSink, RecordingSleeper, RetryPolicy, SigningIdentity, StageKind, StageOutcome,
    WorkflowEvent, WorkflowStage,
};
use ledgerflow_types::{AccountRef, TxKind, Verdict};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const ISSUER: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";
const HOLDER: &str = "rNB4HFHi7Cqoz9Uv8x6JzBrn4xLBKeQLTt";

struct Harness {
    ledger: Arc<ScriptedLedger>,
    sleeper: Arc<RecordingSleeper>,
    events: Arc<RecordingEventSink>,
    orchestrator: DependencyOrchestrator,
}

fn account(address: &str) -> AccountRef {
    AccountRef::parse(address).unwrap()
}

fn harness_with(config: EngineConfig) -> Harness {
    let ledger = Arc::new(ScriptedLedger::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    let events = Arc::new(RecordingEventSink::new());
    let orchestrator = DependencyOrchestrator::new(ledger.clone(), config)
        .unwrap()
        .with_sleeper(sleeper.clone())
        .with_event_sink(events.clone());
    Harness {
        ledger,
        sleeper,
        events,
        orchestrator,
    }
}

fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

fn plan() -> MptPlan {
    let issuer: Arc<dyn SigningIdentity> = Arc::new(StaticIdentity::new(account(ISSUER)));
    let holder: Arc<dyn SigningIdentity> = Arc::new(StaticIdentity::new(account(HOLDER)));
    MptPlan::new(issuer, holder).with_transfer_units(1000)
}

fn issuance_with_id(id: &str) -> TxScript {
    TxScript::validated("tesSUCCESS").with_mpt_issuance_id(id)
}

#[tokio::test]
async fn full_chain_reaches_reported() {
    let h = harness();
    h.ledger
        .script(TxKind::MpTokenIssuanceCreate, issuance_with_id("ABCD1234"))
        .add_object(
            &account(ISSUER),
            "mpt_issuance",
            json!({ "index": "AA01", "mpt_issuance_id": "ABCD1234", "OutstandingAmount": "1000" }),
        )
        .add_object(
            &account(HOLDER),
            "mptoken",
            json!({ "index": "BB02", "MPTokenIssuanceID": "ABCD1234", "MPTAmount": "1000" }),
        );

    let report = h
        .orchestrator
        .run_mpt(&plan(), &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(report.stage, WorkflowStage::Reported);
    assert_eq!(report.identifier.as_ref().unwrap().as_str(), "ABCD1234");
    assert_eq!(report.state.len(), 4);
    let stages: Vec<StageKind> = report.state.records().iter().map(|r| r.stage).collect();
    assert_eq!(
        stages,
        vec![
            StageKind::Issuance,
            StageKind::Authorization,
            StageKind::Transfer,
            StageKind::Verification
        ]
    );
    assert!(report.failed_stages().is_empty());
    assert!(report.state.verify_chain());

    let submitted = h.ledger.submitted();
    assert_eq!(submitted.len(), 3);
    assert_eq!(submitted[1].mpt_issuance_id(), Some("ABCD1234"));
    assert_eq!(submitted[2].mpt_issuance_id(), Some("ABCD1234"));
    assert_eq!(submitted[2].field("Amount").unwrap()["value"], "1000");
    assert_eq!(submitted[2].sender().as_str(), ISSUER);

    assert_eq!(report.holdings.len(), 2);
    assert_eq!(report.holdings[0].holdings[0].amount.as_deref(), Some("1000"));
    assert_eq!(
        report.holdings[1].holdings[0].issuance_id.as_deref(),
        Some("ABCD1234")
    );
    assert!(report.state.records()[3].descriptor.is_none());

    assert_eq!(h.ledger.connects(), 1);
    assert_eq!(h.ledger.disconnects(), 1);
    assert!(matches!(
        h.events.events().last(),
        Some(WorkflowEvent::WorkflowCompleted { stages: 4, .. })
    ));
}

#[tokio::test]
async fn permanent_issuance_failure_builds_nothing_else() {
    let h = harness();
    h.ledger
        .script(TxKind::MpTokenIssuanceCreate, TxScript::rejected("temMALFORMED"));

    let halted = h
        .orchestrator
        .run_mpt(&plan(), &CancelSignal::never())
        .await
        .unwrap_err();

    assert_eq!(halted.stage, StageKind::Issuance);
    assert_eq!(halted.kind(), ErrorKind::Rejection);
    assert_eq!(halted.state.len(), 1);
    assert!(halted.state.records()[0].outcome.is_fatal());
    assert_eq!(
        h.ledger.submitted_kinds(),
        vec![TxKind::MpTokenIssuanceCreate]
    );
    assert!(h.events.transitions().is_empty());
    assert_eq!(h.ledger.disconnects(), 1);
}

#[tokio::test]
async fn missing_identifier_halts_with_the_last_reference() {
    let h = harness();
    h.ledger
        .script(TxKind::MpTokenIssuanceCreate, TxScript::validated("tesSUCCESS"));

    let halted = h
        .orchestrator
        .run_mpt(&plan(), &CancelSignal::never())
        .await
        .unwrap_err();

    assert_eq!(halted.stage, StageKind::Issuance);
    assert_eq!(halted.kind(), ErrorKind::NotFound);
    let reference = halted.last_reference.clone().unwrap();
    assert_eq!(halted.state.records()[0].reference(), Some(&reference));
    assert!(halted.to_string().contains(reference.as_str()));

    // One lookup to confirm, then the identifier policy's five.
    assert_eq!(h.ledger.lookups_of(&reference), 6);
    assert_eq!(h.ledger.submitted().len(), 1);
    assert!(h.events.events().iter().any(|event| matches!(
        event,
        WorkflowEvent::IdentifierMissing { attempts: 5, .. }
    )));
    assert!(matches!(
        h.events.events().last(),
        Some(WorkflowEvent::WorkflowHalted { kind: ErrorKind::NotFound, last_reference: Some(_), .. })
    ));
}

#[tokio::test]
async fn lagging_metadata_is_picked_up_on_a_later_lookup() {
    let h = harness();
    h.ledger.script(
        TxKind::MpTokenIssuanceCreate,
        issuance_with_id("00F1E2D3").metadata_lag(2),
    );

    let report = h
        .orchestrator
        .run_mpt(&plan(), &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(report.identifier.unwrap().as_str(), "00F1E2D3");
    assert!(h.events.events().iter().any(|event| matches!(
        event,
        WorkflowEvent::IdentifierResolved { attempts: 2, .. }
    )));
    assert_eq!(h.ledger.submitted()[1].mpt_issuance_id(), Some("00F1E2D3"));
}

#[tokio::test]
async fn authorization_failure_does_not_block_the_transfer() {
    let h = harness();
    h.ledger
        .script(TxKind::MpTokenIssuanceCreate, issuance_with_id("ABCD1234"))
        .script(TxKind::MpTokenAuthorize, TxScript::validated("tecDUPLICATE"));

    let report = h
        .orchestrator
        .run_mpt(&plan(), &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(report.stage, WorkflowStage::Reported);
    assert_eq!(report.failed_stages(), vec![StageKind::Authorization]);
    assert_eq!(
        h.ledger.submitted_kinds(),
        vec![
            TxKind::MpTokenIssuanceCreate,
            TxKind::MpTokenAuthorize,
            TxKind::Payment
        ]
    );
    let authorization = report.state.record_for(StageKind::Authorization).unwrap();
    assert!(matches!(
        authorization.outcome,
        StageOutcome::Failed { kind: ErrorKind::Rejection, fatal: false, .. }
    ));
    assert!(authorization.confirmation.is_some());
}

#[tokio::test]
async fn transfer_rejection_is_reported_and_the_workflow_completes() {
    let h = harness();
    h.ledger
        .script(TxKind::MpTokenIssuanceCreate, issuance_with_id("ABCD1234"))
        .script(TxKind::Payment, TxScript::validated("tecNO_AUTH"));

    let report = h
        .orchestrator
        .run_mpt(&plan(), &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(report.stage, WorkflowStage::Reported);
    assert_eq!(report.failed_stages(), vec![StageKind::Transfer]);
    let issuance = report.state.record_for(StageKind::Issuance).unwrap();
    assert_eq!(
        issuance.outcome,
        StageOutcome::Completed {
            verdict: Verdict::Success
        }
    );
}

#[tokio::test]
async fn confirmation_wait_is_bounded() {
    let mut config = EngineConfig::default();
    config.confirmation = RetryPolicy::fixed(4, Duration::from_secs(1));
    let h = harness_with(config);
    h.ledger
        .script(TxKind::MpTokenIssuanceCreate, TxScript::never_validated());

    let halted = h
        .orchestrator
        .run_mpt(&plan(), &CancelSignal::never())
        .await
        .unwrap_err();

    assert_eq!(halted.kind(), ErrorKind::Timeout);
    let reference = halted.last_reference.clone().unwrap();
    assert_eq!(h.ledger.lookups_of(&reference), 4);
    assert_eq!(h.sleeper.delays(), vec![Duration::from_secs(1); 3]);
    assert_eq!(h.ledger.submitted().len(), 1);
}

#[tokio::test]
async fn temporary_preliminary_result_is_resubmitted() {
    let h = harness();
    h.ledger
        .script(
            TxKind::MpTokenIssuanceCreate,
            TxScript::rejected("telINSUF_FEE_P"),
        )
        .script(TxKind::MpTokenIssuanceCreate, issuance_with_id("ABCD1234"));

    let report = h
        .orchestrator
        .run_mpt(&plan(), &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(report.stage, WorkflowStage::Reported);
    let issuances = h
        .ledger
        .submitted_kinds()
        .into_iter()
        .filter(|kind| *kind == TxKind::MpTokenIssuanceCreate)
        .count();
    assert_eq!(issuances, 2);
    assert!(h.events.events().iter().any(|event| matches!(
        event,
        WorkflowEvent::Resubmitting { stage: StageKind::Issuance, attempt: 2, .. }
    )));
    assert_eq!(h.sleeper.delays()[0], Duration::from_secs(1));
}

#[tokio::test]
async fn transport_failure_is_fatal_at_any_stage() {
    let h = harness();
    h.ledger
        .script(TxKind::MpTokenIssuanceCreate, issuance_with_id("ABCD1234"))
        .script(TxKind::MpTokenAuthorize, TxScript::transport_failure());

    let halted = h
        .orchestrator
        .run_mpt(&plan(), &CancelSignal::never())
        .await
        .unwrap_err();

    assert_eq!(halted.stage, StageKind::Authorization);
    assert_eq!(halted.kind(), ErrorKind::Transport);
    assert!(!h.ledger.submitted_kinds().contains(&TxKind::Payment));
    // The issuance reference is still the last known one.
    assert_eq!(
        halted.last_reference.as_ref(),
        halted.state.records()[0].reference()
    );
}

#[tokio::test]
async fn failed_holdings_query_is_informational() {
    let h = harness();
    h.ledger
        .script(TxKind::MpTokenIssuanceCreate, issuance_with_id("ABCD1234"))
        .fail_objects("lgrNotFound");

    let report = h
        .orchestrator
        .run_mpt(&plan(), &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(report.stage, WorkflowStage::Reported);
    assert_eq!(report.failed_stages(), vec![StageKind::Verification]);
    assert!(report.holdings.is_empty());
    assert!(matches!(
        report.state.last().unwrap().outcome,
        StageOutcome::Failed { kind: ErrorKind::Observability, fatal: false, .. }
    ));
}

#[tokio::test]
async fn cancellation_is_distinct_from_timeout() {
    let h = harness();
    let (handle, signal) = cancel_pair();
    handle.cancel();

    let halted = h.orchestrator.run_mpt(&plan(), &signal).await.unwrap_err();

    assert_eq!(halted.kind(), ErrorKind::Cancelled);
    assert!(h.ledger.submitted().is_empty());
    assert_eq!(h.ledger.disconnects(), 1);
}

#[tokio::test]
async fn unreachable_ledger_halts_before_any_stage() {
    let h = harness();
    h.ledger.fail_connect();

    let halted = h
        .orchestrator
        .run_mpt(&plan(), &CancelSignal::never())
        .await
        .unwrap_err();

    assert_eq!(halted.kind(), ErrorKind::Transport);
    assert!(halted.state.is_empty());
    assert!(halted.last_reference.is_none());
    assert_eq!(h.ledger.disconnects(), 0);
}

#[tokio::test]
async fn missing_account_fails_the_preflight() {
    let h = harness();
    h.ledger.missing_account(&account(HOLDER), None);

    let halted = h
        .orchestrator
        .run_mpt(&plan(), &CancelSignal::never())
        .await
        .unwrap_err();

    assert_eq!(halted.kind(), ErrorKind::Precondition);
    assert!(h.ledger.submitted().is_empty());
    assert_eq!(h.sleeper.delays().len(), 4);
}

#[tokio::test]
async fn account_that_appears_late_passes_the_preflight() {
    let h = harness();
    h.ledger
        .missing_account(&account(ISSUER), Some(2))
        .script(TxKind::MpTokenIssuanceCreate, issuance_with_id("ABCD1234"));

    let report = h
        .orchestrator
        .run_mpt(&plan(), &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(report.stage, WorkflowStage::Reported);
}

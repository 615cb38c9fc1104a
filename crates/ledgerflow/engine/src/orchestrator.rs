//! Dependency orchestration.
//!
//! A workflow is a chain of transactions where a later stage consumes an
//! identifier the ledger derived from an earlier one. The orchestrator drives
//! each stage through the lifecycle, records the outcome in the journal, and
//! decides from the stage policy table whether a failure halts the chain.

use crate::cancel::CancelSignal;
use crate::client::{LedgerClient, SigningIdentity};
use crate::config::EngineConfig;
use crate::confirmation::ConfirmationWaiter;
use crate::error::{ErrorKind, FlowError};
use crate::events::{EventSink, TracingEventSink, WorkflowEvent};
use crate::gateway::SubmissionGateway;
use crate::journal::{StageEntry, StageOutcome, WorkflowState};
use crate::lifecycle::{LifecycleOutcome, TransactionLifecycle};
use crate::policy::StageKind;
use crate::readiness::AccountReadiness;
use crate::resolver::{IdentifierField, IdentifierResolver, Resolution};
use crate::retry::{Sleeper, TokioSleeper};
use crate::session::with_connection;
use crate::stage::{Stage, StageMachine, WorkflowStage};
use crate::state_reader::{Holding, HoldingClass, StateReader};
use ledgerflow_types::{
    AccountRef, Amount, ConfirmationOutcome, DerivedIdentifier, MptIssuanceParams,
    TransactionDescriptor, TxRef, Verdict,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

// ── Plans and reports ──────────────────────────────────────────────────

/// Issue a token, authorize a holder, transfer to it, report holdings.
#[derive(Clone)]
pub struct MptPlan {
    pub issuer: Arc<dyn SigningIdentity>,
    pub holder: Arc<dyn SigningIdentity>,
    pub params: MptIssuanceParams,
    /// Units of the smallest denomination sent to the holder.
    pub transfer_units: u64,
}

impl MptPlan {
    pub fn new(issuer: Arc<dyn SigningIdentity>, holder: Arc<dyn SigningIdentity>) -> Self {
        Self {
            issuer,
            holder,
            params: MptIssuanceParams::default(),
            transfer_units: 1_000,
        }
    }

    pub fn with_params(mut self, params: MptIssuanceParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_transfer_units(mut self, units: u64) -> Self {
        self.transfer_units = units;
        self
    }
}

/// Holdings of one class observed for one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountHoldings {
    pub account: AccountRef,
    pub class: HoldingClass,
    pub holdings: Vec<Holding>,
}

/// A workflow that reached its final stage.
///
/// Non-fatal stage failures along the way are in `state`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport<S: Stage> {
    pub stage: S,
    pub identifier: Option<DerivedIdentifier>,
    pub state: WorkflowState,
    pub holdings: Vec<AccountHoldings>,
}

impl<S: Stage> WorkflowReport<S> {
    /// Stages recorded with a non-fatal failure.
    pub fn failed_stages(&self) -> Vec<StageKind> {
        self.state
            .records()
            .iter()
            .filter(|record| matches!(record.outcome, StageOutcome::Failed { .. }))
            .map(|record| record.stage)
            .collect()
    }
}

/// A workflow stopped by a fatal failure.
#[derive(Debug, Clone)]
pub struct WorkflowHalted {
    pub stage: StageKind,
    pub error: FlowError,
    /// Most recent transaction reference, for manual inspection.
    pub last_reference: Option<TxRef>,
    pub state: WorkflowState,
}

impl WorkflowHalted {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl fmt::Display for WorkflowHalted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "workflow halted at {}: {}", self.stage, self.error)?;
        if let Some(reference) = &self.last_reference {
            if !self.error.to_string().contains(reference.as_str()) {
                write!(f, " (last transaction {reference})")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for WorkflowHalted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Where a workflow body stopped and why.
pub(crate) type Halt = (StageKind, FlowError);

pub(crate) trait HaltAt<T> {
    fn at(self, stage: StageKind) -> Result<T, Halt>;
}

impl<T> HaltAt<T> for Result<T, FlowError> {
    fn at(self, stage: StageKind) -> Result<T, Halt> {
        self.map_err(|error| (stage, error))
    }
}

/// Lifecycle result of one transaction stage.
pub(crate) struct StageRun {
    pub lifecycle: Option<LifecycleOutcome>,
    pub result: Result<ConfirmationOutcome, FlowError>,
}

// ── Orchestrator ───────────────────────────────────────────────────────

/// Drives dependent transaction chains against one ledger client.
#[derive(Clone)]
pub struct DependencyOrchestrator {
    client: Arc<dyn LedgerClient>,
    config: EngineConfig,
    sleeper: Arc<dyn Sleeper>,
    events: Arc<dyn EventSink>,
}

impl DependencyOrchestrator {
    pub fn new(client: Arc<dyn LedgerClient>, config: EngineConfig) -> Result<Self, FlowError> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            sleeper: Arc::new(TokioSleeper),
            events: Arc::new(TracingEventSink),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn client_ref(&self) -> &dyn LedgerClient {
        self.client.as_ref()
    }

    pub(crate) fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    pub(crate) fn emit(&self, event: WorkflowEvent) {
        self.events.emit(&event);
    }

    fn lifecycle(&self) -> TransactionLifecycle {
        TransactionLifecycle::new(
            SubmissionGateway::new(self.client.clone()),
            ConfirmationWaiter::new(
                self.client.clone(),
                self.config.confirmation.clone(),
                self.sleeper.clone(),
            ),
            self.config.submission.clone(),
            self.sleeper.clone(),
            self.events.clone(),
        )
    }

    fn resolver(&self) -> IdentifierResolver {
        IdentifierResolver::new(
            self.client.clone(),
            self.config.identifier.clone(),
            self.sleeper.clone(),
        )
    }

    fn reader(&self) -> StateReader {
        StateReader::new(self.client.clone(), self.config.reporting.clone())
    }

    fn readiness(&self) -> AccountReadiness {
        AccountReadiness::new(
            self.client.clone(),
            self.config.account_readiness.clone(),
            self.sleeper.clone(),
        )
    }

    // ── Workflows ──────────────────────────────────────────────────────

    /// Issue → authorize → transfer → report.
    pub async fn run_mpt(
        &self,
        plan: &MptPlan,
        cancel: &CancelSignal,
    ) -> Result<WorkflowReport<WorkflowStage>, WorkflowHalted> {
        let mut state = self.begin("mpt");
        let body_state = &mut state;
        let outcome = with_connection(self.client.as_ref(), move || {
            self.mpt_stages(plan, cancel, body_state)
        })
        .await;

        match outcome {
            Ok(Ok((stage, identifier, holdings))) => Ok(self.complete(
                stage,
                Some(identifier),
                holdings,
                state,
            )),
            Ok(Err((stage, error))) => Err(self.halt(stage, error, state)),
            Err(error) => Err(self.halt(StageKind::Issuance, error, state)),
        }
    }

    /// A single payment through the same lifecycle. Any failure halts.
    pub async fn run_payment(
        &self,
        descriptor: &TransactionDescriptor,
        signer: &dyn SigningIdentity,
        cancel: &CancelSignal,
    ) -> Result<WorkflowState, WorkflowHalted> {
        self.run_single("payment", StageKind::Transfer, descriptor, signer, cancel)
            .await
    }

    /// Any one descriptor submitted, confirmed and recorded as `stage`.
    /// Unlike the chained workflows, every failure halts.
    pub async fn run_single(
        &self,
        workflow: &str,
        stage: StageKind,
        descriptor: &TransactionDescriptor,
        signer: &dyn SigningIdentity,
        cancel: &CancelSignal,
    ) -> Result<WorkflowState, WorkflowHalted> {
        let mut state = self.begin(workflow);
        let body_state = &mut state;
        let outcome = with_connection(self.client.as_ref(), move || {
            self.single_stage(stage, descriptor, signer, cancel, body_state)
        })
        .await;

        match outcome {
            Ok(Ok(_)) => {
                self.emit(WorkflowEvent::WorkflowCompleted {
                    workflow_id: state.workflow_id(),
                    stages: state.len(),
                });
                Ok(state)
            }
            Ok(Err((stage, error))) => Err(self.halt(stage, error, state)),
            Err(error) => Err(self.halt(stage, error, state)),
        }
    }

    async fn single_stage(
        &self,
        stage: StageKind,
        descriptor: &TransactionDescriptor,
        signer: &dyn SigningIdentity,
        cancel: &CancelSignal,
        state: &mut WorkflowState,
    ) -> Result<ConfirmationOutcome, Halt> {
        self.preflight(&[signer.account()], cancel).await.at(stage)?;

        let run = self.transact(stage, descriptor, signer, cancel).await;
        match run.result {
            Ok(confirmed) => {
                self.record_success(state, stage, descriptor, run.lifecycle, None);
                Ok(confirmed)
            }
            Err(error) => {
                self.record_failure(state, stage, Some(descriptor), run.lifecycle, &error);
                Err((stage, error))
            }
        }
    }

    async fn mpt_stages(
        &self,
        plan: &MptPlan,
        cancel: &CancelSignal,
        state: &mut WorkflowState,
    ) -> Result<(WorkflowStage, DerivedIdentifier, Vec<AccountHoldings>), Halt> {
        let issuer = plan.issuer.account().clone();
        let holder = plan.holder.account().clone();
        let mut machine = StageMachine::<WorkflowStage>::new();

        self.preflight(&[&issuer, &holder], cancel)
            .await
            .at(StageKind::Issuance)?;

        let issuance = TransactionDescriptor::mpt_issuance_create(issuer.clone(), &plan.params)
            .map_err(FlowError::from)
            .at(StageKind::Issuance)?;
        let identifier = self
            .identifier_stage(
                state,
                StageKind::Issuance,
                &issuance,
                plan.issuer.as_ref(),
                IdentifierField::MptIssuanceId,
                cancel,
            )
            .await
            .at(StageKind::Issuance)?;

        self.moved(&mut machine, StageMachine::mark_authorization_requested)
            .at(StageKind::Authorization)?;
        let authorize = TransactionDescriptor::mpt_authorize(holder.clone(), &identifier);
        self.optional_stage(
            state,
            StageKind::Authorization,
            &authorize,
            plan.holder.as_ref(),
            cancel,
        )
        .await
        .at(StageKind::Authorization)?;
        self.moved(&mut machine, StageMachine::mark_authorization_resolved)
            .at(StageKind::Authorization)?;

        self.moved(&mut machine, StageMachine::mark_transfer_submitted)
            .at(StageKind::Transfer)?;
        let transfer = TransactionDescriptor::payment(
            issuer.clone(),
            &holder,
            &Amount::mpt(&identifier, plan.transfer_units),
        );
        self.optional_stage(
            state,
            StageKind::Transfer,
            &transfer,
            plan.issuer.as_ref(),
            cancel,
        )
        .await
        .at(StageKind::Transfer)?;
        self.moved(&mut machine, StageMachine::mark_transfer_resolved)
            .at(StageKind::Transfer)?;

        let holdings = self
            .verify(
                state,
                &[
                    (issuer, HoldingClass::MptIssuance),
                    (holder, HoldingClass::MpToken),
                ],
            )
            .await;
        self.moved(&mut machine, StageMachine::<WorkflowStage>::mark_reported)
            .at(StageKind::Verification)?;

        Ok((machine.current(), identifier, holdings))
    }

    // ── Stage helpers ──────────────────────────────────────────────────

    pub(crate) fn begin(&self, workflow: &str) -> WorkflowState {
        let state = WorkflowState::new(Uuid::new_v4());
        tracing::info!(workflow_id = %state.workflow_id(), workflow, "Workflow started");
        self.emit(WorkflowEvent::WorkflowStarted {
            workflow_id: state.workflow_id(),
            workflow: workflow.to_string(),
        });
        state
    }

    pub(crate) fn complete<S: Stage>(
        &self,
        stage: S,
        identifier: Option<DerivedIdentifier>,
        holdings: Vec<AccountHoldings>,
        state: WorkflowState,
    ) -> WorkflowReport<S> {
        tracing::info!(
            workflow_id = %state.workflow_id(),
            stage = stage.name(),
            records = state.len(),
            "Workflow completed"
        );
        self.emit(WorkflowEvent::WorkflowCompleted {
            workflow_id: state.workflow_id(),
            stages: state.len(),
        });
        WorkflowReport {
            stage,
            identifier,
            state,
            holdings,
        }
    }

    pub(crate) fn halt(
        &self,
        stage: StageKind,
        error: FlowError,
        state: WorkflowState,
    ) -> WorkflowHalted {
        let last_reference = error
            .last_reference()
            .cloned()
            .or_else(|| state.last_reference().cloned());
        self.emit(WorkflowEvent::WorkflowHalted {
            workflow_id: state.workflow_id(),
            stage,
            kind: error.kind(),
            last_reference: last_reference.clone(),
        });
        WorkflowHalted {
            stage,
            error,
            last_reference,
            state,
        }
    }

    /// Every participating account must exist before anything is submitted.
    pub(crate) async fn preflight(
        &self,
        accounts: &[&AccountRef],
        cancel: &CancelSignal,
    ) -> Result<(), FlowError> {
        if !self.config.preflight_accounts {
            return Ok(());
        }
        let readiness = self.readiness();
        for account in accounts {
            readiness.await_account(account, cancel).await?;
        }
        Ok(())
    }

    pub(crate) fn moved<S: Stage>(
        &self,
        machine: &mut StageMachine<S>,
        step: fn(&mut StageMachine<S>) -> Result<S, FlowError>,
    ) -> Result<(), FlowError> {
        let left = step(machine)?;
        self.emit(WorkflowEvent::Transitioned {
            from: left.name().to_string(),
            to: machine.current().name().to_string(),
        });
        Ok(())
    }

    pub(crate) async fn transact(
        &self,
        stage: StageKind,
        descriptor: &TransactionDescriptor,
        signer: &dyn SigningIdentity,
        cancel: &CancelSignal,
    ) -> StageRun {
        self.emit(WorkflowEvent::StageStarted { stage });
        tracing::info!(stage = %stage, kind = %descriptor.kind(), "Stage started");

        match self.lifecycle().execute(stage, descriptor, signer, cancel).await {
            Ok(outcome) => {
                let result = match (outcome.failure(), &outcome.confirmation) {
                    (Some(error), _) => Err(error),
                    (None, Some(confirmed)) => Ok(confirmed.clone()),
                    (None, None) => Err(FlowError::malformed(
                        "tx",
                        "successful lifecycle without a confirmation",
                    )),
                };
                StageRun {
                    lifecycle: Some(outcome),
                    result,
                }
            }
            Err(error) => StageRun {
                lifecycle: None,
                result: Err(error),
            },
        }
    }

    pub(crate) fn record_success(
        &self,
        state: &mut WorkflowState,
        stage: StageKind,
        descriptor: &TransactionDescriptor,
        lifecycle: Option<LifecycleOutcome>,
        identifier: Option<DerivedIdentifier>,
    ) {
        let mut entry = StageEntry::new(
            stage,
            StageOutcome::Completed {
                verdict: Verdict::Success,
            },
        )
        .with_descriptor(descriptor.clone())
        .with_lifecycle(lifecycle);
        if let Some(identifier) = identifier {
            entry = entry.with_identifier(identifier);
        }
        state.append(entry);
    }

    /// Journal a failed stage; returns whether it is fatal.
    pub(crate) fn record_failure(
        &self,
        state: &mut WorkflowState,
        stage: StageKind,
        descriptor: Option<&TransactionDescriptor>,
        lifecycle: Option<LifecycleOutcome>,
        error: &FlowError,
    ) -> bool {
        let fatal = self.config.stages.is_fatal(stage, error);
        let mut entry =
            StageEntry::new(stage, StageOutcome::failed(error, fatal)).with_lifecycle(lifecycle);
        if let Some(descriptor) = descriptor {
            entry = entry.with_descriptor(descriptor.clone());
        }
        state.append(entry);

        if fatal {
            tracing::error!(stage = %stage, kind = ?error.kind(), error = %error, "Stage failed");
        } else {
            tracing::warn!(stage = %stage, kind = ?error.kind(), error = %error, "Stage failed, continuing");
        }
        self.emit(WorkflowEvent::StageFailed {
            stage,
            kind: error.kind(),
            message: error.to_string(),
            fatal,
        });
        fatal
    }

    /// Run a stage whose derived identifier a later stage depends on.
    ///
    /// Any failure, including a missing identifier, is returned as an error.
    pub(crate) async fn identifier_stage(
        &self,
        state: &mut WorkflowState,
        stage: StageKind,
        descriptor: &TransactionDescriptor,
        signer: &dyn SigningIdentity,
        field: IdentifierField,
        cancel: &CancelSignal,
    ) -> Result<DerivedIdentifier, FlowError> {
        let run = self.transact(stage, descriptor, signer, cancel).await;
        let confirmed = match run.result {
            Ok(confirmed) => confirmed,
            Err(error) => {
                self.record_failure(state, stage, Some(descriptor), run.lifecycle, &error);
                return Err(error);
            }
        };

        let error = match self.resolver().resolve(&confirmed, field, cancel).await {
            Ok(Resolution::Found {
                identifier,
                attempts,
            }) => {
                self.emit(WorkflowEvent::IdentifierResolved {
                    stage,
                    identifier: identifier.clone(),
                    attempts,
                });
                self.record_success(
                    state,
                    stage,
                    descriptor,
                    run.lifecycle,
                    Some(identifier.clone()),
                );
                return Ok(identifier);
            }
            Ok(Resolution::NotFound { attempts }) => {
                self.emit(WorkflowEvent::IdentifierMissing {
                    stage,
                    tx_ref: confirmed.reference.clone(),
                    attempts,
                });
                FlowError::IdentifierNotFound {
                    field: field.name(),
                    reference: confirmed.reference.clone(),
                    attempts,
                }
            }
            Ok(Resolution::Cancelled) => FlowError::Cancelled {
                reference: Some(confirmed.reference.clone()),
            },
            Err(error) => error,
        };
        self.record_failure(state, stage, Some(descriptor), run.lifecycle, &error);
        Err(error)
    }

    /// Run a stage nothing later depends on. A non-fatal failure yields `None`.
    pub(crate) async fn optional_stage(
        &self,
        state: &mut WorkflowState,
        stage: StageKind,
        descriptor: &TransactionDescriptor,
        signer: &dyn SigningIdentity,
        cancel: &CancelSignal,
    ) -> Result<Option<ConfirmationOutcome>, FlowError> {
        let run = self.transact(stage, descriptor, signer, cancel).await;
        match run.result {
            Ok(confirmed) => {
                self.record_success(state, stage, descriptor, run.lifecycle, None);
                Ok(Some(confirmed))
            }
            Err(error) => {
                if self.record_failure(state, stage, Some(descriptor), run.lifecycle, &error) {
                    Err(error)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Best-effort holdings report. Never fails the workflow.
    pub(crate) async fn verify(
        &self,
        state: &mut WorkflowState,
        targets: &[(AccountRef, HoldingClass)],
    ) -> Vec<AccountHoldings> {
        let stage = StageKind::Verification;
        self.emit(WorkflowEvent::StageStarted { stage });

        let reader = self.reader();
        let mut observed = Vec::new();
        let mut failures = Vec::new();
        for (account, class) in targets {
            match reader.holdings(account, *class).await {
                Ok(holdings) => {
                    self.emit(WorkflowEvent::HoldingsObserved {
                        account: account.clone(),
                        class: *class,
                        holdings: holdings.clone(),
                    });
                    observed.push(AccountHoldings {
                        account: account.clone(),
                        class: *class,
                        holdings,
                    });
                }
                Err(error) => {
                    self.emit(WorkflowEvent::ObservationFailed {
                        account: account.clone(),
                        class: *class,
                        message: error.to_string(),
                    });
                    failures.push(error.to_string());
                }
            }
        }

        if failures.is_empty() {
            let count = observed.iter().map(|o| o.holdings.len()).sum();
            state.append(StageEntry::new(
                stage,
                StageOutcome::Observed { holdings: count },
            ));
        } else {
            let error = FlowError::Observability(failures.join("; "));
            self.record_failure(state, stage, None, None, &error);
        }
        observed
    }
}

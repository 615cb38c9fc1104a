//! Ledgerflow Engine
//!
//! Client-side lifecycle of ledger transactions and the chaining of
//! transactions that depend on identifiers derived from earlier ones.
//!
//! ## Components
//!
//! - **Gateway**: one submission per call, transport failure kept apart from rejection
//! - **Confirmation**: bounded wait for inclusion in a validated ledger
//! - **Lifecycle**: gateway plus waiter, resubmitting temporary-class results
//! - **Resolver**: capped lookup of a derived identifier, "not found" as a value
//! - **Orchestrator**: stage machine over dependent transactions, with a
//!   per-stage failure policy and a hash-chained journal
//! - **State reader**: best-effort holdings queries
//!
//! Network access goes through [`LedgerClient`]; signing through
//! [`SigningIdentity`]. Time goes through [`Sleeper`] so tests never wait.

#![deny(unsafe_code)]

pub mod cancel;
pub mod client;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod escrow;
pub mod events;
pub mod gateway;
pub mod journal;
pub mod lifecycle;
pub mod orchestrator;
pub mod policy;
pub mod readiness;
pub mod resolver;
pub mod retry;
pub mod session;
pub mod stage;
pub mod state_reader;
pub mod testing;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use client::{LedgerClient, LedgerQuery, QueryResponse, SigningIdentity, SubmitAuthorization};
pub use config::{EngineConfig, ReportingConfig};
pub use confirmation::{interpret_lookup, Confirmation, ConfirmationWaiter};
pub use error::{ErrorKind, FlowError};
pub use escrow::EscrowPlan;
pub use events::{EventSink, RecordingEventSink, TracingEventSink, WorkflowEvent};
pub use gateway::SubmissionGateway;
pub use journal::{StageEntry, StageOutcome, StageRecord, WorkflowState};
pub use lifecycle::{LifecycleOutcome, TransactionLifecycle};
pub use orchestrator::{
    AccountHoldings, DependencyOrchestrator, MptPlan, WorkflowHalted, WorkflowReport,
};
pub use policy::{FailurePolicy, StageKind, StagePolicyTable};
pub use readiness::{AccountReadiness, AccountSnapshot};
pub use resolver::{IdentifierField, IdentifierResolver, Resolution};
pub use retry::{pause, poll, Backoff, PollOutcome, RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
pub use session::with_connection;
pub use stage::{EscrowStage, Stage, StageMachine, WorkflowStage};
pub use state_reader::{Holding, HoldingClass, StateReader};

//! Submit, confirm and resubmit one transaction.

use crate::cancel::CancelSignal;
use crate::client::SigningIdentity;
use crate::confirmation::{Confirmation, ConfirmationWaiter};
use crate::error::FlowError;
use crate::events::{EventSink, WorkflowEvent};
use crate::gateway::SubmissionGateway;
use crate::policy::StageKind;
use crate::retry::{pause, RetryPolicy, Sleeper};
use ledgerflow_types::{
    ConfirmationOutcome, ResultClass, SubmissionResult, TransactionDescriptor, TxRef, Verdict,
};
use std::sync::Arc;

/// Everything known about a transaction once its lifecycle has ended.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleOutcome {
    pub verdict: Verdict,
    /// The last submission made.
    pub submission: SubmissionResult,
    pub confirmation: Option<ConfirmationOutcome>,
    /// Most recent reference the network accepted, if any.
    pub last_reference: Option<TxRef>,
    pub submissions: u32,
    /// Validation polls made for the last accepted submission.
    pub polls: u32,
}

impl LifecycleOutcome {
    /// The error a non-successful lifecycle corresponds to.
    pub fn failure(&self) -> Option<FlowError> {
        match self.verdict {
            Verdict::Success => None,
            Verdict::PermanentFailure | Verdict::TemporaryFailure => {
                let code = self
                    .confirmation
                    .as_ref()
                    .map(|c| c.result.clone())
                    .unwrap_or_else(|| self.submission.preliminary.clone());
                Some(FlowError::Rejected {
                    code,
                    reference: self.last_reference.clone(),
                })
            }
            Verdict::Unconfirmed => Some(FlowError::Unconfirmed {
                reference: self.last_reference.clone(),
                attempts: self.submissions.max(self.polls),
            }),
            Verdict::Cancelled => Some(FlowError::Cancelled {
                reference: self.last_reference.clone(),
            }),
        }
    }
}

/// Gateway plus waiter, with bounded resubmission of temporary-class results.
#[derive(Clone)]
pub struct TransactionLifecycle {
    gateway: SubmissionGateway,
    waiter: ConfirmationWaiter,
    submission_policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    events: Arc<dyn EventSink>,
}

impl TransactionLifecycle {
    pub fn new(
        gateway: SubmissionGateway,
        waiter: ConfirmationWaiter,
        submission_policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            gateway,
            waiter,
            submission_policy,
            sleeper,
            events,
        }
    }

    pub async fn execute(
        &self,
        stage: StageKind,
        descriptor: &TransactionDescriptor,
        signer: &dyn SigningIdentity,
        cancel: &CancelSignal,
    ) -> Result<LifecycleOutcome, FlowError> {
        let max_submissions = self.submission_policy.max_attempts.max(1);
        let mut submissions = 0;
        let mut last_reference: Option<TxRef> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(FlowError::Cancelled {
                    reference: last_reference,
                });
            }

            submissions += 1;
            let submission = self.gateway.submit(descriptor, signer).await?;
            self.events.emit(&WorkflowEvent::Submitted {
                stage,
                tx_ref: submission.reference.clone(),
                preliminary: submission.preliminary.clone(),
                accepted: submission.accepted,
                attempt: submissions,
            });

            let finished = |verdict, submission, confirmation, last_reference, polls| {
                Ok(LifecycleOutcome {
                    verdict,
                    submission,
                    confirmation,
                    last_reference,
                    submissions,
                    polls,
                })
            };

            if !submission.accepted {
                match submission.class() {
                    ResultClass::Temporary => {
                        if submissions >= max_submissions {
                            return finished(
                                Verdict::Unconfirmed,
                                submission,
                                None,
                                last_reference,
                                0,
                            );
                        }
                    }
                    _ => {
                        tracing::warn!(
                            stage = %stage,
                            code = %submission.preliminary,
                            "Submission rejected"
                        );
                        return finished(
                            Verdict::PermanentFailure,
                            submission,
                            None,
                            last_reference,
                            0,
                        );
                    }
                }
            } else {
                let reference = submission
                    .reference
                    .clone()
                    .ok_or_else(|| FlowError::malformed("submit", "accepted without a hash"))?;
                last_reference = Some(reference.clone());

                match self.waiter.await_validation(&reference, cancel).await? {
                    Confirmation::Validated(outcome) => {
                        self.events.emit(&WorkflowEvent::Confirmed {
                            stage,
                            tx_ref: reference.clone(),
                            result: outcome.result.clone(),
                            ledger_index: outcome.ledger_index,
                        });
                        let class = outcome.result.classify();
                        let resubmit = matches!(class, ResultClass::Temporary | ResultClass::Pending)
                            && submissions < max_submissions;
                        if !resubmit {
                            // A temporary result left over once resubmissions run out was
                            // never resolved either way.
                            let verdict = match class {
                                ResultClass::Temporary => Verdict::Unconfirmed,
                                class => Verdict::from(class),
                            };
                            return finished(
                                verdict,
                                submission,
                                Some(outcome),
                                last_reference,
                                0,
                            );
                        }
                    }
                    Confirmation::Unconfirmed { attempts, .. } => {
                        self.events.emit(&WorkflowEvent::Unconfirmed {
                            stage,
                            tx_ref: Some(reference),
                            attempts,
                        });
                        return finished(
                            Verdict::Unconfirmed,
                            submission,
                            None,
                            last_reference,
                            attempts,
                        );
                    }
                    Confirmation::Cancelled { .. } => {
                        return finished(Verdict::Cancelled, submission, None, last_reference, 0);
                    }
                }
            }

            let delay = self.submission_policy.delay_for(submissions);
            self.events.emit(&WorkflowEvent::Resubmitting {
                stage,
                attempt: submissions + 1,
                code: submission.preliminary.clone(),
                delay_ms: delay.as_millis() as u64,
            });
            tracing::info!(
                stage = %stage,
                attempt = submissions + 1,
                code = %submission.preliminary,
                "Resubmitting after temporary result"
            );
            if !pause(self.sleeper.as_ref(), delay, cancel).await {
                return finished(Verdict::Cancelled, submission, None, last_reference, 0);
            }
        }
    }
}

//! Bounded retry policies and the sleeper seam.
//!
//! Every wait in the engine goes through a [`Sleeper`], so tests substitute a
//! [`RecordingSleeper`] and assert on the delays that would have been taken.

use crate::cancel::CancelSignal;
use crate::error::FlowError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Delay between consecutive attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
    Fixed {
        delay_ms: u64,
    },
    Exponential {
        initial_ms: u64,
        multiplier: f64,
        max_ms: u64,
    },
}

/// Attempt bound plus delay function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first. Never zero.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed {
                delay_ms: delay.as_millis() as u64,
            },
        }
    }

    pub fn exponential(max_attempts: u32, initial: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential {
                initial_ms: initial.as_millis() as u64,
                multiplier,
                max_ms: max.as_millis() as u64,
            },
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            Backoff::Exponential {
                initial_ms,
                multiplier,
                max_ms,
            } => {
                let exponent = attempt.saturating_sub(1).min(64) as i32;
                let scaled = (*initial_ms as f64) * multiplier.powi(exponent);
                let capped = if scaled.is_finite() {
                    scaled.min(*max_ms as f64)
                } else {
                    *max_ms as f64
                };
                Duration::from_millis(capped as u64)
            }
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), FlowError> {
        if self.max_attempts == 0 {
            return Err(FlowError::Configuration(format!(
                "{name}: max_attempts must be at least 1"
            )));
        }
        if let Backoff::Exponential {
            initial_ms,
            multiplier,
            max_ms,
        } = &self.backoff
        {
            if !multiplier.is_finite() || *multiplier < 1.0 {
                return Err(FlowError::Configuration(format!(
                    "{name}: multiplier must be a finite value >= 1.0"
                )));
            }
            if max_ms < initial_ms {
                return Err(FlowError::Configuration(format!(
                    "{name}: max_ms ({max_ms}) is below initial_ms ({initial_ms})"
                )));
            }
        }
        Ok(())
    }
}

// ── Sleeper ──────────────────────────────────────────────────────────

/// Cooperative, non-blocking delay.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and remembers every requested delay.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    pub fn total(&self) -> Duration {
        self.delays.lock().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
        tokio::task::yield_now().await;
    }
}

/// Sleep unless cancelled first. Returns `false` when cancelled.
pub async fn pause(sleeper: &dyn Sleeper, duration: Duration, cancel: &CancelSignal) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = sleeper.sleep(duration) => !cancel.is_cancelled(),
    }
}

// ── Polling ──────────────────────────────────────────────────────────

/// Result of a bounded poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Ready { value: T, attempts: u32 },
    Exhausted { attempts: u32 },
    Cancelled { attempts: u32 },
}

/// Probe up to `policy.max_attempts` times, sleeping between probes.
///
/// The first probe runs immediately. A probe returning `Ok(None)` means "not
/// yet"; errors propagate without further attempts.
pub async fn poll<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    cancel: &CancelSignal,
    mut probe: F,
) -> Result<PollOutcome<T>, FlowError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, FlowError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    while attempts < max_attempts {
        if cancel.is_cancelled() {
            return Ok(PollOutcome::Cancelled { attempts });
        }
        attempts += 1;
        if let Some(value) = probe(attempts).await? {
            return Ok(PollOutcome::Ready { value, attempts });
        }
        if attempts < max_attempts && !pause(sleeper, policy.delay_for(attempts), cancel).await {
            return Ok(PollOutcome::Cancelled { attempts });
        }
    }

    Ok(PollOutcome::Exhausted { attempts })
}

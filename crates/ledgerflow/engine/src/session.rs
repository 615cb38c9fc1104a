//! Scoped ledger connection.

use crate::client::LedgerClient;
use crate::error::FlowError;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Connect, run `body`, then disconnect on every exit path.
///
/// A panic inside `body` is resumed after the disconnect. A failed disconnect
/// is logged and never replaces the body's own result.
pub async fn with_connection<T, F, Fut>(client: &dyn LedgerClient, body: F) -> Result<T, FlowError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    client.connect().await?;
    tracing::debug!("Ledger connection opened");

    let outcome = AssertUnwindSafe(body()).catch_unwind().await;

    match client.disconnect().await {
        Ok(()) => tracing::debug!("Ledger connection closed"),
        Err(err) => tracing::warn!(error = %err, "Ledger disconnect failed"),
    }

    match outcome {
        Ok(value) => Ok(value),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLedger;
    use std::sync::Arc;

    #[tokio::test]
    async fn disconnects_after_success() {
        let ledger = ScriptedLedger::new();
        let value = with_connection(&ledger, || async { 7 }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(ledger.connects(), 1);
        assert_eq!(ledger.disconnects(), 1);
        assert!(!ledger.is_connected());
    }

    #[tokio::test]
    async fn disconnects_after_body_error() {
        let ledger = ScriptedLedger::new();
        let result: Result<Result<(), &str>, FlowError> =
            with_connection(&ledger, || async { Err("stage failed") }).await;
        assert_eq!(result.unwrap(), Err("stage failed"));
        assert_eq!(ledger.disconnects(), 1);
    }

    #[tokio::test]
    async fn disconnects_when_the_body_panics() {
        let ledger = Arc::new(ScriptedLedger::new());
        let task = tokio::spawn({
            let ledger = ledger.clone();
            async move {
                with_connection(ledger.as_ref(), || async {
                    panic!("workflow body panicked");
                })
                .await
            }
        });

        let joined: Result<Result<(), FlowError>, _> = task.await;
        assert!(joined.unwrap_err().is_panic());
        assert_eq!(ledger.disconnects(), 1);
    }

    #[tokio::test]
    async fn connect_failure_skips_the_body() {
        let ledger = ScriptedLedger::new();
        ledger.fail_connect();
        let mut ran = false;
        let result = with_connection(&ledger, || async {
            ran = true;
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), crate::ErrorKind::Transport);
        assert!(!ran);
        assert_eq!(ledger.disconnects(), 0);
    }
}

//! JSON-RPC ledger client over HTTP.

use crate::endpoint::Endpoint;
use async_trait::async_trait;
use ledgerflow_engine::{
    FlowError, LedgerClient, LedgerQuery, QueryResponse, SigningIdentity, SubmitAuthorization,
};
use ledgerflow_types::{EngineResult, SubmissionResult, TransactionDescriptor, TxRef};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Talks to a rippled-compatible JSON-RPC endpoint.
///
/// HTTP is stateless, so `connect` only checks the server answers. Requests
/// are serialized through a single lock.
pub struct JsonRpcLedgerClient {
    http: Client,
    url: String,
    connected: AtomicBool,
    in_flight: Mutex<()>,
}

impl JsonRpcLedgerClient {
    pub fn new(endpoint: &Endpoint, timeout: Duration) -> Result<Self, FlowError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FlowError::Configuration(format!("http client: {err}")))?;

        Ok(Self {
            http,
            url: endpoint.url().to_string(),
            connected: AtomicBool::new(false),
            in_flight: Mutex::new(()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST one request and return its `result` object.
    async fn call(&self, method: &str, params: Value) -> Result<Value, FlowError> {
        let payload = json!({ "method": method, "params": [params] });

        let _guard = self.in_flight.lock().await;
        tracing::debug!(method, url = %self.url, "JSON-RPC request");
        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| FlowError::transport(method, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::transport(method, format!("HTTP {status}: {body}")));
        }

        let mut body: Value = response
            .json()
            .await
            .map_err(|err| FlowError::malformed(method, err))?;
        match body.get_mut("result").map(Value::take) {
            Some(result @ Value::Object(_)) => Ok(result),
            _ => Err(FlowError::malformed(method, "response has no result object")),
        }
    }

    fn ensure_connected(&self, operation: &str) -> Result<(), FlowError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(FlowError::transport(operation, "not connected"))
        }
    }
}

fn is_error(result: &Value) -> bool {
    result.get("status").and_then(Value::as_str) == Some("error")
}

fn text(result: &Value, field: &str) -> Option<String> {
    result.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Interpret the `result` object of a `submit` call.
pub fn parse_submission(result: &Value) -> Result<SubmissionResult, FlowError> {
    if is_error(result) {
        return Err(FlowError::SubmitRefused {
            code: text(result, "error").unwrap_or_else(|| "unknown".to_string()),
            message: text(result, "error_message")
                .or_else(|| text(result, "error_exception"))
                .unwrap_or_default(),
        });
    }

    let code = result
        .get("engine_result")
        .and_then(Value::as_str)
        .ok_or_else(|| FlowError::malformed("submit", "no engine_result"))?;
    let preliminary =
        EngineResult::parse(code).map_err(|err| FlowError::malformed("submit", err))?;

    if !preliminary.is_relayed() {
        return Ok(SubmissionResult::rejected(
            preliminary,
            text(result, "engine_result_message"),
        ));
    }

    let hash = result
        .pointer("/tx_json/hash")
        .and_then(Value::as_str)
        .ok_or_else(|| FlowError::malformed("submit", "accepted without tx_json.hash"))?;
    let reference = TxRef::parse(hash).map_err(|err| FlowError::malformed("submit", err))?;
    Ok(SubmissionResult::accepted(reference, preliminary))
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn connect(&self) -> Result<(), FlowError> {
        let result = self.call("server_info", json!({})).await?;
        if is_error(&result) {
            return Err(FlowError::transport(
                "server_info",
                text(&result, "error").unwrap_or_else(|| "server refused".to_string()),
            ));
        }
        let state = result
            .pointer("/info/server_state")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        tracing::info!(url = %self.url, server_state = state, "Connected to ledger");
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), FlowError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn submit(
        &self,
        descriptor: &TransactionDescriptor,
        signer: &dyn SigningIdentity,
    ) -> Result<SubmissionResult, FlowError> {
        self.ensure_connected("submit")?;
        let tx_json = descriptor.to_tx_json();
        let params = match signer.authorize(&tx_json)? {
            SubmitAuthorization::SignedBlob(blob) => json!({ "tx_blob": blob }),
            SubmitAuthorization::ServerSign { secret } => json!({
                "tx_json": tx_json,
                "secret": secret,
            }),
        };

        let result = self.call("submit", params).await?;
        let submission = parse_submission(&result)?;
        tracing::debug!(
            kind = %descriptor.kind(),
            code = %submission.preliminary,
            accepted = submission.accepted,
            "Submission answered"
        );
        Ok(submission)
    }

    async fn query(&self, query: &LedgerQuery) -> Result<QueryResponse, FlowError> {
        self.ensure_connected(query.method())?;
        let result = self.call(query.method(), query.params()).await?;
        if is_error(&result) {
            return Ok(QueryResponse::Error {
                code: text(&result, "error").unwrap_or_else(|| "unknown".to_string()),
                message: text(&result, "error_message"),
            });
        }
        Ok(QueryResponse::Success { result })
    }
}

//! In-memory scripted ledger for exercising the engine without a network.
//!
//! Each transaction kind gets a queue of [`TxScript`]s describing what the
//! network answers on submission and on the lookups that follow. Kinds without
//! a script are accepted and validate with `tesSUCCESS` on the first lookup.

use crate::client::{LedgerClient, LedgerQuery, QueryResponse, SigningIdentity, SubmitAuthorization};
use crate::error::FlowError;
use async_trait::async_trait;
use ledgerflow_types::{
    AccountRef, EngineResult, SubmissionResult, TransactionDescriptor, TxKind, TxRef,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};

/// Scripted network behaviour for one submission.
#[derive(Debug, Clone)]
pub struct TxScript {
    preliminary: String,
    transport_failure: bool,
    not_found: usize,
    pending: usize,
    final_result: Option<String>,
    bare_validations: usize,
    meta: Map<String, Value>,
    sequence: Option<u32>,
}

impl TxScript {
    /// Accepted with `tesSUCCESS`, then validated with `result`.
    pub fn validated(result: &str) -> Self {
        Self {
            preliminary: "tesSUCCESS".to_string(),
            transport_failure: false,
            not_found: 0,
            pending: 0,
            final_result: Some(result.to_string()),
            bare_validations: 0,
            meta: Map::new(),
            sequence: None,
        }
    }

    /// Refused at submission with `code`; never reaches a ledger.
    pub fn rejected(code: &str) -> Self {
        Self {
            preliminary: code.to_string(),
            final_result: None,
            ..Self::validated("tesSUCCESS")
        }
    }

    /// Accepted, but never validated.
    pub fn never_validated() -> Self {
        Self {
            final_result: None,
            ..Self::validated("tesSUCCESS")
        }
    }

    /// The submission request fails at the transport.
    pub fn transport_failure() -> Self {
        Self {
            transport_failure: true,
            ..Self::validated("tesSUCCESS")
        }
    }

    pub fn with_preliminary(mut self, code: &str) -> Self {
        self.preliminary = code.to_string();
        self
    }

    /// Lookups answer `txnNotFound` this many times first.
    pub fn not_found_for(mut self, lookups: usize) -> Self {
        self.not_found = lookups;
        self
    }

    /// Lookups report `validated: false` this many times before validation.
    pub fn pending_for(mut self, lookups: usize) -> Self {
        self.pending = lookups;
        self
    }

    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.meta.insert(key.to_string(), value);
        self
    }

    pub fn with_mpt_issuance_id(self, id: &str) -> Self {
        self.with_meta("mpt_issuance_id", json!(id))
    }

    /// Extra metadata only shows up after this many validated lookups.
    pub fn metadata_lag(mut self, lookups: usize) -> Self {
        self.bare_validations = lookups;
        self
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

#[derive(Default)]
struct LedgerState {
    connected: bool,
    connects: u32,
    disconnects: u32,
    fail_connect: bool,
    counter: u64,
    scripts: HashMap<TxKind, VecDeque<TxScript>>,
    lookups: HashMap<TxRef, VecDeque<QueryResponse>>,
    missing_accounts: HashMap<AccountRef, Option<u32>>,
    objects: HashMap<(AccountRef, String), Vec<Value>>,
    objects_error: Option<String>,
    submitted: Vec<TransactionDescriptor>,
    queries: Vec<LedgerQuery>,
}

/// Scripted [`LedgerClient`].
#[derive(Default)]
pub struct ScriptedLedger {
    state: Mutex<LedgerState>,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, kind: TxKind, script: TxScript) -> &Self {
        self.state
            .lock()
            .scripts
            .entry(kind)
            .or_default()
            .push_back(script);
        self
    }

    /// `account_info` answers `actNotFound` `times` times, or always for `None`.
    pub fn missing_account(&self, account: &AccountRef, times: Option<u32>) -> &Self {
        self.state
            .lock()
            .missing_accounts
            .insert(account.clone(), times);
        self
    }

    pub fn add_object(&self, account: &AccountRef, object_type: &str, object: Value) -> &Self {
        self.state
            .lock()
            .objects
            .entry((account.clone(), object_type.to_string()))
            .or_default()
            .push(object);
        self
    }

    /// Every `account_objects` query answers with this error code.
    pub fn fail_objects(&self, code: &str) -> &Self {
        self.state.lock().objects_error = Some(code.to_string());
        self
    }

    pub fn fail_connect(&self) -> &Self {
        self.state.lock().fail_connect = true;
        self
    }

    pub fn submitted(&self) -> Vec<TransactionDescriptor> {
        self.state.lock().submitted.clone()
    }

    pub fn submitted_kinds(&self) -> Vec<TxKind> {
        self.state
            .lock()
            .submitted
            .iter()
            .map(TransactionDescriptor::kind)
            .collect()
    }

    pub fn queries(&self) -> Vec<LedgerQuery> {
        self.state.lock().queries.clone()
    }

    pub fn lookups_of(&self, reference: &TxRef) -> usize {
        self.state
            .lock()
            .queries
            .iter()
            .filter(|q| matches!(q, LedgerQuery::TransactionLookup { reference: r } if r == reference))
            .count()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().connects
    }

    pub fn disconnects(&self) -> u32 {
        self.state.lock().disconnects
    }
}

fn scripted_lookups(
    reference: &TxRef,
    descriptor: &TransactionDescriptor,
    script: &TxScript,
    sequence: u32,
    ledger_index: u64,
) -> VecDeque<QueryResponse> {
    let tx_json = json!({
        "TransactionType": descriptor.kind().transaction_type(),
        "Account": descriptor.sender().as_str(),
        "Sequence": sequence,
    });
    let mut responses = VecDeque::new();

    for _ in 0..script.not_found {
        responses.push_back(QueryResponse::error("txnNotFound"));
    }
    let pending = QueryResponse::success(json!({
        "hash": reference.as_str(),
        "validated": false,
        "tx_json": tx_json,
    }));
    for _ in 0..script.pending {
        responses.push_back(pending.clone());
    }

    match &script.final_result {
        Some(result) => {
            let validated = |with_extras: bool| {
                let mut meta = Map::new();
                meta.insert("TransactionResult".into(), json!(result));
                if with_extras {
                    meta.extend(script.meta.clone());
                }
                QueryResponse::success(json!({
                    "hash": reference.as_str(),
                    "validated": true,
                    "ledger_index": ledger_index,
                    "meta": meta,
                    "tx_json": tx_json,
                }))
            };
            for _ in 0..script.bare_validations {
                responses.push_back(validated(false));
            }
            responses.push_back(validated(true));
        }
        None => responses.push_back(pending),
    }
    responses
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn connect(&self) -> Result<(), FlowError> {
        let mut state = self.state.lock();
        state.connects += 1;
        if state.fail_connect {
            return Err(FlowError::transport("connect", "scripted connect failure"));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), FlowError> {
        let mut state = self.state.lock();
        state.disconnects += 1;
        state.connected = false;
        Ok(())
    }

    async fn submit(
        &self,
        descriptor: &TransactionDescriptor,
        signer: &dyn SigningIdentity,
    ) -> Result<SubmissionResult, FlowError> {
        signer.authorize(&descriptor.to_tx_json())?;

        let mut state = self.state.lock();
        if !state.connected {
            return Err(FlowError::transport("submit", "not connected"));
        }
        state.submitted.push(descriptor.clone());

        let script = state
            .scripts
            .get_mut(&descriptor.kind())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| TxScript::validated("tesSUCCESS"));
        if script.transport_failure {
            return Err(FlowError::transport("submit", "scripted transport failure"));
        }

        state.counter += 1;
        let counter = state.counter;
        let preliminary = EngineResult::parse(&script.preliminary)?;
        if !preliminary.is_relayed() {
            return Ok(SubmissionResult::rejected(
                preliminary,
                Some("scripted refusal".to_string()),
            ));
        }

        let reference = TxRef::parse(format!("{counter:016X}").repeat(4))?;
        let sequence = script.sequence.unwrap_or(counter as u32);
        let lookups = scripted_lookups(&reference, descriptor, &script, sequence, 1_000 + counter);
        state.lookups.insert(reference.clone(), lookups);
        Ok(SubmissionResult::accepted(reference, preliminary))
    }

    async fn query(&self, query: &LedgerQuery) -> Result<QueryResponse, FlowError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(FlowError::transport(query.method(), "not connected"));
        }
        state.queries.push(query.clone());

        match query {
            LedgerQuery::TransactionLookup { reference } => {
                let response = match state.lookups.get_mut(reference) {
                    Some(queue) if queue.len() > 1 => queue.pop_front(),
                    Some(queue) => queue.front().cloned(),
                    None => None,
                };
                Ok(response.unwrap_or_else(|| QueryResponse::error("txnNotFound")))
            }
            LedgerQuery::AccountInfo { account } => {
                if let Some(remaining) = state.missing_accounts.get_mut(account) {
                    match remaining {
                        None => return Ok(QueryResponse::error("actNotFound")),
                        Some(0) => {}
                        Some(n) => {
                            *n -= 1;
                            return Ok(QueryResponse::error("actNotFound"));
                        }
                    }
                }
                Ok(QueryResponse::success(json!({
                    "account_data": {
                        "Account": account.as_str(),
                        "Balance": "100000000",
                        "Sequence": 1,
                    },
                    "validated": true,
                })))
            }
            LedgerQuery::AccountObjects {
                account,
                object_type,
                limit,
                marker,
            } => {
                if let Some(code) = &state.objects_error {
                    return Ok(QueryResponse::error(code.clone()));
                }
                let key = (account.clone(), object_type.clone().unwrap_or_default());
                let objects = state.objects.get(&key).cloned().unwrap_or_default();
                let start = marker.as_ref().and_then(Value::as_u64).unwrap_or(0) as usize;
                let end = (start + *limit as usize).min(objects.len());
                let page: Vec<Value> = objects.get(start..end).unwrap_or_default().to_vec();

                let mut result = json!({
                    "account": account.as_str(),
                    "account_objects": page,
                    "validated": true,
                });
                if end < objects.len() {
                    result["marker"] = json!(end);
                }
                Ok(QueryResponse::success(result))
            }
        }
    }
}

/// Identity whose submissions are authorized by a placeholder secret.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    account: AccountRef,
}

impl StaticIdentity {
    pub fn new(account: AccountRef) -> Self {
        Self { account }
    }
}

impl SigningIdentity for StaticIdentity {
    fn account(&self) -> &AccountRef {
        &self.account
    }

    fn authorize(&self, _tx_json: &Value) -> Result<SubmitAuthorization, FlowError> {
        Ok(SubmitAuthorization::ServerSign {
            secret: "sScriptedSecret".to_string(),
        })
    }
}

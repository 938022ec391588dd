use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use rusty_met_forms_core::{LedgerPort, PortError};

use crate::config::FormsAdapterConfig;

/// Error codes the ledger uses for a wrong account password.
const CREDENTIAL_CODES: &[&str] = &["WRONG_PASSWORD", "INVALID_PASSWORD"];

/// Ledger reached over HTTP: `POST {base}/invoke/{operation}` with the JSON
/// payload as body.
#[derive(Debug, Clone)]
pub struct HttpLedgerAdapter {
    base_url: String,
    client: reqwest::Client,
}

impl HttpLedgerAdapter {
    pub fn with_config(config: &FormsAdapterConfig) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .timeout(config.ledger_timeout())
            .build()
            .map_err(|e| PortError::Transport(format!("failed to initialize ledger client: {e}")))?;
        Ok(Self {
            base_url: config.ledger_base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/invoke/{operation}", self.base_url)
    }
}

#[async_trait]
impl LedgerPort for HttpLedgerAdapter {
    async fn invoke(&self, operation: &str, payload: Value) -> Result<Value, PortError> {
        let response = self
            .client
            .post(self.endpoint(operation))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("ledger request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PortError::Transport(format!("ledger response read failed: {e}")))?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        debug!(operation, status = status.as_u16(), "ledger responded");

        if !status.is_success() || body.get("error").is_some() {
            let err = classify_failure(status, &body);
            warn!(operation, status = status.as_u16(), error = %err, "ledger operation failed");
            return Err(err);
        }
        Ok(body)
    }
}

/// Maps a failed ledger response to a port error. Wrong passwords become
/// `Credential` so forms can ask for the password again.
pub fn classify_failure(status: StatusCode, body: &Value) -> PortError {
    let error = body.get("error").unwrap_or(body);
    let code = error
        .get("code")
        .or_else(|| body.get("code"))
        .and_then(Value::as_str);
    let message = error
        .get("message")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .unwrap_or_default()
        .to_owned();

    let credential = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || code.is_some_and(|c| CREDENTIAL_CODES.contains(&c));
    if credential {
        PortError::Credential(message)
    } else if status.is_server_error() {
        PortError::Transport(format!("ledger status {status}: {message}"))
    } else {
        PortError::Rejected(message)
    }
}

/// One answer from [`InMemoryLedger`].
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub delay: Duration,
    pub result: Result<Value, PortError>,
}

impl ScriptedResponse {
    pub fn ok(value: Value) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(value),
        }
    }

    pub fn err(err: PortError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(err),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerCall {
    pub operation: String,
    pub payload: Value,
}

type Handler = Arc<dyn Fn(&Value) -> ScriptedResponse + Send + Sync>;

#[derive(Default)]
struct LedgerState {
    queued: HashMap<String, VecDeque<ScriptedResponse>>,
    handlers: HashMap<String, Handler>,
    calls: Vec<LedgerCall>,
}

impl fmt::Debug for LedgerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerState")
            .field("queued", &self.queued)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("calls", &self.calls.len())
            .finish()
    }
}

/// Scripted ledger for tests and offline runs. Queued responses are used
/// first, in order; then the operation's handler; anything else is rejected.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, operation: &str, response: ScriptedResponse) -> Result<(), PortError> {
        let mut state = self.lock()?;
        state
            .queued
            .entry(operation.to_owned())
            .or_default()
            .push_back(response);
        Ok(())
    }

    pub fn on<H>(&self, operation: &str, handler: H) -> Result<(), PortError>
    where
        H: Fn(&Value) -> ScriptedResponse + Send + Sync + 'static,
    {
        let mut state = self.lock()?;
        state.handlers.insert(operation.to_owned(), Arc::new(handler));
        Ok(())
    }

    pub fn calls(&self) -> Result<Vec<LedgerCall>, PortError> {
        Ok(self.lock()?.calls.clone())
    }

    pub fn calls_for(&self, operation: &str) -> Result<Vec<LedgerCall>, PortError> {
        Ok(self
            .lock()?
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .cloned()
            .collect())
    }

    pub fn call_count(&self, operation: &str) -> Result<usize, PortError> {
        Ok(self
            .lock()?
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LedgerState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("ledger lock poisoned: {e}")))
    }
}

#[async_trait]
impl LedgerPort for InMemoryLedger {
    async fn invoke(&self, operation: &str, payload: Value) -> Result<Value, PortError> {
        let scripted = {
            let mut state = self.lock()?;
            state.calls.push(LedgerCall {
                operation: operation.to_owned(),
                payload: payload.clone(),
            });
            let queued = state
                .queued
                .get_mut(operation)
                .and_then(VecDeque::pop_front);
            match queued {
                Some(response) => response,
                None => match state.handlers.get(operation) {
                    Some(handler) => handler(&payload),
                    None => ScriptedResponse::err(PortError::Rejected(format!(
                        "no scripted response for {operation}"
                    ))),
                },
            }
        };
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.result
    }
}

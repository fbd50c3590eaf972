//! Correlated Request Sender.
//!
//! Posts one JSON-RPC envelope to a session-scoped message endpoint and
//! classifies every attempt. Transport failures, non-2xx statuses and
//! transient JSON-RPC errors are retried under [`RetryPolicy`]; a non-JSON
//! body or a non-transient JSON-RPC error ends the call immediately.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use mrp_domain::config::RequestConfig;
use mrp_domain::trace::ProbeEvent;

use crate::endpoint::ensure_service_name;
use crate::protocol::{self, JsonRpcError, JsonRpcRequest, RequestId};
use crate::retry::{run_with_retry, RetryPolicy, TransientMatcher, Verdict};

/// Characters of a non-JSON body kept in diagnostics.
const BODY_PREVIEW_CHARS: usize = 200;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Options & requests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct SenderOptions {
    /// Per-attempt timeout. Keep it above the router's own ceiling so a
    /// router-side timeout comes back as a reply instead of a client give-up.
    pub timeout: Duration,
    pub backoff: Duration,
    pub transient: TransientMatcher,
}

impl Default for SenderOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(70),
            backoff: Duration::from_secs(1),
            transient: TransientMatcher::default(),
        }
    }
}

impl SenderOptions {
    pub fn from_config(cfg: &RequestConfig) -> Self {
        Self {
            timeout: Duration::from_millis(cfg.timeout_ms),
            backoff: Duration::from_millis(cfg.backoff_ms),
            transient: TransientMatcher::from_config(cfg),
        }
    }
}

/// One logical request: the envelope fields plus where and how often to send it.
#[derive(Debug, Clone)]
pub struct CorrelatedRequest {
    pub method: String,
    pub params: Value,
    pub id: RequestId,
    /// Message endpoint, normally already carrying `sessionId=`.
    pub endpoint: String,
    pub service_name: Option<String>,
    pub max_retries: u32,
}

impl CorrelatedRequest {
    pub fn new(
        method: impl Into<String>,
        id: impl Into<RequestId>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            params: Value::Object(Default::default()),
            id: id.into(),
            endpoint: endpoint.into(),
            service_name: None,
            max_retries: 0,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_service_name(mut self, service: impl Into<String>) -> Self {
        self.service_name = Some(service.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcomes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Why the last attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    Timeout { timeout_ms: u64 },
    Connection { reason: String },
    HttpStatus { status: u16, message: Option<String> },
    MalformedBody { status: u16, body: String },
    Rpc { code: i64, message: String },
    InvalidEndpoint { reason: String },
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Timeout { timeout_ms } => write!(f, "timed out after {timeout_ms}ms"),
            Failure::Connection { reason } => write!(f, "connection error: {reason}"),
            Failure::HttpStatus { status, message } => match message {
                Some(m) => write!(f, "HTTP {status}: {m}"),
                None => write!(f, "HTTP {status}"),
            },
            Failure::MalformedBody { status, body } => {
                write!(f, "Non-JSON response (status {status}): {body}")
            }
            Failure::Rpc { code, message } => write!(f, "JSON-RPC error {code}: {message}"),
            Failure::InvalidEndpoint { reason } => write!(f, "invalid endpoint: {reason}"),
        }
    }
}

/// Result of a correlated request after retries.
///
/// `failure` is `None` exactly when `success` is true. `response` is the last
/// observed body, if any.
#[derive(Debug, Clone, Serialize)]
pub struct RequestOutcome {
    pub success: bool,
    /// The router answered `202 Accepted`; the real response goes out over SSE.
    pub accepted: bool,
    pub attempts: u32,
    pub status: Option<u16>,
    pub response: Option<Value>,
    pub target_service: Option<String>,
    pub failure: Option<Failure>,
}

impl RequestOutcome {
    /// The JSON-RPC `result` member of the response.
    pub fn result(&self) -> Option<&Value> {
        self.response.as_ref()?.get("result")
    }

    /// One-line human-readable summary.
    pub fn detail(&self) -> String {
        let attempts = match self.attempts {
            1 => "1 attempt".to_owned(),
            n => format!("{n} attempts"),
        };
        match (&self.failure, self.accepted) {
            (Some(failure), _) => format!("{failure} after {attempts}"),
            (None, true) => format!("accepted (HTTP 202) after {attempts}, response deferred to SSE"),
            (None, false) => format!(
                "HTTP {} from {} after {attempts}",
                self.status.unwrap_or(0),
                self.target_service.as_deref().unwrap_or("unknown backend"),
            ),
        }
    }
}

/// The body reported for a response that is not JSON.
pub fn non_json_error(status: u16, body: &str) -> Value {
    serde_json::json!({
        "error": {
            "message": format!("Non-JSON response (status {status}): {}", preview(body)),
        }
    })
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

/// The `error` member of a response envelope, if set.
fn rpc_error(response: &Value) -> Option<JsonRpcError> {
    let raw = response.get("error").filter(|e| !e.is_null())?;
    let err = serde_json::from_value::<JsonRpcError>(raw.clone()).unwrap_or_else(|_| JsonRpcError {
        code: 0,
        message: raw.as_str().map(str::to_owned).unwrap_or_else(|| raw.to_string()),
        data: None,
    });
    Some(err)
}

// ── Single attempt ──

#[derive(Debug)]
struct Attempt {
    status: Option<u16>,
    response: Option<Value>,
    accepted: bool,
    failure: Option<Failure>,
    retryable: bool,
}

impl Attempt {
    fn ok(status: u16, response: Value) -> Self {
        Self {
            status: Some(status),
            response: Some(response),
            accepted: false,
            failure: None,
            retryable: false,
        }
    }

    fn accepted(status: u16) -> Self {
        Self {
            status: Some(status),
            response: None,
            accepted: true,
            failure: None,
            retryable: false,
        }
    }

    fn failed(status: Option<u16>, response: Option<Value>, failure: Failure, retryable: bool) -> Self {
        Self {
            status,
            response,
            accepted: false,
            failure: Some(failure),
            retryable,
        }
    }

    fn verdict(&self) -> Verdict {
        match (&self.failure, self.retryable) {
            (None, _) => Verdict::Success,
            (Some(_), true) => Verdict::Retryable,
            (Some(_), false) => Verdict::Terminal,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CorrelatedSender
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CorrelatedSender {
    http: reqwest::Client,
    opts: SenderOptions,
}

impl CorrelatedSender {
    /// Build a sender with its own HTTP client.
    pub fn new(opts: SenderOptions) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(opts.timeout).build()?;
        Ok(Self { http, opts })
    }

    pub fn options(&self) -> &SenderOptions {
        &self.opts
    }

    /// Send `req`, retrying per policy. Never fails past the caller; every
    /// failure ends up in the returned outcome.
    pub async fn send(&self, req: &CorrelatedRequest) -> RequestOutcome {
        let request_id = req.id.to_string();

        let url = match ensure_service_name(&req.endpoint, req.service_name.as_deref()) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(method = %req.method, request_id = %request_id, error = %e, "cannot send request");
                return RequestOutcome {
                    success: false,
                    accepted: false,
                    attempts: 0,
                    status: None,
                    response: None,
                    target_service: None,
                    failure: Some(Failure::InvalidEndpoint {
                        reason: e.to_string(),
                    }),
                };
            }
        };

        let envelope = JsonRpcRequest::new(req.id.clone(), req.method.clone(), req.params.clone());
        let policy = RetryPolicy::new(req.max_retries, self.opts.backoff);

        tracing::debug!(
            method = %req.method,
            request_id = %request_id,
            url = %url,
            max_attempts = policy.max_attempts(),
            "sending correlated request"
        );

        let url = url.as_str();
        let envelope = &envelope;
        let retried = run_with_retry(
            &policy,
            move |attempt| self.attempt(url, envelope, attempt),
            Attempt::verdict,
        )
        .await;

        let last = retried.value;
        let target_service = last
            .response
            .as_ref()
            .and_then(|r| r.get("result"))
            .and_then(protocol::target_service);

        let outcome = RequestOutcome {
            success: last.failure.is_none(),
            accepted: last.accepted,
            attempts: retried.attempts,
            status: last.status,
            response: last.response,
            target_service,
            failure: last.failure,
        };

        if outcome.success {
            tracing::info!(
                method = %req.method,
                request_id = %request_id,
                attempts = outcome.attempts,
                "{}",
                outcome.detail()
            );
        } else {
            tracing::error!(
                method = %req.method,
                request_id = %request_id,
                attempts = outcome.attempts,
                "request failed: {}",
                outcome.detail()
            );
        }

        ProbeEvent::RequestFinished {
            method: req.method.clone(),
            request_id,
            success: outcome.success,
            attempts: outcome.attempts,
            target_service: outcome.target_service.clone(),
        }
        .emit();

        outcome
    }

    async fn attempt(&self, url: &str, envelope: &JsonRpcRequest, attempt: u32) -> Attempt {
        let start = Instant::now();
        let result = self
            .http
            .post(url)
            .timeout(self.opts.timeout)
            .json(envelope)
            .send()
            .await;

        let outcome = match result {
            Ok(resp) => self.read_response(resp).await,
            Err(e) => Attempt::failed(None, None, self.transport_failure(&e), true),
        };

        ProbeEvent::RequestAttempt {
            method: envelope.method.clone(),
            request_id: envelope.id.to_string(),
            attempt: attempt + 1,
            status: outcome.status.unwrap_or(0),
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();

        if let Some(failure) = &outcome.failure {
            tracing::warn!(
                method = %envelope.method,
                request_id = %envelope.id,
                attempt = attempt + 1,
                retryable = outcome.retryable,
                "attempt failed: {failure}"
            );
        }
        outcome
    }

    async fn read_response(&self, resp: reqwest::Response) -> Attempt {
        let status = resp.status();
        let code = status.as_u16();

        if status == StatusCode::ACCEPTED {
            return Attempt::accepted(code);
        }

        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => return Attempt::failed(Some(code), None, self.transport_failure(&e), true),
        };
        let parsed: Option<Value> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let response = parsed.unwrap_or_else(|| non_json_error(code, &body));
            let message = rpc_error(&response).map(|e| e.message);
            return Attempt::failed(
                Some(code),
                Some(response),
                Failure::HttpStatus {
                    status: code,
                    message,
                },
                true,
            );
        }

        let Some(response) = parsed else {
            return Attempt::failed(
                Some(code),
                Some(non_json_error(code, &body)),
                Failure::MalformedBody {
                    status: code,
                    body: preview(&body),
                },
                false,
            );
        };

        match rpc_error(&response) {
            Some(err) => {
                let retryable = self.opts.transient.is_transient(&err);
                Attempt::failed(
                    Some(code),
                    Some(response),
                    Failure::Rpc {
                        code: err.code,
                        message: err.message,
                    },
                    retryable,
                )
            }
            None => Attempt::ok(code, response),
        }
    }

    fn transport_failure(&self, e: &reqwest::Error) -> Failure {
        if e.is_timeout() {
            Failure::Timeout {
                timeout_ms: self.opts.timeout.as_millis() as u64,
            }
        } else {
            Failure::Connection {
                reason: e.to_string(),
            }
        }
    }
}

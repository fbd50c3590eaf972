//! One retry loop for every request path.
//!
//! Callers supply the single-attempt operation and a classifier; the policy
//! owns the attempt counter and the fixed backoff between attempts.

use std::future::Future;
use std::time::Duration;

use mrp_domain::config::{default_transient_markers, RequestConfig};

use crate::protocol::JsonRpcError;

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Retryable,
    Terminal,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// The last attempt's value, how many attempts ran, and how the last one ended.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
    pub verdict: Verdict,
}

/// Run `op` until it succeeds, fails terminally, or attempts run out.
///
/// `op` receives the zero-based attempt index. A `Retryable` verdict on the
/// final attempt is returned as-is; callers treat it as a failure.
pub async fn run_with_retry<T, F, Fut, C>(policy: &RetryPolicy, mut op: F, classify: C) -> Retried<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = T>,
    C: Fn(&T) -> Verdict,
{
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            tokio::time::sleep(policy.backoff).await;
        }

        let value = op(attempt).await;
        let verdict = classify(&value);
        attempt += 1;

        if verdict != Verdict::Retryable || attempt >= policy.max_attempts() {
            return Retried {
                value,
                attempts: attempt,
                verdict,
            };
        }

        tracing::debug!(
            attempt,
            max_attempts = policy.max_attempts(),
            backoff_ms = policy.backoff.as_millis() as u64,
            "attempt failed transiently, retrying"
        );
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transient JSON-RPC errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decides whether a JSON-RPC error envelope is worth retrying.
///
/// Structured codes are checked first; message markers are a fallback for
/// routers that only report timeouts in prose.
#[derive(Debug, Clone)]
pub struct TransientMatcher {
    markers: Vec<String>,
    codes: Vec<i64>,
}

impl TransientMatcher {
    pub fn new(markers: Vec<String>, codes: Vec<i64>) -> Self {
        Self {
            markers: markers
                .into_iter()
                .filter(|m| !m.is_empty())
                .map(|m| m.to_lowercase())
                .collect(),
            codes,
        }
    }

    pub fn from_config(cfg: &RequestConfig) -> Self {
        Self::new(cfg.transient_markers.clone(), cfg.transient_codes.clone())
    }

    pub fn is_transient(&self, err: &JsonRpcError) -> bool {
        if self.codes.contains(&err.code) {
            return true;
        }
        let message = err.message.to_lowercase();
        self.markers.iter().any(|m| message.contains(m.as_str()))
    }
}

impl Default for TransientMatcher {
    fn default() -> Self {
        Self::new(default_transient_markers(), Vec::new())
    }
}

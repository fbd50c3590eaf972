use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Correlated requests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Per-attempt client timeout. Must exceed `router.server_timeout_ms`.
    #[serde(default = "d_70000")]
    pub timeout_ms: u64,
    /// Fixed wait before each retry.
    #[serde(default = "d_1000")]
    pub backoff_ms: u64,
    /// Case-insensitive substrings marking a JSON-RPC error as transient.
    #[serde(default = "d_markers")]
    pub transient_markers: Vec<String>,
    /// JSON-RPC error codes treated as transient.
    #[serde(default)]
    pub transient_codes: Vec<i64>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 70_000,
            backoff_ms: 1000,
            transient_markers: d_markers(),
            transient_codes: Vec::new(),
        }
    }
}

/// Markers observed on the router's timeout errors.
pub fn default_transient_markers() -> Vec<String> {
    d_markers()
}

fn d_70000() -> u64 {
    70_000
}
fn d_1000() -> u64 {
    1000
}
fn d_markers() -> Vec<String> {
    vec!["timeout".into(), "27000ms".into(), "Did not observe".into()]
}

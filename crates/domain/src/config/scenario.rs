use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Diagnostic scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Send a `resources/list` warm-up before the reuse cases.
    #[serde(default = "d_true")]
    pub warmup: bool,
    /// Pause between consecutive reuse requests.
    #[serde(default = "d_500")]
    pub pacing_ms: u64,
    /// Wait after the SSE stream opens, before the first request.
    #[serde(default = "d_2000")]
    pub settle_ms: u64,
    /// Wait for an async response to arrive over SSE.
    #[serde(default = "d_3000")]
    pub settle_response_ms: u64,
    #[serde(default = "d_600")]
    pub keepalive_secs: u64,
    #[serde(default = "d_30")]
    pub status_interval_secs: u64,
    /// Router log file inspected by the handshake scenario.
    #[serde(default)]
    pub router_log: Option<PathBuf>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            warmup: true,
            pacing_ms: 500,
            settle_ms: 2000,
            settle_response_ms: 3000,
            keepalive_secs: 600,
            status_interval_secs: 30,
            router_log: None,
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_500() -> u64 {
    500
}
fn d_2000() -> u64 {
    2000
}
fn d_3000() -> u64 {
    3000
}
fn d_600() -> u64 {
    600
}
fn d_30() -> u64 {
    30
}

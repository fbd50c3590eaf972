use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE bootstrap
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseConfig {
    #[serde(default = "d_5000")]
    pub connect_timeout_ms: u64,
    /// Upper bound on connect + scanning for the endpoint event.
    #[serde(default = "d_5000")]
    pub bootstrap_timeout_ms: u64,
    /// Maximum lines read while looking for the first `data:` line.
    #[serde(default = "d_10")]
    pub line_budget: usize,
    #[serde(default = "d_2000")]
    pub drain_join_timeout_ms: u64,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            bootstrap_timeout_ms: 5000,
            line_budget: 10,
            drain_join_timeout_ms: 2000,
        }
    }
}

fn d_5000() -> u64 {
    5000
}
fn d_10() -> usize {
    10
}
fn d_2000() -> u64 {
    2000
}

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_service_name")]
    pub service_name: String,
    /// Shape of the SSE URL (`/sse/<svc>` or `/sse?serviceName=<svc>`).
    #[serde(default = "d_path")]
    pub sse_style: EndpointStyle,
    /// Shape of the message URL (`/mcp/<svc>/message` or `/mcp/message?serviceName=<svc>`).
    #[serde(default = "d_query")]
    pub message_style: EndpointStyle,
    /// The router's own request ceiling. Only used to validate `request.timeout_ms`.
    #[serde(default = "d_60000")]
    pub server_timeout_ms: u64,
}

/// Where the service name goes in a router URL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStyle {
    /// Service name as a path segment.
    #[default]
    Path,
    /// Service name as a `serviceName` query parameter.
    Query,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            service_name: d_service_name(),
            sse_style: EndpointStyle::Path,
            message_style: EndpointStyle::Query,
            server_timeout_ms: 60_000,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "http://localhost:8052".into()
}
fn d_service_name() -> String {
    "mcp-server-v6".into()
}
fn d_path() -> EndpointStyle {
    EndpointStyle::Path
}
fn d_query() -> EndpointStyle {
    EndpointStyle::Query
}
fn d_60000() -> u64 {
    60_000
}

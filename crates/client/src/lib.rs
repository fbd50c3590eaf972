//! `mrp-client`: session-correlated request client for an MCP router.
//!
//! This crate provides:
//! - JSON-RPC 2.0 envelopes and MCP `initialize` payloads.
//! - SSE line and event decoding over a streamed HTTP body.
//! - `SseSession`, which opens the router's SSE stream, extracts the
//!   `sessionId` token and drains the stream in the background.
//! - `CorrelatedSender`, which posts requests tagged with that token and
//!   retries transient failures under a single `RetryPolicy`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mrp_client::{BootstrapOptions, CorrelatedRequest, CorrelatedSender, RouterEndpoints, SseSession};
//!
//! let endpoints = RouterEndpoints::new("http://localhost:8052", "svc-A");
//! let http = mrp_client::sse_http_client(Duration::from_secs(5))?;
//!
//! let mut session = SseSession::new();
//! let token = session.open(&http, &endpoints.sse_url()?, &BootstrapOptions::default()).await?;
//!
//! let sender = CorrelatedSender::new(Default::default())?;
//! let req = CorrelatedRequest::new("tools/list", "req-1", endpoints.message_url(&token)?)
//!     .with_service_name("svc-A")
//!     .with_max_retries(2);
//! let outcome = sender.send(&req).await;
//! println!("{}", outcome.detail());
//!
//! session.close().await;
//! ```

pub mod endpoint;
pub mod protocol;
pub mod retry;
pub mod sender;
pub mod session;
pub mod sse;

// Re-exports for convenience.
pub use endpoint::{ensure_service_name, EndpointError, RouterEndpoints};
pub use mrp_domain::config::EndpointStyle;
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use retry::{run_with_retry, RetryPolicy, TransientMatcher, Verdict};
pub use sender::{CorrelatedRequest, CorrelatedSender, Failure, RequestOutcome, SenderOptions};
pub use session::{
    open_event_stream, sse_http_client, BootstrapError, BootstrapOptions, MonitoredStream,
    SseSession, StreamStats,
};
pub use sse::{extract_session_id, SseEvent, SseEventReader};

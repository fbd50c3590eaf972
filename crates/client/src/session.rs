//! SSE bootstrap and the session handle that owns the live stream.
//!
//! Opening a session reads the router's first `data:` line, pulls the
//! `sessionId` out of the endpoint URL it carries, and hands the rest of the
//! stream to a drain task. The drain task keeps the connection read so the
//! router does not see an idle client; push events (heartbeats, async
//! responses) are counted and discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mrp_domain::config::SseConfig;
use mrp_domain::trace::ProbeEvent;

use crate::sse::{extract_session_id, SseEvent, SseEventReader, SseLineReader, StreamError};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Options & errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Lines read while looking for the first `data:` line before giving up.
    pub line_budget: usize,
    /// Bound on connect + scan.
    pub bootstrap_timeout: Duration,
    /// Bound on joining the drain task during `close`.
    pub drain_join_timeout: Duration,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            line_budget: 10,
            bootstrap_timeout: Duration::from_secs(5),
            drain_join_timeout: Duration::from_secs(2),
        }
    }
}

impl BootstrapOptions {
    pub fn from_config(cfg: &SseConfig) -> Self {
        Self {
            line_budget: cfg.line_budget,
            bootstrap_timeout: Duration::from_millis(cfg.bootstrap_timeout_ms),
            drain_join_timeout: Duration::from_millis(cfg.drain_join_timeout_ms),
        }
    }
}

/// Why no session token could be obtained.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("SSE connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("SSE endpoint {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("SSE bootstrap timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("no data line within {lines_read} line(s)")]
    NoEndpoint { lines_read: usize },

    #[error("endpoint event carries no sessionId: {endpoint}")]
    NoSessionId { endpoint: String },

    #[error("session {0} is already open")]
    AlreadyOpen(String),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// HTTP client suited to long-lived streams: connect timeout only, no total
/// request timeout (that would cut the stream).
pub fn sse_http_client(connect_timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stream stats
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Counters written by the drain task, read by whoever holds the session.
#[derive(Debug, Default)]
pub struct StreamStats {
    events: AtomicU64,
    heartbeats: AtomicU64,
    last_heartbeat: Mutex<Option<DateTime<Utc>>>,
    ended: AtomicBool,
}

impl StreamStats {
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    pub fn heartbeats(&self) -> u64 {
        self.heartbeats.load(Ordering::Relaxed)
    }

    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        *self.last_heartbeat.lock()
    }

    /// True once the drain task has exited.
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    fn record(&self, ev: &SseEvent) {
        self.events.fetch_add(1, Ordering::Relaxed);
        if ev.is_heartbeat() {
            self.heartbeats.fetch_add(1, Ordering::Relaxed);
            *self.last_heartbeat.lock() = Some(Utc::now());
        }
    }

    fn mark_ended(&self) {
        self.ended.store(true, Ordering::Release);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SseSession
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
enum SessionState {
    Unopened,
    Open {
        session_id: String,
        endpoint_url: String,
    },
    Closed,
}

/// Handle owning one SSE connection, its drain task and its stop signal.
///
/// The session token is written once by [`open`](Self::open) and only read
/// afterwards; a second `open` while the stream is live is refused.
pub struct SseSession {
    state: SessionState,
    stop: CancellationToken,
    drain: Option<JoinHandle<()>>,
    stats: Arc<StreamStats>,
    drain_join_timeout: Duration,
}

impl Default for SseSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SseSession {
    /// An unopened handle. Closing it is a no-op.
    pub fn new() -> Self {
        Self {
            state: SessionState::Unopened,
            stop: CancellationToken::new(),
            drain: None,
            stats: Arc::new(StreamStats::default()),
            drain_join_timeout: BootstrapOptions::default().drain_join_timeout,
        }
    }

    /// Connect, extract the session token, and start draining in the background.
    ///
    /// On failure the connection is dropped and the handle stays unopened.
    pub async fn open(
        &mut self,
        http: &reqwest::Client,
        sse_url: &str,
        opts: &BootstrapOptions,
    ) -> Result<String, BootstrapError> {
        if let SessionState::Open { session_id, .. } = &self.state {
            return Err(BootstrapError::AlreadyOpen(session_id.clone()));
        }

        tracing::info!(url = %sse_url, line_budget = opts.line_budget, "opening SSE stream");

        let scanned = tokio::time::timeout(
            opts.bootstrap_timeout,
            connect_and_scan(http, sse_url, opts.line_budget),
        )
        .await
        .unwrap_or(Err(BootstrapError::Timeout(opts.bootstrap_timeout)));

        let bootstrap = match scanned {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(url = %sse_url, error = %e, "SSE bootstrap failed, no session token");
                return Err(e);
            }
        };

        let stop = CancellationToken::new();
        let stats = Arc::new(StreamStats::default());
        let reader = SseEventReader::new(bootstrap.lines);
        self.drain = Some(tokio::spawn(drain_loop(reader, stop.clone(), stats.clone())));
        self.stop = stop;
        self.stats = stats;
        self.drain_join_timeout = opts.drain_join_timeout;

        tracing::info!(
            session_id = %bootstrap.session_id,
            endpoint = %bootstrap.endpoint_url,
            "SSE session established"
        );
        ProbeEvent::SessionEstablished {
            session_id: bootstrap.session_id.clone(),
            endpoint_url: bootstrap.endpoint_url.clone(),
            lines_read: bootstrap.lines_read,
        }
        .emit();

        let session_id = bootstrap.session_id.clone();
        self.state = SessionState::Open {
            session_id: bootstrap.session_id,
            endpoint_url: bootstrap.endpoint_url,
        };
        Ok(session_id)
    }

    pub fn session_id(&self) -> Option<&str> {
        match &self.state {
            SessionState::Open { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    /// The endpoint URL announced by the router.
    pub fn endpoint_url(&self) -> Option<&str> {
        match &self.state {
            SessionState::Open { endpoint_url, .. } => Some(endpoint_url),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open { .. })
    }

    pub fn stats(&self) -> Arc<StreamStats> {
        self.stats.clone()
    }

    /// Stop the drain task, wait for it (bounded), and drop the transport.
    ///
    /// Safe to call repeatedly and on a handle that was never opened.
    pub async fn close(&mut self) {
        self.stop.cancel();

        let mut joined = true;
        if let Some(handle) = self.drain.take() {
            let abort = handle.abort_handle();
            joined = match tokio::time::timeout(self.drain_join_timeout, handle).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "SSE drain task failed");
                    false
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = self.drain_join_timeout.as_millis() as u64,
                        "SSE drain task did not stop in time, aborting"
                    );
                    abort.abort();
                    false
                }
            };
        }

        // Unopened handles stay unopened.
        if !self.is_open() {
            return;
        }
        if let SessionState::Open { session_id, .. } =
            std::mem::replace(&mut self.state, SessionState::Closed)
        {
            tracing::info!(session_id = %session_id, joined, "SSE session closed");
            ProbeEvent::SseClosed { session_id, joined }.emit();
        }
    }

    /// True after a successful `open` followed by `close`.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed)
    }
}

impl Drop for SseSession {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bootstrap internals
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Bootstrapped {
    lines: SseLineReader,
    endpoint_url: String,
    session_id: String,
    lines_read: usize,
}

async fn connect_and_scan(
    http: &reqwest::Client,
    url: &str,
    line_budget: usize,
) -> Result<Bootstrapped, BootstrapError> {
    let resp = http
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await
        .map_err(|e| BootstrapError::Connect {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(BootstrapError::Status {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }
    ProbeEvent::SseConnected {
        url: url.to_owned(),
        status: status.as_u16(),
    }
    .emit();

    let mut lines = SseLineReader::from_response(resp);
    let (endpoint_url, lines_read) = scan_for_endpoint(&mut lines, line_budget).await?;
    let session_id = extract_session_id(&endpoint_url)
        .map(str::to_owned)
        .ok_or_else(|| BootstrapError::NoSessionId {
            endpoint: endpoint_url.clone(),
        })?;

    Ok(Bootstrapped {
        lines,
        endpoint_url,
        session_id,
        lines_read,
    })
}

/// Read at most `line_budget` lines and return the payload of the first
/// `data:` line, with the number of lines consumed.
pub(crate) async fn scan_for_endpoint(
    lines: &mut SseLineReader,
    line_budget: usize,
) -> Result<(String, usize), BootstrapError> {
    let mut lines_read = 0usize;
    while lines_read < line_budget {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        lines_read += 1;
        tracing::debug!(line_no = lines_read, line = %line, "SSE bootstrap line");

        if let Some(payload) = line.strip_prefix("data:") {
            return Ok((payload.trim().to_owned(), lines_read));
        }
    }
    Err(BootstrapError::NoEndpoint { lines_read })
}

async fn drain_loop(mut reader: SseEventReader, stop: CancellationToken, stats: Arc<StreamStats>) {
    loop {
        let next = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            next = reader.next_event() => next,
        };

        match next {
            Ok(Some(ev)) => {
                stats.record(&ev);
                if ev.is_heartbeat() {
                    ProbeEvent::HeartbeatReceived {
                        timestamp: ev.heartbeat_timestamp(),
                        events_seen: stats.events(),
                    }
                    .emit();
                } else {
                    tracing::debug!(kind = %ev.kind(), bytes = ev.data.len(), "discarding SSE push event");
                }
            }
            Ok(None) => {
                tracing::info!("SSE stream ended by server");
                break;
            }
            Err(e) => {
                if !stop.is_cancelled() {
                    tracing::warn!(error = %e, "SSE stream read failed");
                }
                break;
            }
        }
    }

    stats.mark_ended();
    ProbeEvent::DrainEnded {
        events: stats.events(),
        heartbeats: stats.heartbeats(),
        stopped: stop.is_cancelled(),
    }
    .emit();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Monitored streams
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A raw event stream opened without token extraction.
pub struct MonitoredStream {
    pub status: u16,
    pub content_type: Option<String>,
    pub reader: SseEventReader,
}

/// Open an SSE stream for observation only.
pub async fn open_event_stream(
    http: &reqwest::Client,
    url: &str,
    connect_timeout: Duration,
) -> Result<MonitoredStream, BootstrapError> {
    let send = http
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send();

    let resp = match tokio::time::timeout(connect_timeout, send).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            return Err(BootstrapError::Connect {
                url: url.to_owned(),
                reason: e.to_string(),
            })
        }
        Err(_) => return Err(BootstrapError::Timeout(connect_timeout)),
    };

    let status = resp.status();
    if !status.is_success() {
        return Err(BootstrapError::Status {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }

    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    ProbeEvent::SseConnected {
        url: url.to_owned(),
        status: status.as_u16(),
    }
    .emit();

    Ok(MonitoredStream {
        status: status.as_u16(),
        content_type,
        reader: SseEventReader::from_response(resp),
    })
}

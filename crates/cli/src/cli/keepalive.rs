//! `mcp-router-probe keepalive`: hold an SSE stream open and watch heartbeats.

use std::time::Duration;

use tokio::time::Instant;

use mrp_client::{extract_session_id, open_event_stream, SseEvent};

use super::probe::{print_banner, Probe};
use super::report::{print_check, print_verdict};

const PREVIEW_CHARS: usize = 100;
const MAX_STATUS_INTERVAL_SECS: u64 = 86_400;

/// What one event meant to the monitor, for printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Heartbeat {
        timestamp: Option<String>,
    },
    Connected {
        session_id: Option<String>,
        client_id: Option<String>,
    },
    Other {
        kind: String,
        preview: String,
    },
}

/// Event counters for one monitored stream.
#[derive(Debug)]
pub struct KeepaliveMonitor {
    pub events: u64,
    pub heartbeats: u64,
    pub last_heartbeat: Option<Instant>,
    pub session_id: Option<String>,
}

impl KeepaliveMonitor {
    pub fn new() -> Self {
        Self {
            events: 0,
            heartbeats: 0,
            last_heartbeat: None,
            session_id: None,
        }
    }

    pub fn observe(&mut self, ev: &SseEvent, now: Instant) -> Observation {
        self.events += 1;

        if ev.is_heartbeat() {
            self.heartbeats += 1;
            self.last_heartbeat = Some(now);
            return Observation::Heartbeat {
                timestamp: ev.heartbeat_timestamp(),
            };
        }

        match ev.kind() {
            "connected" => {
                let json = ev.json();
                let field = |key: &str| {
                    json.as_ref()
                        .and_then(|v| v.get(key))
                        .and_then(|v| v.as_str())
                        .map(str::to_owned)
                };
                let session_id = field("sessionId");
                if session_id.is_some() {
                    self.session_id = session_id.clone();
                }
                Observation::Connected {
                    session_id,
                    client_id: field("clientId"),
                }
            }
            kind => {
                if kind == "endpoint" && self.session_id.is_none() {
                    self.session_id = extract_session_id(&ev.data).map(str::to_owned);
                }
                Observation::Other {
                    kind: kind.to_owned(),
                    preview: preview(&ev.data),
                }
            }
        }
    }

    pub fn since_last_heartbeat(&self, now: Instant) -> Option<Duration> {
        self.last_heartbeat.map(|t| now.saturating_duration_since(t))
    }
}

impl Default for KeepaliveMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn preview(data: &str) -> String {
    if data.chars().count() > PREVIEW_CHARS {
        let head: String = data.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        data.to_owned()
    }
}

fn deadline_after(start: Instant, duration: Duration) -> anyhow::Result<Instant> {
    start
        .checked_add(duration)
        .ok_or_else(|| anyhow::anyhow!("keep-alive duration {}s is out of range", duration.as_secs()))
}

fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}m{:02}s", secs / 60, secs % 60)
}

fn print_observation(obs: &Observation, n: u64) {
    match obs {
        Observation::Heartbeat { timestamp } => {
            println!(
                "  heartbeat [{}] (event #{n})",
                timestamp.as_deref().unwrap_or("unparsed")
            );
        }
        Observation::Connected {
            session_id,
            client_id,
        } => {
            println!("  connected (event #{n})");
            println!("      sessionId: {}", session_id.as_deref().unwrap_or("N/A"));
            println!("      clientId:  {}", client_id.as_deref().unwrap_or("N/A"));
        }
        Observation::Other { kind, preview } => {
            println!("  {kind} (event #{n})");
            if !preview.is_empty() {
                println!("      data: {preview}");
            }
        }
    }
}

/// Run the monitor for `duration`. Passes iff the stream is still open at the end.
pub async fn run(probe: &Probe, duration: Duration) -> anyhow::Result<bool> {
    print_banner("mcp-router-probe keepalive", probe);

    let url = probe.endpoints.sse_url()?;
    deadline_after(Instant::now(), duration)?;
    println!("  target duration: {}", format_elapsed(duration));
    println!();

    let connect_timeout = Duration::from_millis(probe.config.sse.connect_timeout_ms);
    let mut stream = match open_event_stream(&probe.http, &url, connect_timeout).await {
        Ok(stream) => {
            print_check(
                "SSE stream",
                true,
                format!(
                    "HTTP {} ({})",
                    stream.status,
                    stream.content_type.as_deref().unwrap_or("no content-type")
                ),
            );
            stream
        }
        Err(e) => {
            print_check("SSE stream", false, e.to_string());
            print_verdict(false);
            return Ok(false);
        }
    };

    let start = Instant::now();
    let deadline = deadline_after(start, duration)?;
    let status_every =
        Duration::from_secs(probe.config.scenario.status_interval_secs.clamp(1, MAX_STATUS_INTERVAL_SECS));
    let mut status_tick = tokio::time::interval_at(start + status_every, status_every);
    let mut monitor = KeepaliveMonitor::new();
    let mut still_open = true;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            _ = status_tick.tick() => {
                let now = Instant::now();
                let hb = monitor
                    .since_last_heartbeat(now)
                    .map(|d| format!(", last heartbeat {:.1}s ago", d.as_secs_f64()))
                    .unwrap_or_default();
                println!(
                    "  status: running {}, {} event(s){hb}",
                    format_elapsed(now - start),
                    monitor.events
                );
            }
            next = stream.reader.next_event() => match next {
                Ok(Some(ev)) => {
                    let obs = monitor.observe(&ev, Instant::now());
                    print_observation(&obs, monitor.events);
                }
                Ok(None) => {
                    tracing::warn!("SSE stream closed by router");
                    still_open = false;
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SSE stream failed");
                    still_open = false;
                    break;
                }
            },
        }
    }

    let end = Instant::now();
    let held = end - start;
    let passed = still_open && held >= duration;

    println!();
    println!("  endpoint:       {url}");
    println!("  held for:       {} ({:.1}s)", format_elapsed(held), held.as_secs_f64());
    println!("  events:         {} ({} heartbeat(s))", monitor.events, monitor.heartbeats);
    match monitor.since_last_heartbeat(end) {
        Some(d) => println!("  last heartbeat: {:.1}s ago", d.as_secs_f64()),
        None => println!("  last heartbeat: none"),
    }
    if let Some(session_id) = &monitor.session_id {
        println!("  sessionId:      {session_id}");
    }
    print_check(
        "Stream held open",
        passed,
        if still_open {
            "connected".into()
        } else {
            format!("disconnected after {}", format_elapsed(held))
        },
    );

    print_verdict(passed);
    Ok(passed)
}

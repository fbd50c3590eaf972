//! `mcp-router-probe handshake`: `initialize` answered over SSE.
//!
//! The router should accept the POST (`202`) and push the real response down
//! the session's SSE sink. When a router log is available it is scanned for
//! sink lookups that failed.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use regex::Regex;

use mrp_client::protocol::initialize_params;
use mrp_client::{EndpointStyle, SseSession};

use super::probe::{print_banner, Probe};
use super::report::{print_check, print_verdict, Tally};

const LOG_LINE_CHARS: usize = 150;
const RECENT_REGISTRATIONS: usize = 3;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router log inspection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the router log says about SSE sink handling.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LogReport {
    /// Occurrences of a failed sink lookup.
    pub sink_missing: usize,
    /// First failed lookup and the line after it.
    pub first_missing: Option<(String, Option<String>)>,
    /// Most recent successful sink lookup or SSE delivery.
    pub latest_delivery: Option<String>,
    pub registrations: usize,
    /// Last few session registration lines, oldest first.
    pub recent_registrations: Vec<String>,
}

struct LogPatterns {
    missing: Regex,
    delivered: Regex,
    registered: Regex,
}

impl LogPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            missing: Regex::new(r"No SSE sink found|SSE sink not found")?,
            delivered: Regex::new(r"SSE sink found|Successfully sent.*via SSE")?,
            registered: Regex::new(r"Registered SSE sink|Registered client session")?,
        })
    }
}

fn clip(line: &str) -> String {
    line.chars().take(LOG_LINE_CHARS).collect()
}

pub fn inspect_log_text(text: &str) -> anyhow::Result<LogReport> {
    let patterns = LogPatterns::new()?;
    let lines: Vec<&str> = text.lines().collect();
    let mut report = LogReport::default();
    let mut registrations: Vec<&str> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if patterns.missing.is_match(line) {
            report.sink_missing += patterns.missing.find_iter(line).count();
            if report.first_missing.is_none() {
                report.first_missing = Some((clip(line), lines.get(i + 1).map(|l| clip(l))));
            }
        } else if patterns.delivered.is_match(line) {
            report.latest_delivery = Some(clip(line));
        }
        if patterns.registered.is_match(line) {
            registrations.push(line);
        }
    }

    report.registrations = registrations.len();
    let skip = registrations.len().saturating_sub(RECENT_REGISTRATIONS);
    report.recent_registrations = registrations[skip..].iter().map(|l| clip(l)).collect();
    Ok(report)
}

pub fn inspect_log(path: &Path) -> anyhow::Result<LogReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading router log {}", path.display()))?;
    inspect_log_text(&text)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn run(probe: &Probe, router_log: Option<&Path>) -> anyhow::Result<bool> {
    print_banner("mcp-router-probe handshake", probe);
    let scenario = &probe.config.scenario;
    let mut tally = Tally::default();

    // 1. Query-style SSE endpoint
    let sse_url = probe
        .endpoints
        .clone()
        .with_sse_style(EndpointStyle::Query)
        .sse_url()?;
    let mut session = SseSession::new();
    let token = match session.open(&probe.http, &sse_url, &probe.bootstrap_options()).await {
        Ok(token) => {
            print_check("SSE session", true, format!("sessionId={token}"));
            token
        }
        Err(e) => {
            print_check("SSE session", false, e.to_string());
            print_verdict(false);
            return Ok(false);
        }
    };
    tally.record(true);

    // 2. Let the router finish registering the sink
    tokio::time::sleep(Duration::from_millis(scenario.settle_ms)).await;

    // 3. initialize on the path-style message endpoint
    let message_url = probe
        .endpoints
        .clone()
        .with_message_style(EndpointStyle::Path)
        .message_url(&token)?;
    let params = serde_json::to_value(initialize_params(
        "mcp-router-probe",
        env!("CARGO_PKG_VERSION"),
    ))?;
    let req = mrp_client::CorrelatedRequest::new("initialize", "init-1", message_url)
        .with_params(params);
    let outcome = probe.sender.send(&req).await;

    let body_accepts = outcome
        .response
        .as_ref()
        .map(|r| r.to_string().to_lowercase().contains("accepted"))
        .unwrap_or(false);
    let accepted = outcome.accepted || body_accepts;
    tally.record(accepted);
    print_check(
        "initialize accepted",
        accepted,
        if accepted {
            "response will arrive over SSE".into()
        } else {
            outcome.detail()
        },
    );

    // 4. Give the SSE push time to land
    tokio::time::sleep(Duration::from_millis(scenario.settle_response_ms)).await;
    let stats = session.stats();
    println!(
        "  [INFO] SSE stream: {} event(s) since bootstrap",
        stats.events()
    );

    // 5. Router log
    let log_path = router_log.or(scenario.router_log.as_deref());
    match log_path {
        Some(path) => match inspect_log(path) {
            Ok(report) => tally.record(print_log_report(&report)),
            Err(e) => println!("  [INFO] router log not inspected: {e:#}"),
        },
        None => println!("  [INFO] no router log configured, skipping sink checks"),
    }

    session.close().await;

    println!();
    println!("  passed: {}", tally.summary());
    print_verdict(tally.all_passed());
    Ok(tally.all_passed())
}

/// Print the log findings; returns whether the sink check passed.
fn print_log_report(report: &LogReport) -> bool {
    let passed = report.sink_missing == 0;
    print_check(
        "No missing SSE sinks",
        passed,
        if passed {
            "none in router log".into()
        } else {
            format!("{} missing-sink error(s)", report.sink_missing)
        },
    );
    if let Some((line, context)) = &report.first_missing {
        println!("      error:   {line}");
        if let Some(context) = context {
            println!("      context: {context}");
        }
    }
    if let Some(line) = &report.latest_delivery {
        println!("      latest delivery: {line}");
    }
    if report.registrations > 0 {
        println!("      {} session registration(s), most recent:", report.registrations);
        for line in &report.recent_registrations {
            println!("        {line}");
        }
    }
    passed
}

//! `mcp-router-probe reuse`: one SSE session, many methods.
//!
//! Every request after the bootstrap carries the same `sessionId`; the check
//! passes when each method succeeds and the router keeps routing the session
//! to a backend.

use std::time::Duration;

use serde_json::Value;

use mrp_client::{RequestOutcome, SseSession};

use super::probe::{print_banner, Probe};
use super::report::{print_check, print_verdict, Tally};

/// `(method, request id, retries)`, sent in order.
const STEPS: &[(&str, &str, u32)] = &[
    // First real request after warm-up tends to hit a cold backend.
    ("tools/list", "req-tools-001", 2),
    ("resources/list", "req-resources-001", 0),
    ("prompts/list", "req-prompts-001", 0),
    ("resources/templates/list", "req-templates-001", 0),
    ("tools/list", "req-tools-002", 0),
];

pub async fn run(probe: &Probe, warmup: bool) -> anyhow::Result<bool> {
    print_banner("mcp-router-probe reuse", probe);

    let sse_url = probe.endpoints.sse_url()?;
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

    if warmup && probe.config.scenario.warmup {
        let req = probe.request("resources/list", "warmup-001", &token, 1)?;
        let outcome = probe.sender.send(&req).await;
        // A failed warm-up is reported but not counted.
        let status = if outcome.success { "ok" } else { "failed, continuing" };
        println!("  [INFO] warm-up resources/list: {status} ({})", outcome.detail());
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    let mut tally = Tally::default();
    let mut backends: Vec<String> = Vec::new();

    for (idx, (method, id, retries)) in STEPS.iter().enumerate() {
        if idx > 0 {
            tokio::time::sleep(probe.pacing()).await;
        }
        let req = probe.request(method, *id, &token, *retries)?;
        let outcome = probe.sender.send(&req).await;

        tally.record(outcome.success);
        if let Some(backend) = &outcome.target_service {
            backends.push(backend.clone());
        }
        print_check(&format!("{method} ({id})"), outcome.success, step_detail(method, &outcome));
    }

    println!();
    println!("  sessionId: {token}");
    println!("  routed to: {}", describe_backends(&backends));
    println!("  passed:    {}", tally.summary());

    session.close().await;
    print_verdict(tally.all_passed());
    Ok(tally.all_passed())
}

fn step_detail(method: &str, outcome: &RequestOutcome) -> String {
    match outcome.result().and_then(|r| item_count(method, r)) {
        Some(n) if outcome.success => format!("{n} item(s), {}", outcome.detail()),
        _ => outcome.detail(),
    }
}

/// Length of the list a `*/list` method returns.
fn item_count(method: &str, result: &Value) -> Option<usize> {
    let key = match method {
        "tools/list" => "tools",
        "resources/list" => "resources",
        "prompts/list" => "prompts",
        "resources/templates/list" => "resourceTemplates",
        _ => return None,
    };
    result.get(key)?.as_array().map(Vec::len)
}

fn describe_backends(backends: &[String]) -> String {
    let mut distinct: Vec<&str> = backends.iter().map(String::as_str).collect();
    distinct.sort_unstable();
    distinct.dedup();
    match distinct.as_slice() {
        [] => "unknown (no routing info in responses)".into(),
        [one] => (*one).to_owned(),
        many => format!("{} (multiple backends)", many.join(", ")),
    }
}

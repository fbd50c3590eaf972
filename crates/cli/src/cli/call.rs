//! `mcp-router-probe call`: one correlated request through a fresh session.

use anyhow::Context;
use serde_json::Value;

use mrp_client::SseSession;

use super::probe::Probe;

pub struct CallArgs {
    pub method: String,
    pub params: String,
    pub id: Option<String>,
    pub retries: u32,
    pub json: bool,
}

pub fn parse_params(raw: &str) -> anyhow::Result<Value> {
    let params: Value = serde_json::from_str(raw).context("--params must be valid JSON")?;
    anyhow::ensure!(params.is_object(), "--params must be a JSON object");
    Ok(params)
}

pub async fn run(probe: &Probe, args: CallArgs) -> anyhow::Result<bool> {
    let params = parse_params(&args.params)?;
    let id = args.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut session = SseSession::new();
    let token = session
        .open(&probe.http, &probe.endpoints.sse_url()?, &probe.bootstrap_options())
        .await
        .context("SSE bootstrap failed")?;

    let req = probe
        .request(&args.method, id, &token, args.retries)?
        .with_params(params);
    let outcome = probe.sender.send(&req).await;
    session.close().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        let status = if outcome.success { "ok" } else { "failed" };
        println!("{} {status}: {}", args.method, outcome.detail());
        if let Some(result) = outcome.result() {
            println!("{}", serde_json::to_string_pretty(result)?);
        } else if let Some(response) = &outcome.response {
            println!("{}", serde_json::to_string_pretty(response)?);
        }
    }

    Ok(outcome.success)
}

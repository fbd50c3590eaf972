//! Whole scenarios against an in-process router: each run's pass/fail
//! verdict is what the binary turns into its exit code.

mod common;

use std::io::Write;
use std::time::{Duration, Instant};

use common::{Behavior, MockRouter, SHORT_LIVED};
use mrp_cli::cli::call::{self, CallArgs};
use mrp_cli::cli::probe::Probe;
use mrp_cli::cli::{handshake, keepalive, reuse};

fn probe(router: &MockRouter, service: &str) -> Probe {
    Probe::new(router.config(service)).unwrap()
}

fn router_log(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// reuse
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn reuse_passes_when_every_step_succeeds() {
    let router = MockRouter::spawn(Behavior::Normal).await;
    let passed = reuse::run(&probe(&router, "svc-A"), false).await.unwrap();
    assert!(passed);

    let seen = router.seen();
    let methods: Vec<&str> = seen.iter().map(|p| p.method.as_str()).collect();
    assert_eq!(
        methods,
        ["tools/list", "resources/list", "prompts/list", "resources/templates/list", "tools/list"]
    );
    assert!(seen.iter().all(|p| p.session_id.as_deref() == Some("T-svc-A")));
}

#[tokio::test]
async fn reuse_fails_when_a_step_errors() {
    let router = MockRouter::spawn(Behavior::TerminalError).await;
    let passed = reuse::run(&probe(&router, "svc-A"), false).await.unwrap();
    assert!(!passed);
    // Terminal errors are not retried, even on the step allowing retries.
    assert_eq!(router.seen().len(), 5);
}

#[tokio::test]
async fn reuse_warmup_precedes_the_steps() {
    let router = MockRouter::spawn(Behavior::Normal).await;
    let mut cfg = router.config("svc-A");
    cfg.scenario.warmup = true;
    let passed = reuse::run(&Probe::new(cfg).unwrap(), true).await.unwrap();
    assert!(passed);

    let seen = router.seen();
    assert_eq!(seen.len(), 6);
    assert_eq!(seen[0].method, "resources/list");
    assert_eq!(seen[0].id, "warmup-001");
}

#[tokio::test]
async fn reuse_fails_when_router_is_down() {
    let router = MockRouter::spawn(Behavior::Normal).await;
    let mut cfg = router.config("svc-A");
    cfg.router.base_url = common::dead_base_url().await;
    let passed = reuse::run(&Probe::new(cfg).unwrap(), false).await.unwrap();
    assert!(!passed);
    assert!(router.seen().is_empty());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// keepalive
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn keepalive_passes_when_stream_outlives_duration() {
    let router = MockRouter::spawn(Behavior::Normal).await;
    let started = Instant::now();
    let passed = keepalive::run(&probe(&router, "svc-A"), Duration::from_millis(300))
        .await
        .unwrap();
    assert!(passed);
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn keepalive_fails_when_stream_closes_early() {
    let router = MockRouter::spawn(Behavior::Normal).await;
    let started = Instant::now();
    let passed = keepalive::run(&probe(&router, SHORT_LIVED), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(!passed);
    assert!(started.elapsed() < Duration::from_secs(5));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// handshake
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const CLEAN_LOG: &str = "\
10:00:01 INFO Registered SSE sink for session Q-svc-A
10:00:02 INFO Successfully sent initialize response via SSE to Q-svc-A
";

#[tokio::test]
async fn handshake_passes_on_accepted_initialize_and_clean_log() {
    let router = MockRouter::spawn(Behavior::Accepted).await;
    let log = router_log(CLEAN_LOG);
    let passed = handshake::run(&probe(&router, "svc-A"), Some(log.path()))
        .await
        .unwrap();
    assert!(passed);

    let seen = router.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "initialize");
    assert_eq!(seen[0].id, "init-1");
    assert_eq!(seen[0].path_service.as_deref(), Some("svc-A"));
    assert_eq!(seen[0].session_id.as_deref(), Some("Q-svc-A"));
}

#[tokio::test]
async fn handshake_fails_on_missing_sink_in_log() {
    let router = MockRouter::spawn(Behavior::Accepted).await;
    let log = router_log("10:00:02 WARN No SSE sink found for session Q-svc-A\n");
    let passed = handshake::run(&probe(&router, "svc-A"), Some(log.path()))
        .await
        .unwrap();
    assert!(!passed);
}

#[tokio::test]
async fn handshake_fails_when_initialize_is_not_accepted() {
    let router = MockRouter::spawn(Behavior::TerminalError).await;
    let log = router_log(CLEAN_LOG);
    let passed = handshake::run(&probe(&router, "svc-A"), Some(log.path()))
        .await
        .unwrap();
    assert!(!passed);
}

#[tokio::test]
async fn handshake_without_log_judges_initialize_only() {
    let router = MockRouter::spawn(Behavior::Accepted).await;
    let passed = handshake::run(&probe(&router, "svc-A"), None).await.unwrap();
    assert!(passed);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// call
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn call_args(method: &str, json: bool) -> CallArgs {
    CallArgs {
        method: method.into(),
        params: r#"{"cursor":null}"#.into(),
        id: Some("call-1".into()),
        retries: 1,
        json,
    }
}

#[tokio::test]
async fn call_succeeds_with_session_token() {
    let router = MockRouter::spawn(Behavior::Normal).await;
    let passed = call::run(&probe(&router, "svc-A"), call_args("tools/list", false))
        .await
        .unwrap();
    assert!(passed);

    let seen = router.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, "call-1");
    assert_eq!(seen[0].session_id.as_deref(), Some("T-svc-A"));
}

#[tokio::test]
async fn call_fails_on_rpc_error() {
    let router = MockRouter::spawn(Behavior::TerminalError).await;
    let passed = call::run(&probe(&router, "svc-A"), call_args("tools/call", true))
        .await
        .unwrap();
    assert!(!passed);
}

#[tokio::test]
async fn call_rejects_non_object_params_before_connecting() {
    let router = MockRouter::spawn(Behavior::Normal).await;
    let mut args = call_args("tools/list", false);
    args.params = "[1]".into();
    assert!(call::run(&probe(&router, "svc-A"), args).await.is_err());
    assert!(router.seen().is_empty());
}

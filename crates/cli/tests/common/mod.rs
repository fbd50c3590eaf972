//! In-process router for driving whole scenarios.
//!
//! `GET /sse/:svc` and `GET /sse?serviceName=` announce a session token
//! (`T-<svc>` and `Q-<svc>`) and then stay open. The service name
//! `short-lived` gets a stream that ends right after the endpoint event.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use mrp_domain::config::Config;

pub const SHORT_LIVED: &str = "short-lived";

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// JSON-RPC results shaped like a real backend's `*/list` answers.
    Normal,
    /// 200 with `Method not found`.
    TerminalError,
    /// 202 with an empty body.
    Accepted,
}

#[derive(Debug, Clone)]
pub struct SeenPost {
    pub path_service: Option<String>,
    pub session_id: Option<String>,
    pub method: String,
    pub id: Value,
}

#[derive(Clone)]
struct RouterState {
    base_url: String,
    behavior: Behavior,
    seen: Arc<Mutex<Vec<SeenPost>>>,
}

pub struct MockRouter {
    pub base_url: String,
    seen: Arc<Mutex<Vec<SeenPost>>>,
}

impl MockRouter {
    pub async fn spawn(behavior: Behavior) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let state = RouterState {
            base_url: base_url.clone(),
            behavior,
            seen: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/sse/:svc", get(path_sse))
            .route("/sse", get(query_sse))
            .route("/mcp/message", post(query_message))
            .route("/mcp/:svc/message", post(path_message))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            seen: state.seen,
        }
    }

    pub fn seen(&self) -> Vec<SeenPost> {
        self.seen.lock().clone()
    }

    /// Config pointed at this router with every scenario delay removed.
    pub fn config(&self, service: &str) -> Config {
        let mut cfg = Config::default();
        cfg.router.base_url = self.base_url.clone();
        cfg.router.service_name = service.to_owned();
        cfg.request.timeout_ms = 5_000;
        cfg.request.backoff_ms = 10;
        cfg.scenario.warmup = false;
        cfg.scenario.pacing_ms = 0;
        cfg.scenario.settle_ms = 0;
        cfg.scenario.settle_response_ms = 0;
        cfg
    }
}

/// A base URL nothing listens on.
pub async fn dead_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

// ── SSE ──

fn event_stream(frame: String, stay_open: bool) -> Response {
    let stream = async_stream::stream! {
        yield Ok::<_, Infallible>(frame);
        if stay_open {
            tokio::time::sleep(Duration::from_millis(50)).await;
            yield Ok("event: heartbeat\ndata: {\"timestamp\":\"2024-05-01T10:00:00Z\"}\n\n".to_owned());
            std::future::pending::<()>().await;
        }
    };
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(stream),
    )
        .into_response()
}

async fn path_sse(State(state): State<RouterState>, Path(svc): Path<String>) -> Response {
    let frame = format!(
        "event: endpoint\ndata: {}/mcp/message?sessionId=T-{svc}\n\n",
        state.base_url
    );
    event_stream(frame, svc != SHORT_LIVED)
}

async fn query_sse(
    State(state): State<RouterState>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let svc = q.get("serviceName").cloned().unwrap_or_default();
    let frame = format!(
        "event: endpoint\ndata: {}/mcp/message?sessionId=Q-{svc}\n\n",
        state.base_url
    );
    event_stream(frame, svc != SHORT_LIVED)
}

// ── Messages ──

async fn query_message(
    State(state): State<RouterState>,
    Query(q): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    answer(state, None, q, body)
}

async fn path_message(
    State(state): State<RouterState>,
    Path(svc): Path<String>,
    Query(q): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    answer(state, Some(svc), q, body)
}

fn answer(
    state: RouterState,
    path_service: Option<String>,
    q: HashMap<String, String>,
    body: Value,
) -> Response {
    let method = body["method"].as_str().unwrap_or_default().to_owned();
    let id = body["id"].clone();
    state.seen.lock().push(SeenPost {
        path_service: path_service.clone(),
        session_id: q.get("sessionId").cloned(),
        method: method.clone(),
        id: id.clone(),
    });

    let backend = path_service
        .or_else(|| q.get("serviceName").cloned())
        .unwrap_or_else(|| "unknown".into());

    match state.behavior {
        Behavior::Normal => {
            let result = match method.as_str() {
                "tools/list" => json!({ "tools": [{ "name": "echo" }], "targetService": backend }),
                "resources/list" => {
                    json!({ "resources": [], "metadata": { "targetServer": backend } })
                }
                "prompts/list" => json!({ "prompts": [] }),
                "resources/templates/list" => json!({ "resourceTemplates": [] }),
                _ => json!({}),
            };
            Json(json!({ "jsonrpc": "2.0", "id": id, "result": result })).into_response()
        }
        Behavior::TerminalError => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": "Method not found" }
        }))
        .into_response(),
        Behavior::Accepted => StatusCode::ACCEPTED.into_response(),
    }
}

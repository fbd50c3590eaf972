//! In-process mock MCP router.
//!
//! `GET /sse/:svc` announces `<base>/mcp/message?sessionId=T-<svc>` and then
//! sends one heartbeat before going quiet. The message endpoints answer per
//! [`Behavior`] and record every POST they see.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
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

/// How the message endpoint answers.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Normal,
    /// 200 with a JSON-RPC error carrying a router timeout message.
    AlwaysTransient,
    /// 200 with `Method not found`.
    TerminalError,
    /// 200 with an HTML body.
    Malformed,
    /// 202 with an empty body.
    Accepted,
    /// 503 for the first `n` posts, then `Normal`.
    FailFirst(usize),
    /// Sleep before answering.
    Slow(Duration),
}

#[derive(Debug, Clone)]
pub struct SeenPost {
    pub session_id: Option<String>,
    pub service_name: Option<String>,
    pub method: String,
    pub id: Value,
}

#[derive(Clone)]
struct MockState {
    base_url: String,
    behavior: Behavior,
    posts: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenPost>>>,
}

pub struct MockRouter {
    pub base_url: String,
    posts: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenPost>>>,
}

impl MockRouter {
    pub async fn spawn(behavior: Behavior) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let state = MockState {
            base_url: base_url.clone(),
            behavior,
            posts: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/sse/:svc", get(sse_handler))
            .route("/sse", get(sse_query_handler))
            .route("/noisy/sse", get(noisy_sse_handler))
            .route("/tokenless/sse", get(tokenless_sse_handler))
            .route("/mcp/message", post(message_handler))
            .route("/mcp/:svc/message", post(path_message_handler))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            posts: state.posts,
            seen: state.seen,
        }
    }

    pub fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenPost> {
        self.seen.lock().clone()
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

fn event_stream(frames: Vec<String>, heartbeat: bool) -> Response {
    let stream = async_stream::stream! {
        for frame in frames {
            yield Ok::<_, Infallible>(frame);
        }
        if heartbeat {
            tokio::time::sleep(Duration::from_millis(50)).await;
            yield Ok(r#"event: heartbeat
data: {"timestamp":"2024-05-01T10:00:00Z"}

"#.to_owned());
        }
        futures_util::future::pending::<()>().await;
    };
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(stream),
    )
        .into_response()
}

async fn sse_handler(State(state): State<MockState>, Path(svc): Path<String>) -> Response {
    let frame = format!(
        "event: endpoint\ndata: {}/mcp/message?sessionId=T-{svc}\n\n",
        state.base_url
    );
    event_stream(vec![frame], true)
}

async fn sse_query_handler(
    State(state): State<MockState>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let svc = q.get("serviceName").cloned().unwrap_or_default();
    let frame = format!(
        "event: endpoint\ndata: {}/mcp/message?sessionId=Q-{svc}\n\n",
        state.base_url
    );
    event_stream(vec![frame], false)
}

async fn noisy_sse_handler() -> Response {
    let mut frames: Vec<String> = (0..20).map(|i| format!(": padding {i}\n")).collect();
    frames.push("data: /mcp/message?sessionId=too-late\n\n".into());
    event_stream(frames, false)
}

async fn tokenless_sse_handler() -> Response {
    event_stream(vec!["event: endpoint\ndata: /mcp/message\n\n".into()], false)
}

// ── Messages ──

async fn message_handler(
    State(state): State<MockState>,
    Query(q): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    answer(state, q.get("serviceName").cloned(), q, body).await
}

async fn path_message_handler(
    State(state): State<MockState>,
    Path(svc): Path<String>,
    Query(q): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    answer(state, Some(svc), q, body).await
}

async fn answer(
    state: MockState,
    service_name: Option<String>,
    q: HashMap<String, String>,
    body: Value,
) -> Response {
    let n = state.posts.fetch_add(1, Ordering::SeqCst) + 1;
    let method = body["method"].as_str().unwrap_or_default().to_owned();
    let id = body["id"].clone();
    state.seen.lock().push(SeenPost {
        session_id: q.get("sessionId").cloned(),
        service_name: service_name.clone(),
        method: method.clone(),
        id: id.clone(),
    });

    match state.behavior {
        Behavior::Normal => normal(&method, id, service_name),
        Behavior::AlwaysTransient => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {
                "code": -32603,
                "message": "Did not observe any item or terminal signal within 27000ms"
            }
        }))
        .into_response(),
        Behavior::TerminalError => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": "Method not found" }
        }))
        .into_response(),
        Behavior::Malformed => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html")],
            "<html><body>Bad Gateway from upstream</body></html>",
        )
            .into_response(),
        Behavior::Accepted => StatusCode::ACCEPTED.into_response(),
        Behavior::FailFirst(k) if n <= k => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": { "message": "backend starting" } })),
        )
            .into_response(),
        Behavior::FailFirst(_) => normal(&method, id, service_name),
        Behavior::Slow(delay) => {
            tokio::time::sleep(delay).await;
            normal(&method, id, service_name)
        }
    }
}

fn normal(method: &str, id: Value, service_name: Option<String>) -> Response {
    let backend = service_name.unwrap_or_else(|| "unknown".into());
    let result = match method {
        "tools/list" => json!({ "tools": [{ "name": "echo" }], "targetService": backend }),
        "resources/list" => json!({ "resources": [], "metadata": { "targetServer": backend } }),
        _ => json!({}),
    };
    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result })).into_response()
}

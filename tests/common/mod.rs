//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{post, put},
    Json, Router,
};
use serde_json::Value;
use tokio::net::TcpListener;

/// A request captured by [`MockCollector`].
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct Captured {
    pub path_param: String,
    pub auth: Option<String>,
    pub body: Value,
}

#[derive(Clone, Default)]
struct Inbox {
    events: Arc<Mutex<Vec<Captured>>>,
    pushes: Arc<Mutex<Vec<(String, String)>>>,
}

/// Mock error collector and metrics push gateway on an ephemeral port.
pub struct MockCollector {
    pub addr: SocketAddr,
    inbox: Inbox,
}

#[allow(dead_code)]
impl MockCollector {
    pub async fn start() -> Self {
        let inbox = Inbox::default();
        let app = Router::new()
            .route("/api/{project}/store/", post(store_event))
            .route("/metrics/job/{job}", put(push_metrics))
            .with_state(inbox.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, inbox }
    }

    pub fn dsn(&self, project: &str) -> String {
        format!("http://public-key@{}/{}", self.addr, project)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn events(&self) -> Vec<Captured> {
        self.inbox.events.lock().unwrap().clone()
    }

    /// `(job, body)` of every metrics push.
    pub fn pushes(&self) -> Vec<(String, String)> {
        self.inbox.pushes.lock().unwrap().clone()
    }

    /// Poll until `count` metrics pushes arrived or `timeout` elapses.
    pub async fn wait_for_pushes(&self, count: usize, timeout: Duration) -> Vec<(String, String)> {
        wait_until(timeout, || self.pushes().len() >= count).await;
        self.pushes()
    }
}

async fn store_event(
    State(inbox): State<Inbox>,
    Path(project): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let auth = headers
        .get("x-sentry-auth")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    inbox.events.lock().unwrap().push(Captured {
        path_param: project,
        auth,
        body,
    });
    StatusCode::OK
}

async fn push_metrics(State(inbox): State<Inbox>, Path(job): Path<String>, body: Bytes) -> StatusCode {
    let body = String::from_utf8_lossy(&body).to_string();
    inbox.pushes.lock().unwrap().push((job, body));
    StatusCode::OK
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[allow(dead_code)]
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{body::Bytes, extract::State, http::HeaderMap, http::StatusCode, routing::post, Router};
use tokio::net::TcpListener;

/// A request the mock writer received.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("writer received invalid JSON")
    }
}

type Responder = Arc<dyn Fn(usize) -> std::pin::Pin<Box<dyn Future<Output = u16> + Send>> + Send + Sync>;

#[derive(Clone)]
struct SinkState {
    requests: Arc<Mutex<Vec<Recorded>>>,
    responder: Responder,
}

/// Handle on a running mock writer.
#[derive(Clone)]
pub struct MockWriter {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockWriter {
    pub fn url(&self) -> String {
        format!("http://{}/log", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Poll until at least `n` requests arrived or `limit` passes.
    #[allow(dead_code)]
    pub async fn wait_for(&self, n: usize, limit: Duration) -> Vec<Recorded> {
        let deadline = tokio::time::Instant::now() + limit;
        while self.count() < n && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.requests()
    }
}

async fn log(State(state): State<SinkState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let index = {
        let mut requests = state.requests.lock().unwrap();
        requests.push(Recorded {
            content_type: headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });
        requests.len() - 1
    };
    let status = (state.responder)(index).await;
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Start a mock writer whose response status is chosen per request.
///
/// `f` receives the zero-based index of the request being answered.
pub async fn start_programmable_writer<F, Fut>(f: F) -> MockWriter
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = u16> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let state = SinkState {
        requests: requests.clone(),
        responder: Arc::new(move |i| Box::pin(f(i))),
    };
    let app = Router::new().route("/log", post(log)).with_state(state);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockWriter { addr, requests }
}

/// Start a mock writer that always answers `200 OK`.
#[allow(dead_code)]
pub async fn start_mock_writer() -> MockWriter {
    start_programmable_writer(|_| async { 200 }).await
}

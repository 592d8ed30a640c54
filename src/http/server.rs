//! HTTP ingest surface.
//!
//! # Responsibilities
//! - Accept raw entry/exit event bodies and enqueue them for the pipeline
//! - Bound request body size
//! - Report liveness
//!
//! # Endpoints
//! - `POST /entry-event` → entry queue, `202 Accepted`
//! - `POST /exit-event` → exit queue, `202 Accepted`
//! - `GET /health` → `200 ok`
//!
//! Bodies are not decoded here; malformed events are the pipeline's concern.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::IngestConfig;
use crate::events::StreamKind;

/// Queue handles injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub entry_tx: mpsc::Sender<Vec<u8>>,
    pub exit_tx: mpsc::Sender<Vec<u8>>,
}

/// HTTP server feeding the event queues.
pub struct IngestServer {
    router: Router,
}

impl IngestServer {
    pub fn new(
        config: &IngestConfig,
        entry_tx: mpsc::Sender<Vec<u8>>,
        exit_tx: mpsc::Sender<Vec<u8>>,
    ) -> Self {
        let state = AppState { entry_tx, exit_tx };
        Self {
            router: Self::build_router(config, state),
        }
    }

    fn build_router(config: &IngestConfig, state: AppState) -> Router {
        Router::new()
            .route("/entry-event", post(entry_event))
            .route("/exit-event", post(exit_event))
            .route("/health", get(health))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Ingest server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Ingest server stopped");
        Ok(())
    }
}

async fn enqueue(queue: &mpsc::Sender<Vec<u8>>, kind: StreamKind, body: Bytes) -> StatusCode {
    match queue.send(body.to_vec()).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => {
            tracing::warn!(queue = %kind, "Consumer gone, rejecting event");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn entry_event(State(state): State<AppState>, body: Bytes) -> StatusCode {
    enqueue(&state.entry_tx, StreamKind::Entry, body).await
}

async fn exit_event(State(state): State<AppState>, body: Bytes) -> StatusCode {
    enqueue(&state.exit_tx, StreamKind::Exit, body).await
}

async fn health() -> &'static str {
    "ok"
}

//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the store, metrics collector, transport and pipeline components
//! - Start the consumers, the ingest server and the metrics endpoint
//! - Stop everything when a consumer exits or a signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Consumers start before the ingest server accepts traffic
//! - A consumer that aborts takes the whole process down with it

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};
use url::Url;

use crate::config::GateConfig;
use crate::delivery::{Forwarder, HttpTransport, TransportError};
use crate::http::IngestServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics::serve_metrics;
use crate::observability::PipelineMetrics;
use crate::pipeline::{event_queue, Correlator, Ingestor, PipelineError};
use crate::resilience::RetryPolicy;
use crate::store::{CorrelationStore, MemoryStore, StoreError};

/// Errors that stop the process.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("metrics recorder: {0}")]
    Metrics(#[from] BuildError),

    #[error("correlation store: {0}")]
    Store(#[from] StoreError),

    #[error("invalid sink URL: {0}")]
    SinkUrl(#[from] url::ParseError),

    #[error("HTTP client: {0}")]
    Transport(#[from] TransportError),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' is not a socket address")]
    Address(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("task failed: {0}")]
    Task(#[from] JoinError),
}

fn open_store(config: &GateConfig) -> Result<MemoryStore, StoreError> {
    let store = match &config.store.persistence_path {
        Some(path) => MemoryStore::load_from_file(path)?,
        None => MemoryStore::new(),
    };
    Ok(store.with_ttl(config.store.entry_ttl_secs))
}

async fn bind(addr: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(addr).await.map_err(|source| StartupError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Run the correlator until shutdown or until a consumer aborts.
pub async fn run(config: GateConfig) -> Result<(), StartupError> {
    let metrics = PipelineMetrics::new()?;
    let store = open_store(&config)?;
    let shared_store: Arc<dyn CorrelationStore> = Arc::new(store.clone());

    let sink_url = Url::parse(config.sink.url.as_deref().unwrap_or_default())?;
    let attempt_timeout = Duration::from_secs(config.sink.attempt_timeout_secs);
    let transport = HttpTransport::new(sink_url, attempt_timeout)?;
    tracing::info!(
        sink = %transport.url(),
        max_attempts = config.retries.max_attempts,
        interval_ms = config.retries.interval_ms,
        "Summary forwarder configured"
    );

    let forwarder = Forwarder::new(
        transport,
        RetryPolicy::from(&config.retries),
        attempt_timeout,
        Arc::new(metrics.clone()),
    );
    let correlator = Arc::new(
        Correlator::new(shared_store.clone(), forwarder, metrics.clone())
            .with_evict_on_exit(config.store.evict_on_exit),
    );
    let ingestor = Ingestor::new(shared_store, metrics.clone());

    let (entry_tx, entry_rx) = event_queue(config.ingest.queue_capacity);
    let (exit_tx, exit_rx) = event_queue(config.ingest.queue_capacity);

    let shutdown = Shutdown::new();
    let _signals = shutdown.trigger_on_signal();

    let mut consumers = JoinSet::new();
    consumers.spawn(ingestor.run(entry_rx, config.pipeline.clone(), shutdown.subscribe()));
    consumers.spawn(correlator.run(exit_rx, config.pipeline.clone(), shutdown.subscribe()));

    let mut servers = JoinSet::new();
    let snapshots = tokio::spawn(store.clone().run_snapshots(
        Duration::from_secs(config.store.snapshot_interval_secs),
        shutdown.subscribe(),
    ));
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address(config.observability.metrics_address.clone()))?;
        servers.spawn(serve_metrics(addr, metrics.clone(), shutdown.subscribe()));
    }

    let listener = bind(&config.ingest.bind_address).await?;
    let server = IngestServer::new(&config.ingest, entry_tx, exit_tx);
    servers.spawn(server.run(listener, shutdown.subscribe()));

    // Whichever consumer finishes first (shutdown or abort) stops the rest.
    let mut result = Ok(());
    if let Some(first) = consumers.join_next().await {
        shutdown.trigger("consumer stopped");
        result = first?.map_err(StartupError::from);
    }
    while let Some(next) = consumers.join_next().await {
        if let Err(e) = next? {
            if result.is_ok() {
                result = Err(e.into());
            }
        }
    }
    while let Some(server) = servers.join_next().await {
        if let Ok(Err(e)) = server {
            tracing::error!(error = %e, "Server exited with error");
        }
    }

    if let Err(e) = snapshots.await {
        tracing::error!(error = %e, "Snapshot task failed");
    }
    if let Err(e) = store.snapshot().await {
        tracing::error!(error = %e, "Failed to write final store snapshot");
    }
    tracing::info!(entries = store.len(), "Correlator stopped");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_memory_only() {
        let store = open_store(&GateConfig::default()).unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_bind_error_names_address() {
        let err = bind("127.0.0.1:99999").await.unwrap_err();
        assert!(err.to_string().starts_with("cannot bind 127.0.0.1:99999"));
    }
}

//! Entry event ingestion.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::config::PipelineConfig;
use crate::events::{decode_entry, EntryEvent};
use crate::observability::PipelineMetrics;
use crate::pipeline::{next_message, PipelineError};
use crate::store::CorrelationStore;

/// Decodes entry events and records them in the correlation store.
pub struct Ingestor {
    store: Arc<dyn CorrelationStore>,
    metrics: PipelineMetrics,
}

impl Ingestor {
    pub fn new(store: Arc<dyn CorrelationStore>, metrics: PipelineMetrics) -> Self {
        Self { store, metrics }
    }

    /// Decode one raw message and store it.
    pub fn ingest(&self, body: &[u8]) -> Result<EntryEvent, PipelineError> {
        let event = decode_entry(body).inspect_err(|_| self.metrics.record_decode_failure())?;
        self.metrics.record_entry_event();
        tracing::debug!(vehicle = %event.vehicle_id, event_id = %event.id, "Received entry event");

        self.store.put(event.clone())?;
        Ok(event)
    }

    /// Consume entry messages until the queue closes or shutdown fires.
    ///
    /// Returns an error only when the configured policy says to abort.
    pub async fn run(
        self,
        mut messages: mpsc::Receiver<Vec<u8>>,
        config: PipelineConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), PipelineError> {
        tracing::info!("Entry event consumer started");

        while let Some(body) = next_message(&mut messages, &mut shutdown).await {
            if let Err(e) = self.ingest(&body) {
                if e.should_abort(&config) {
                    tracing::error!(error = %e, "Entry event consumer aborting");
                    return Err(e);
                }
                tracing::warn!(error = %e, "Discarding entry event");
            }
        }

        tracing::info!(stored = self.store.len(), "Entry event consumer stopped");
        Ok(())
    }
}

//! Exit event correlation and hand-off to delivery.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::config::PipelineConfig;
use crate::delivery::{DeliveryOutcome, Forwarder, SinkTransport};
use crate::events::{decode_exit, ExitEvent, Summary};
use crate::observability::PipelineMetrics;
use crate::pipeline::{next_message, PipelineError};
use crate::store::CorrelationStore;

/// Pairs exit events with stored entries and forwards the summary.
pub struct Correlator<T> {
    store: Arc<dyn CorrelationStore>,
    forwarder: Forwarder<T>,
    metrics: PipelineMetrics,
    evict_on_exit: bool,
}

impl<T: SinkTransport + 'static> Correlator<T> {
    pub fn new(
        store: Arc<dyn CorrelationStore>,
        forwarder: Forwarder<T>,
        metrics: PipelineMetrics,
    ) -> Self {
        Self {
            store,
            forwarder,
            metrics,
            evict_on_exit: false,
        }
    }

    /// Remove the paired entry once an exit has matched it.
    pub fn with_evict_on_exit(mut self, evict: bool) -> Self {
        self.evict_on_exit = evict;
        self
    }

    /// Build the summary for `exit`.
    ///
    /// When no entry is known the exit time doubles as the entry time:
    /// the camera most likely missed the vehicle coming in.
    pub fn correlate(&self, exit: &ExitEvent) -> Summary {
        let entry_time = match self.store.get(&exit.vehicle_id) {
            Some(entry) => {
                if self.evict_on_exit {
                    if let Err(e) = self.store.remove(&exit.vehicle_id) {
                        tracing::warn!(vehicle = %exit.vehicle_id, error = %e, "Failed to evict entry");
                    }
                }
                entry.entry_time
            }
            None => {
                tracing::info!(vehicle = %exit.vehicle_id, "No entry event found, billing zero duration");
                self.metrics.record_fallback();
                exit.exit_time.clone()
            }
        };

        Summary {
            vehicle_id: exit.vehicle_id.clone(),
            entry_time,
            exit_time: exit.exit_time.clone(),
        }
    }

    /// Correlate one decoded exit event and deliver the result.
    pub async fn process(&self, exit: ExitEvent) -> DeliveryOutcome {
        let summary = self.correlate(&exit);
        self.forwarder.deliver(&summary).await
    }

    /// Decode, correlate and deliver one raw message.
    pub async fn handle(&self, body: &[u8]) -> Result<DeliveryOutcome, PipelineError> {
        let exit = self.decode(body)?;
        Ok(self.process(exit).await)
    }

    fn decode(&self, body: &[u8]) -> Result<ExitEvent, PipelineError> {
        let exit = decode_exit(body).inspect_err(|_| self.metrics.record_decode_failure())?;
        self.metrics.record_exit_event();
        tracing::debug!(vehicle = %exit.vehicle_id, event_id = %exit.id, "Received exit event");
        Ok(exit)
    }

    /// Consume exit messages until the queue closes or shutdown fires.
    ///
    /// With `max_in_flight_exits == 1` events are handled one at a time in
    /// arrival order. Larger values dispatch each event on its own task.
    ///
    /// Shutdown does not interrupt a delivery: queued exits are drained and
    /// each one runs its full retry envelope before the loop returns.
    pub async fn run(
        self: Arc<Self>,
        mut messages: mpsc::Receiver<Vec<u8>>,
        config: PipelineConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), PipelineError> {
        tracing::info!(max_in_flight = config.max_in_flight_exits, "Exit event consumer started");

        let permits = Arc::new(Semaphore::new(config.max_in_flight_exits.max(1)));
        let mut in_flight = JoinSet::new();

        let result = loop {
            let Some(body) = next_message(&mut messages, &mut shutdown).await else {
                break Ok(());
            };

            let exit = match self.decode(&body) {
                Ok(exit) => exit,
                Err(e) if e.should_abort(&config) => {
                    tracing::error!(error = %e, "Exit event consumer aborting");
                    break Err(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding exit event");
                    continue;
                }
            };

            if config.max_in_flight_exits <= 1 {
                self.process(exit).await;
                continue;
            }

            let Ok(permit) = permits.clone().acquire_owned().await else {
                break Ok(());
            };
            let correlator = self.clone();
            in_flight.spawn(async move {
                correlator.process(exit).await;
                drop(permit);
            });
            while in_flight.try_join_next().is_some() {}
        };

        if !in_flight.is_empty() {
            tracing::info!(pending = in_flight.len(), "Waiting for in-flight deliveries");
        }
        while in_flight.join_next().await.is_some() {}

        tracing::info!("Exit event consumer stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::config::FailurePolicy;
    use crate::delivery::TransportError;
    use crate::events::EntryEvent;
    use crate::resilience::RetryPolicy;
    use crate::store::MemoryStore;

    #[derive(Default)]
    struct RecordingTransport {
        bodies: Mutex<Vec<Summary>>,
    }

    impl SinkTransport for RecordingTransport {
        async fn post(&self, body: Vec<u8>) -> Result<u16, TransportError> {
            let summary: Summary = serde_json::from_slice(&body).expect("summary body");
            self.bodies.lock().unwrap().push(summary);
            Ok(200)
        }
    }

    /// Fails every request; counts how many it saw.
    #[derive(Default)]
    struct DownTransport {
        calls: AtomicU32,
    }

    impl SinkTransport for DownTransport {
        async fn post(&self, _body: Vec<u8>) -> Result<u16, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(503)
        }
    }

    /// Answers 503 to the first `failures` requests, then 200.
    struct RecoveringTransport {
        failures: u32,
        calls: AtomicU32,
    }

    impl SinkTransport for RecoveringTransport {
        async fn post(&self, _body: Vec<u8>) -> Result<u16, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(if call < self.failures { 503 } else { 200 })
        }
    }

    fn correlator<T: SinkTransport + 'static>(
        store: Arc<MemoryStore>,
        transport: T,
    ) -> Correlator<T> {
        let metrics = PipelineMetrics::new().unwrap();
        let forwarder = Forwarder::new(
            transport,
            RetryPolicy::default(),
            Duration::from_secs(10),
            Arc::new(metrics.clone()),
        );
        Correlator::new(store, forwarder, metrics)
    }

    fn exit(id: &str, plate: &str, time: &str) -> ExitEvent {
        ExitEvent {
            id: id.to_string(),
            vehicle_id: plate.to_string(),
            exit_time: time.to_string(),
        }
    }

    #[test]
    fn test_matched_exit_uses_stored_entry_time() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(EntryEvent {
                id: "1".to_string(),
                vehicle_id: "ABC123".to_string(),
                entry_time: "2021-01-01T00:00:00Z".to_string(),
            })
            .unwrap();

        let correlator = correlator(store, RecordingTransport::default());
        let summary = correlator.correlate(&exit("2", "ABC123", "2021-01-01T01:00:00Z"));
        assert_eq!(
            summary,
            Summary {
                vehicle_id: "ABC123".to_string(),
                entry_time: "2021-01-01T00:00:00Z".to_string(),
                exit_time: "2021-01-01T01:00:00Z".to_string(),
            }
        );
    }

    #[test]
    fn test_unmatched_exit_falls_back_to_exit_time() {
        let correlator = correlator(Arc::new(MemoryStore::new()), RecordingTransport::default());
        let summary = correlator.correlate(&exit("9", "XYZ999", "2021-01-01T02:00:00Z"));
        assert_eq!(summary.entry_time, summary.exit_time);
        assert!(summary.is_zero_duration());
        assert!(correlator
            .metrics
            .render()
            .contains("gate_fallback_summaries_total 1"));
    }

    #[test]
    fn test_entry_retained_after_exit_by_default() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(EntryEvent {
                id: "1".to_string(),
                vehicle_id: "ABC123".to_string(),
                entry_time: "t0".to_string(),
            })
            .unwrap();
        let correlator = correlator(store.clone(), RecordingTransport::default());
        correlator.correlate(&exit("2", "ABC123", "t1"));
        assert!(store.get("ABC123").is_some());
    }

    #[test]
    fn test_evict_on_exit() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(EntryEvent {
                id: "1".to_string(),
                vehicle_id: "ABC123".to_string(),
                entry_time: "t0".to_string(),
            })
            .unwrap();
        let correlator =
            correlator(store.clone(), RecordingTransport::default()).with_evict_on_exit(true);

        assert_eq!(correlator.correlate(&exit("2", "ABC123", "t1")).entry_time, "t0");
        assert!(store.get("ABC123").is_none());
        // A second exit for the same plate no longer re-pairs.
        assert_eq!(correlator.correlate(&exit("3", "ABC123", "t2")).entry_time, "t2");
    }

    #[tokio::test]
    async fn test_handle_delivers_summary() {
        let transport = Arc::new(RecordingTransport::default());
        let correlator = correlator(Arc::new(MemoryStore::new()), transport.clone());

        let body = br#"{"id":"2","vehicle_plate":"XYZ999","exit_date_time":"2021-01-01T01:00:00Z"}"#;
        let outcome = correlator.handle(body).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 1 });

        let sent = transport.bodies.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].vehicle_id, "XYZ999");
        assert_eq!(sent[0].entry_time, "2021-01-01T01:00:00Z");
    }

    #[tokio::test]
    async fn test_run_aborts_on_decode_error_when_configured() {
        let transport = Arc::new(RecordingTransport::default());
        let correlator = Arc::new(correlator(Arc::new(MemoryStore::new()), transport.clone()));
        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tx.send(b"not json".to_vec()).await.unwrap();

        let config = PipelineConfig {
            on_decode_error: FailurePolicy::Abort,
            ..PipelineConfig::default()
        };
        let result = correlator.run(rx, config, shutdown_rx).await;
        assert!(matches!(result, Err(PipelineError::Decode(_))));
        assert!(transport.bodies.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_queue_and_finishes_retries() {
        let transport = Arc::new(RecoveringTransport {
            failures: 3,
            calls: AtomicU32::new(0),
        });
        let correlator = Arc::new(correlator(Arc::new(MemoryStore::new()), transport.clone()));
        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        for i in 0..2 {
            let body = format!(
                r#"{{"id":"{i}","vehicle_plate":"CAR00{i}","exit_date_time":"2021-01-01T01:00:00Z"}}"#
            );
            tx.send(body.into_bytes()).await.unwrap();
        }
        shutdown_tx.send(()).unwrap();

        let started = tokio::time::Instant::now();
        correlator.clone().run(rx, PipelineConfig::default(), shutdown_rx).await.unwrap();

        // First exit: three failures, then delivered. Second exit: delivered at once.
        assert_eq!(transport.calls.load(Ordering::SeqCst), 5);
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(correlator
            .metrics
            .render()
            .contains("gate_summaries_delivered_total 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_dispatch_does_not_serialize_retries() {
        let transport = Arc::new(DownTransport::default());
        let correlator = Arc::new(correlator(Arc::new(MemoryStore::new()), transport.clone()));
        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        for i in 0..3 {
            let body = format!(
                r#"{{"id":"{i}","vehicle_plate":"CAR00{i}","exit_date_time":"2021-01-01T01:00:00Z"}}"#
            );
            tx.send(body.into_bytes()).await.unwrap();
        }
        drop(tx);

        let config = PipelineConfig {
            max_in_flight_exits: 3,
            ..PipelineConfig::default()
        };
        let started = tokio::time::Instant::now();
        correlator.run(rx, config, shutdown_rx).await.unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 45);
        // Three overlapping 15s retry envelopes, not 45s back to back.
        assert!(started.elapsed() < Duration::from_secs(20));
    }
}

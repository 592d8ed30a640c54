//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define pipeline metrics (events, fallbacks, deliveries, latency)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `post_request_latency_seconds` (summary, p50/p90/p99): every delivery attempt
//! - `gate_entry_events_total` / `gate_exit_events_total` (counter): decoded events
//! - `gate_decode_failures_total` (counter): malformed inbound messages
//! - `gate_fallback_summaries_total` (counter): exits with no known entry
//! - `gate_summaries_delivered_total` / `gate_summaries_dropped_total` (counter)
//!
//! # Design Decisions
//! - The recorder is never installed globally; `PipelineMetrics` is built
//!   once in `main` and handed to whoever records

use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::State, routing::get, Router};
use metrics::{Counter, Histogram, Key, KeyName, Level, Metadata, Recorder, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub const DELIVERY_LATENCY: &str = "post_request_latency_seconds";
pub const ENTRY_EVENTS: &str = "gate_entry_events_total";
pub const EXIT_EVENTS: &str = "gate_exit_events_total";
pub const DECODE_FAILURES: &str = "gate_decode_failures_total";
pub const FALLBACK_SUMMARIES: &str = "gate_fallback_summaries_total";
pub const SUMMARIES_DELIVERED: &str = "gate_summaries_delivered_total";
pub const SUMMARIES_DROPPED: &str = "gate_summaries_dropped_total";

const QUANTILES: [f64; 3] = [0.5, 0.9, 0.99];
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Receives the duration of every delivery attempt, successful or not.
pub trait LatencyObserver: Send + Sync {
    fn observe(&self, elapsed: Duration);

    /// Final outcome of one summary after all attempts.
    fn record_outcome(&self, _delivered: bool) {}
}

/// Collector for every metric the pipeline records.
#[derive(Clone)]
pub struct PipelineMetrics {
    handle: PrometheusHandle,
    delivery_latency: Histogram,
    entry_events: Counter,
    exit_events: Counter,
    decode_failures: Counter,
    fallback_summaries: Counter,
    summaries_delivered: Counter,
    summaries_dropped: Counter,
}

impl PipelineMetrics {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_quantiles(&QUANTILES)?
            .build_recorder();

        recorder.describe_histogram(
            KeyName::from(DELIVERY_LATENCY),
            Some(Unit::Seconds),
            "Latency of POST requests to the writer service in seconds".into(),
        );
        for (name, help) in [
            (ENTRY_EVENTS, "Entry events decoded"),
            (EXIT_EVENTS, "Exit events decoded"),
            (DECODE_FAILURES, "Inbound messages that failed to decode"),
            (FALLBACK_SUMMARIES, "Summaries built without a known entry event"),
            (SUMMARIES_DELIVERED, "Summaries accepted by the writer service"),
            (SUMMARIES_DROPPED, "Summaries dropped after exhausting retries"),
        ] {
            recorder.describe_counter(KeyName::from(name), None, help.into());
        }

        Ok(Self {
            delivery_latency: histogram(&recorder, DELIVERY_LATENCY),
            entry_events: counter(&recorder, ENTRY_EVENTS),
            exit_events: counter(&recorder, EXIT_EVENTS),
            decode_failures: counter(&recorder, DECODE_FAILURES),
            fallback_summaries: counter(&recorder, FALLBACK_SUMMARIES),
            summaries_delivered: counter(&recorder, SUMMARIES_DELIVERED),
            summaries_dropped: counter(&recorder, SUMMARIES_DROPPED),
            handle: recorder.handle(),
        })
    }

    pub fn record_entry_event(&self) {
        self.entry_events.increment(1);
    }

    pub fn record_exit_event(&self) {
        self.exit_events.increment(1);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.increment(1);
    }

    pub fn record_fallback(&self) {
        self.fallback_summaries.increment(1);
    }

    /// Prometheus text exposition of everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }
}

impl LatencyObserver for PipelineMetrics {
    fn observe(&self, elapsed: Duration) {
        self.delivery_latency.record(elapsed.as_secs_f64());
    }

    fn record_outcome(&self, delivered: bool) {
        if delivered {
            self.summaries_delivered.increment(1);
        } else {
            self.summaries_dropped.increment(1);
        }
    }
}

impl std::fmt::Debug for PipelineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineMetrics").finish_non_exhaustive()
    }
}

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

fn counter(recorder: &PrometheusRecorder, name: &'static str) -> Counter {
    recorder.register_counter(&Key::from_static_name(name), &metadata())
}

fn histogram(recorder: &PrometheusRecorder, name: &'static str) -> Histogram {
    recorder.register_histogram(&Key::from_static_name(name), &metadata())
}

async fn scrape(State(metrics): State<PipelineMetrics>) -> String {
    metrics.render()
}

/// Router exposing `GET /metrics`.
pub fn metrics_router(metrics: PipelineMetrics) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .with_state(metrics)
}

/// Serve the scrape endpoint until shutdown, running recorder upkeep meanwhile.
pub async fn serve_metrics(
    addr: SocketAddr,
    metrics: PipelineMetrics,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Metrics endpoint listening");

    let handle = metrics.handle().clone();
    let upkeep = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(UPKEEP_INTERVAL);
        loop {
            ticker.tick().await;
            handle.run_upkeep();
        }
    });

    let result = axum::serve(listener, metrics_router(metrics))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await;

    upkeep.abort();
    tracing::info!("Metrics endpoint stopped");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_rendered_as_summary() {
        let metrics = PipelineMetrics::new().unwrap();
        metrics.observe(Duration::from_millis(120));
        metrics.observe(Duration::from_millis(80));

        let output = metrics.render();
        assert!(output.contains("post_request_latency_seconds{quantile=\"0.5\"}"));
        assert!(output.contains("post_request_latency_seconds{quantile=\"0.99\"}"));
        assert!(output.contains("post_request_latency_seconds_count 2"));
    }

    #[test]
    fn test_counters() {
        let metrics = PipelineMetrics::new().unwrap();
        metrics.record_fallback();
        metrics.record_outcome(true);
        metrics.record_outcome(false);
        metrics.record_outcome(false);

        let output = metrics.render();
        assert!(output.contains("gate_fallback_summaries_total 1"));
        assert!(output.contains("gate_summaries_delivered_total 1"));
        assert!(output.contains("gate_summaries_dropped_total 2"));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = PipelineMetrics::new().unwrap();
        let b = PipelineMetrics::new().unwrap();
        a.record_entry_event();
        assert!(a.render().contains("gate_entry_events_total 1"));
        assert!(!b.render().contains("gate_entry_events_total 1"));
    }
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! correlator. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gate correlator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Ingest surface (HTTP endpoints feeding the two event queues).
    pub ingest: IngestConfig,

    /// Downstream recorder receiving summaries.
    pub sink: SinkConfig,

    /// Delivery retry configuration.
    pub retries: RetryConfig,

    /// Correlation store settings.
    pub store: StoreConfig,

    /// Consumption loop behavior.
    pub pipeline: PipelineConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Ingest surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Capacity of each event queue (backpressure).
    pub queue_capacity: usize,

    /// Maximum accepted event body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            queue_capacity: 1024,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Downstream sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkConfig {
    /// URL summaries are POSTed to. Required.
    pub url: Option<String>,

    /// Deadline for a single delivery attempt in seconds.
    pub attempt_timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: None,
            attempt_timeout_secs: 10,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total delivery attempts per summary.
    pub max_attempts: u32,

    /// Fixed wait between attempts in milliseconds.
    pub interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            interval_ms: 1000,
        }
    }
}

/// Correlation store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot file; the store is memory-only when unset.
    pub persistence_path: Option<String>,

    /// Seconds between snapshots of a changed store.
    pub snapshot_interval_secs: u64,

    /// Seconds after which a stored entry no longer matches (0 = never).
    pub entry_ttl_secs: u64,

    /// Remove an entry once an exit event has been paired with it.
    pub evict_on_exit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persistence_path: None,
            snapshot_interval_secs: 30,
            entry_ttl_secs: 0,
            evict_on_exit: false,
        }
    }
}

/// What a consumption loop does with a message it cannot process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and move on to the next message.
    Skip,
    /// Stop the loop and report the error.
    Abort,
}

/// Consumption loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reaction to malformed inbound messages.
    pub on_decode_error: FailurePolicy,

    /// Reaction to a failed correlation store write.
    pub on_store_error: FailurePolicy,

    /// Exit events correlated and delivered concurrently (1 = in order).
    pub max_in_flight_exits: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            on_decode_error: FailurePolicy::Skip,
            on_store_error: FailurePolicy::Abort,
            max_in_flight_exits: 1,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

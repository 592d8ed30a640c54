//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Required locations are present and well-formed
//! - Value ranges (timeouts > 0, capacities > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GateConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.sink.url.as_deref() {
        None | Some("") => errors.push(ValidationError::new(
            "sink.url",
            "must be set (or WRITER_HOST and WRITER_PORT)",
        )),
        Some(raw) => match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                "sink.url",
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("sink.url", format!("invalid URL: {}", e))),
        },
    }

    if config.sink.attempt_timeout_secs == 0 {
        errors.push(ValidationError::new("sink.attempt_timeout_secs", "must be greater than 0"));
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.ingest.queue_capacity == 0 {
        errors.push(ValidationError::new("ingest.queue_capacity", "must be greater than 0"));
    }
    if config.ingest.max_body_bytes == 0 {
        errors.push(ValidationError::new("ingest.max_body_bytes", "must be greater than 0"));
    }
    if config.pipeline.max_in_flight_exits == 0 {
        errors.push(ValidationError::new("pipeline.max_in_flight_exits", "must be at least 1"));
    }
    if config.store.persistence_path.is_some() && config.store.snapshot_interval_secs == 0 {
        errors.push(ValidationError::new(
            "store.snapshot_interval_secs",
            "must be greater than 0 when persistence_path is set",
        ));
    }
    if config.ingest.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "ingest.bind_address",
            format!("'{}' is not a socket address", config.ingest.bind_address),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

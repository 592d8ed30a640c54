//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (WRITER_HOST/WRITER_PORT, PROMETHEUS_METRICS_PORT, INGEST_ADDRESS)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults except the sink location
//! - A missing or malformed sink location is fatal at startup

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    FailurePolicy, GateConfig, IngestConfig, LogFormat, ObservabilityConfig, PipelineConfig,
    RetryConfig, SinkConfig, StoreConfig,
};
pub use validation::ValidationError;

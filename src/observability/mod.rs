//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline loops and forwarder produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, delivery latency summary)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{LatencyObserver, PipelineMetrics};

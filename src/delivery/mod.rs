//! Summary delivery subsystem.
//!
//! # Data Flow
//! ```text
//! Summary
//!     → forwarder.rs (serialize once)
//!     → transport.rs (POST application/json, per-attempt deadline)
//!     → status 200: done
//!     → anything else: wait, retry (resilience::RetryPolicy)
//!     → exhausted: log, drop
//! ```
//!
//! # Design Decisions
//! - Callers never see a delivery error
//! - Every attempt's latency is observed, including failures and timeouts

pub mod forwarder;
pub mod transport;

pub use forwarder::{DeliveryOutcome, Forwarder};
pub use transport::{HttpTransport, SinkTransport, TransportError};

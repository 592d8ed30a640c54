//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Summary delivery attempt:
//!     → timeouts.rs (per-attempt deadline)
//!     → On failure: retries.rs (fixed interval, bounded attempts)
//!     → Exhausted: summary dropped, logged
//! ```
//!
//! # Design Decisions
//! - Every outbound call has a deadline
//! - Fixed retry cadence, no backoff or jitter
//! - No retry budget: every summary gets the full attempt count

pub mod retries;
pub mod timeouts;

pub use retries::RetryPolicy;
pub use timeouts::{with_deadline, Elapsed};

//! HTTP ingest subsystem.
//!
//! # Data Flow
//! ```text
//! gate camera / simulator
//!     → POST /entry-event, /exit-event (server.rs)
//!     → bounded mpsc queue per stream
//!     → pipeline consumers
//! ```

pub mod server;

pub use server::IngestServer;

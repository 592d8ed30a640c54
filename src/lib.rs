//! Parking gate event correlator.
//!
//! Pairs vehicle exit events with the entry events seen earlier, builds a
//! stay summary per vehicle and delivers it to the writer service.

pub mod config;
pub mod delivery;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod store;

pub use config::GateConfig;
pub use delivery::{Forwarder, HttpTransport, SinkTransport};
pub use events::{EntryEvent, ExitEvent, Summary};
pub use lifecycle::Shutdown;
pub use pipeline::{Correlator, Ingestor};
pub use store::{CorrelationStore, MemoryStore};

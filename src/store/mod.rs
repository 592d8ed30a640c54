//! Correlation store subsystem.
//!
//! # Responsibilities
//! - Map a vehicle plate to the most recent entry event seen for it
//! - Surface write failures to the caller
//! - Fold read failures into "not found" so the fallback policy engages
//!
//! # Design Decisions
//! - Last write wins; no versioning, no history
//! - Single-key operations only; atomicity is the backing map's
//! - Entries live until overwritten unless a TTL or evict-on-exit is configured
//! - Persistence is a periodic whole-map snapshot, never a per-write flush

pub mod memory;

use thiserror::Error;

use crate::events::EntryEvent;

pub use memory::MemoryStore;

/// Errors surfaced by store writes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Snapshot file could not be opened or written.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded.
    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The blocking snapshot task panicked or was cancelled.
    #[error("snapshot task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Key-value view of entry events, keyed by vehicle plate.
///
/// Shared by the ingestor (writer) and the correlator (reader).
pub trait CorrelationStore: Send + Sync {
    /// Store `entry`, replacing any record for the same vehicle.
    fn put(&self, entry: EntryEvent) -> Result<(), StoreError>;

    /// Look up the latest entry for `vehicle_id`.
    ///
    /// Returns `None` both when nothing is stored and when the backend
    /// fails to answer; implementations log the latter.
    fn get(&self, vehicle_id: &str) -> Option<EntryEvent>;

    /// Drop the record for `vehicle_id`, if any.
    fn remove(&self, vehicle_id: &str) -> Result<(), StoreError>;

    /// Number of records currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

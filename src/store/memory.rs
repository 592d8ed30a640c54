//! In-memory correlation store with optional snapshot persistence.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::events::EntryEvent;
use crate::store::{CorrelationStore, StoreError};

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Sibling file a snapshot is written to before being renamed over `path`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// An entry event together with the time it was stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub entry: EntryEvent,
    /// Seconds since epoch at the time of `put`.
    pub stored_at: u64,
}

impl StoredEntry {
    /// A TTL of zero never expires.
    pub fn is_expired_at(&self, ttl_secs: u64, now: u64) -> bool {
        ttl_secs > 0 && self.stored_at.saturating_add(ttl_secs) <= now
    }
}

/// Concurrent map of vehicle plate -> latest entry.
///
/// Writes only touch memory. With a persistence path the map is written out
/// by [`MemoryStore::run_snapshots`] and once more at shutdown.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, StoredEntry>>,
    persistence_path: Option<PathBuf>,
    ttl_secs: u64,
    /// Set by every mutation, cleared when a snapshot starts.
    dirty: Arc<AtomicBool>,
    /// Serializes snapshot writes so two saves never interleave on disk.
    save_lock: Arc<Mutex<()>>,
}

impl MemoryStore {
    /// Create an empty, non-persistent store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire entries `ttl_secs` after they were stored (0 disables).
    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Load from a snapshot file if it exists; later snapshots go back to it.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let store = Self {
            persistence_path: Some(path.to_path_buf()),
            ..Self::default()
        };

        if path.exists() {
            let file = File::open(path)?;
            let map: HashMap<String, StoredEntry> = serde_json::from_reader(BufReader::new(file))?;
            for (k, v) in map {
                store.inner.insert(k, v);
            }
            tracing::info!(
                path = %path.display(),
                entries = store.inner.len(),
                "Loaded correlation store snapshot"
            );
        }
        Ok(store)
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence_path.is_some()
    }

    /// Whether the map changed since the last snapshot started.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Write the whole map to the snapshot file, if one is configured.
    ///
    /// Blocking. The map goes to a temporary sibling first and is renamed
    /// over the snapshot, so a crash mid-write leaves the previous snapshot
    /// intact.
    pub fn save_to_file(&self) -> Result<(), StoreError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let _guard = self.save_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.dirty.store(false, Ordering::Release);
        let map: HashMap<_, _> = self
            .inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        let tmp = temp_path(path);
        let written = (|| -> Result<(), StoreError> {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &map)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            fs::rename(&tmp, path)?;
            Ok(())
        })();

        if let Err(e) = written {
            self.dirty.store(true, Ordering::Release);
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        tracing::debug!(path = %path.display(), entries = map.len(), "Saved correlation store snapshot");
        Ok(())
    }

    /// [`MemoryStore::save_to_file`] on the blocking pool.
    pub async fn snapshot(&self) -> Result<(), StoreError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save_to_file()).await?
    }

    /// Snapshot every `period` while there are unsaved changes, until shutdown.
    ///
    /// Failures are logged and retried on the next tick. The final snapshot
    /// is the caller's job, once the consumers have drained.
    pub async fn run_snapshots(self, period: Duration, mut shutdown: broadcast::Receiver<()>) {
        if !self.is_persistent() {
            return;
        }
        let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.is_dirty() {
                        continue;
                    }
                    if let Err(e) = self.snapshot().await {
                        tracing::error!(error = %e, "Failed to write correlation store snapshot");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Snapshot task stopped");
    }

    #[cfg(test)]
    fn insert_stored(&self, stored: StoredEntry) {
        self.inner.insert(stored.entry.vehicle_id.clone(), stored);
    }
}

impl CorrelationStore for MemoryStore {
    fn put(&self, entry: EntryEvent) -> Result<(), StoreError> {
        let stored = StoredEntry {
            entry,
            stored_at: now_secs(),
        };
        self.inner.insert(stored.entry.vehicle_id.clone(), stored);
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn get(&self, vehicle_id: &str) -> Option<EntryEvent> {
        let stored = self.inner.get(vehicle_id).map(|r| r.value().clone())?;
        if stored.is_expired_at(self.ttl_secs, now_secs()) {
            // Only drop it if nobody replaced it in the meantime.
            if self
                .inner
                .remove_if(vehicle_id, |_, v| v.stored_at == stored.stored_at)
                .is_some()
            {
                self.dirty.store(true, Ordering::Release);
            }
            tracing::debug!(vehicle = %vehicle_id, "Entry expired");
            return None;
        }
        Some(stored.entry)
    }

    fn remove(&self, vehicle_id: &str) -> Result<(), StoreError> {
        if self.inner.remove(vehicle_id).is_some() {
            self.dirty.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

//! Event correlation pipeline.
//!
//! # Data Flow
//! ```text
//! entry-event queue → ingestor.rs   → CorrelationStore::put
//! exit-event queue  → correlator.rs → CorrelationStore::get
//!                                   → fallback (entry time := exit time)
//!                                   → delivery::Forwarder
//! ```
//!
//! # Design Decisions
//! - The two loops run as independent tasks and share nothing but the store
//! - No ordering between the streams; an exit may arrive before its entry
//! - Decode and store-write failures are values; `FailurePolicy` decides
//!   whether a loop skips the message or stops

pub mod correlator;
pub mod ingestor;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::config::{FailurePolicy, PipelineConfig};
use crate::events::DecodeError;
use crate::store::StoreError;

pub use correlator::Correlator;
pub use ingestor::Ingestor;

/// A message a consumption loop could not process.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to store entry event: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Whether `config` says this failure should stop the loop.
    pub fn should_abort(&self, config: &PipelineConfig) -> bool {
        let policy = match self {
            PipelineError::Decode(_) => config.on_decode_error,
            PipelineError::Store(_) => config.on_store_error,
        };
        policy == FailurePolicy::Abort
    }
}

/// Bounded queue carrying raw event bodies into a consumption loop.
pub fn event_queue(capacity: usize) -> (mpsc::Sender<Vec<u8>>, mpsc::Receiver<Vec<u8>>) {
    mpsc::channel(capacity.max(1))
}

/// Next message, or `None` once the queue is closed and empty.
///
/// Pending messages win over the shutdown signal. When shutdown fires the
/// queue is closed to new senders and whatever was already accepted is still
/// handed out.
pub(crate) async fn next_message(
    messages: &mut mpsc::Receiver<Vec<u8>>,
    shutdown: &mut broadcast::Receiver<()>,
) -> Option<Vec<u8>> {
    tokio::select! {
        biased;
        message = messages.recv() => message,
        _ = shutdown.recv() => {
            tracing::debug!(pending = messages.len(), "Consumer received shutdown signal, draining queue");
            messages.close();
            messages.recv().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::decode_entry;

    #[test]
    fn test_policy_selection() {
        let decode = PipelineError::from(decode_entry(b"nope").unwrap_err());
        let store = PipelineError::from(StoreError::Io(std::io::Error::other("boom")));

        let config = PipelineConfig::default();
        assert!(!decode.should_abort(&config));
        assert!(store.should_abort(&config));

        let lenient = PipelineConfig {
            on_store_error: FailurePolicy::Skip,
            ..PipelineConfig::default()
        };
        assert!(!store.should_abort(&lenient));
    }

    #[tokio::test]
    async fn test_shutdown_drains_accepted_messages() {
        let (tx, mut rx) = event_queue(8);
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        tx.send(b"one".to_vec()).await.unwrap();
        tx.send(b"two".to_vec()).await.unwrap();
        shutdown_tx.send(()).unwrap();

        assert_eq!(next_message(&mut rx, &mut shutdown_rx).await.unwrap(), b"one");
        assert_eq!(next_message(&mut rx, &mut shutdown_rx).await.unwrap(), b"two");
        assert!(next_message(&mut rx, &mut shutdown_rx).await.is_none());
        // The queue no longer accepts anything.
        assert!(tx.send(b"three".to_vec()).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_on_empty_queue_stops() {
        let (tx, mut rx) = event_queue(8);
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).unwrap();

        assert!(next_message(&mut rx, &mut shutdown_rx).await.is_none());
        assert!(tx.send(b"late".to_vec()).await.is_err());
    }
}

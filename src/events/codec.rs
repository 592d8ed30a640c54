//! Decoding of raw inbound messages.

use std::fmt;

use thiserror::Error;

use crate::events::types::{EntryEvent, ExitEvent};

/// Which inbound stream a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Entry,
    Exit,
}

impl StreamKind {
    /// Queue name used on the ingest surface and in logs.
    pub fn queue_name(&self) -> &'static str {
        match self {
            StreamKind::Entry => "entry-event",
            StreamKind::Exit => "exit-event",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.queue_name())
    }
}

/// A message that could not be decoded into its event type.
#[derive(Debug, Error)]
#[error("malformed {kind} message: {source}")]
pub struct DecodeError {
    pub kind: StreamKind,
    #[source]
    pub source: serde_json::Error,
}

pub fn decode_entry(body: &[u8]) -> Result<EntryEvent, DecodeError> {
    serde_json::from_slice(body).map_err(|source| DecodeError {
        kind: StreamKind::Entry,
        source,
    })
}

pub fn decode_exit(body: &[u8]) -> Result<ExitEvent, DecodeError> {
    serde_json::from_slice(body).map_err(|source| DecodeError {
        kind: StreamKind::Exit,
        source,
    })
}

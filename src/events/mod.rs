//! Gate events subsystem.
//!
//! # Data Flow
//! ```text
//! raw entry-event bytes → codec::decode_entry → EntryEvent
//! raw exit-event bytes  → codec::decode_exit  → ExitEvent
//! EntryEvent + ExitEvent (correlated)          → Summary → sink
//! ```
//!
//! # Design Decisions
//! - Timestamps stay opaque strings; nothing downstream parses them
//! - Decoding never panics; callers choose what a malformed message means

pub mod codec;
pub mod types;

pub use codec::{decode_entry, decode_exit, DecodeError, StreamKind};
pub use types::{EntryEvent, ExitEvent, Summary};

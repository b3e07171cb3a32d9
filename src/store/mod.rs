// src/store/mod.rs

//! Durable storage of awaited jobs.
//!
//! - [`record`] defines the versioned, checksummed journal line format.
//! - [`journal`] owns the append-only session file (replay, append, compaction).
//! - [`persistent`] exposes `PersistentAwaitedJobStore`, the locked map on top.

pub mod journal;
pub mod persistent;
pub mod record;

pub use persistent::PersistentAwaitedJobStore;
pub use record::{JournalOp, JournalRecord, CURRENT_VERSION};

// src/tracking/mod.rs

//! Local bookkeeping of submitted jobs.
//!
//! - [`records`] holds the `AwaitedJob` / `AwaitedTask` values.
//! - [`tracker`] exposes `JobTracker`, the session facade the proxy works
//!   through.

pub mod records;
pub mod tracker;

pub use records::{AwaitedJob, AwaitedTask, TASKID_PLACEHOLDER};
pub use tracker::{JobTracker, TaskRemoval};

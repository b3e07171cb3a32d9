// src/lib.rs

//! Client-side job and data tracking for a remote grid scheduler.
//!
//! A [`ProxyCore`] submits jobs while staging their input and output data
//! on shared storage, remembers which task outputs are still awaited in a
//! crash-recoverable session store, downloads outputs as tasks finish and
//! reconciles with the scheduler after every (re)connection.
//!
//! The scheduler and the storage layer are injected through the
//! [`SchedulerTransport`] and [`DataTransferAgent`] ports.

pub mod config;
pub mod errors;
pub mod logging;
pub mod proxy;
pub mod scheduler;
pub mod store;
pub mod tracking;
pub mod transfer;
pub mod types;

pub use config::ProxyConfig;
pub use errors::{ProxyError, Result};
pub use proxy::{ProxyCore, ProxyEventListener, StagingOptions};
pub use scheduler::{JobSpec, SchedulerTransport, TaskSpec};
pub use store::PersistentAwaitedJobStore;
pub use tracking::{AwaitedJob, AwaitedTask, JobTracker};
pub use transfer::{DataTransferAgent, LocalSpaceAgent, TransferPool};
pub use types::{JobId, JobStatus, SchedulerEvent, TaskStatus};

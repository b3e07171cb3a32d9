// src/scheduler/mod.rs

//! Remote scheduler contract.
//!
//! - [`model`] holds job descriptions, live states and notifications.
//! - [`transport`] defines the `SchedulerTransport` port.

pub mod model;
pub mod transport;

pub use model::{
    JobInfo, JobSpec, JobState, NotificationData, SchedulerNotification, TaskInfo, TaskResult,
    TaskSpec, TaskState,
};
pub use transport::SchedulerTransport;

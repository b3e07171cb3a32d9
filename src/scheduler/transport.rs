// src/scheduler/transport.rs

//! Port to the remote scheduler.
//!
//! The proxy never talks to the scheduler directly; a concrete transport
//! (REST client, RPC stub, in-process fake in tests) is injected.

use tokio::sync::mpsc;

use crate::errors::Result;
use crate::scheduler::model::{JobSpec, JobState, SchedulerNotification, TaskResult};
use crate::types::{BoxFuture, JobId, SchedulerEvent};

/// Operations the proxy needs from the remote scheduler.
///
/// Failures must be reported with the categorized `ProxyError` variants
/// (`NotConnected`, `PermissionDenied`, `SubmissionClosed`, `JobCreation`,
/// `UnknownJob`, `UnknownTask`): submission errors are surfaced to callers
/// unchanged and reconciliation branches on them.
pub trait SchedulerTransport: Send + Sync {
    /// Submit a job and return the id the scheduler assigned to it.
    fn submit<'a>(&'a self, job: &'a JobSpec) -> BoxFuture<'a, Result<JobId>>;

    /// Query the live state of a job and its tasks.
    fn job_state<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<JobState>>;

    /// Fetch the result of a task, `None` while it has not terminated.
    fn task_result<'a>(
        &'a self,
        job_id: &'a str,
        task_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<TaskResult>>>;

    /// Storage areas private to the connected user.
    fn user_space_uris(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    /// Start receiving notifications for the given event kinds.
    ///
    /// Notifications are delivered on the returned channel; it closes when
    /// the subscription ends (disconnect, connection loss).
    fn subscribe<'a>(
        &'a self,
        events: &'a [SchedulerEvent],
    ) -> BoxFuture<'a, Result<mpsc::Receiver<SchedulerNotification>>>;

    /// Drop the connection and any subscription.
    fn disconnect(&self) -> BoxFuture<'_, Result<()>>;

    fn is_connected(&self) -> bool;
}

// src/proxy/listeners.rs

//! External listeners and the set the proxy fans events out to.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use crate::errors::ProxyError;
use crate::scheduler::{JobInfo, JobState, NotificationData, SchedulerNotification, TaskInfo};
use crate::types::SchedulerEvent;

/// Receives scheduler notifications (after the proxy's own bookkeeping) and
/// the outcome of automatic output transfers.
///
/// Every callback has a no-op default. Returning an error deregisters the
/// listener; other listeners and the proxy state are unaffected.
///
/// Callbacks run on the proxy's event task or on a transfer task and must
/// not block.
pub trait ProxyEventListener: Send + Sync {
    fn scheduler_state_updated(&self, _event: SchedulerEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn job_submitted(&self, _job: &JobState) -> anyhow::Result<()> {
        Ok(())
    }

    fn job_state_updated(&self, _notification: &NotificationData<JobInfo>) -> anyhow::Result<()> {
        Ok(())
    }

    fn job_updated_full_data(&self, _job: &JobState) -> anyhow::Result<()> {
        Ok(())
    }

    fn task_state_updated(&self, _notification: &NotificationData<TaskInfo>) -> anyhow::Result<()> {
        Ok(())
    }

    /// The outputs of a task were copied into `local_folder`.
    fn pull_data_finished(&self, _job_id: &str, _task_name: &str, _local_folder: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    /// The outputs of a task could not be copied from `remote_folder`. The
    /// task is no longer awaited.
    fn pull_data_failed(
        &self,
        _job_id: &str,
        _task_name: &str,
        _remote_folder: &str,
        _cause: &ProxyError,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Deduplicated set of listeners, safe to modify while events are delivered.
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn ProxyEventListener>>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the same listener is already registered.
    pub fn add(&self, listener: Arc<dyn ProxyEventListener>) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Returns `false` if the listener was not registered.
    pub fn remove(&self, listener: &Arc<dyn ProxyEventListener>) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Call `deliver` on a snapshot of the listeners, dropping those that fail.
    pub fn notify<F>(&self, what: &str, deliver: F)
    where
        F: Fn(&dyn ProxyEventListener) -> anyhow::Result<()>,
    {
        let snapshot: Vec<_> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for listener in snapshot {
            if let Err(e) = deliver(listener.as_ref()) {
                warn!(callback = what, error = %e, "listener failed; removing it");
                self.remove(&listener);
            }
        }
    }

    /// Forward a scheduler notification to the matching callback.
    pub fn notify_scheduler(&self, notification: &SchedulerNotification) {
        match notification {
            SchedulerNotification::SchedulerStateUpdated(event) => {
                self.notify("scheduler_state_updated", |l| l.scheduler_state_updated(*event))
            }
            SchedulerNotification::JobSubmitted(job) => {
                self.notify("job_submitted", |l| l.job_submitted(job))
            }
            SchedulerNotification::JobStateUpdated(data) => {
                self.notify("job_state_updated", |l| l.job_state_updated(data))
            }
            SchedulerNotification::JobUpdatedFullData(job) => {
                self.notify("job_updated_full_data", |l| l.job_updated_full_data(job))
            }
            SchedulerNotification::TaskStateUpdated(data) => {
                self.notify("task_state_updated", |l| l.task_state_updated(data))
            }
        }
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet").field("len", &self.len()).finish()
    }
}

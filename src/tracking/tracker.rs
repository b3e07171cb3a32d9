// src/tracking/tracker.rs

//! Session-level facade over the awaited job store.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::store::PersistentAwaitedJobStore;
use crate::tracking::records::AwaitedJob;
use crate::transfer::DataTransferAgent;
use crate::types::JobId;

/// What happened to the job when one of its tasks was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRemoval {
    /// The job or the task was not tracked.
    NotTracked,
    /// The task was removed; other tasks are still awaited (or the drained
    /// job is kept).
    TaskRemoved,
    /// The task was the last one and the whole job record was removed.
    JobRemoved,
}

/// Tracks the jobs of one session.
///
/// Plain store operations pass through; removing a job also removes the
/// remote folders created for it, which is why the tracker holds the
/// transfer agent.
pub struct JobTracker {
    store: PersistentAwaitedJobStore,
    agent: Arc<dyn DataTransferAgent>,
    remove_drained_jobs: bool,
}

impl JobTracker {
    pub fn new(
        store: PersistentAwaitedJobStore,
        agent: Arc<dyn DataTransferAgent>,
        remove_drained_jobs: bool,
    ) -> Self {
        Self {
            store,
            agent,
            remove_drained_jobs,
        }
    }

    pub fn store(&self) -> &PersistentAwaitedJobStore {
        &self.store
    }

    pub fn set_session_name(&self, name: &str) -> Result<()> {
        self.store.set_session_name(name)
    }

    pub fn session_name(&self) -> String {
        self.store.session_name()
    }

    pub fn load_jobs(&self) -> Result<()> {
        self.store.load()
    }

    pub fn close(&self) {
        self.store.close();
    }

    pub fn clean_database(&self) -> Result<()> {
        self.store.clean_database()
    }

    pub fn discard_all_jobs(&self) -> Result<()> {
        self.store.discard_all_jobs()
    }

    pub fn discard_job(&self, job_id: &str) -> Result<Option<AwaitedJob>> {
        self.store.discard_job(job_id)
    }

    pub fn awaited_job_ids(&self) -> Result<Vec<JobId>> {
        self.store.keys()
    }

    pub fn awaited_job(&self, job_id: &str) -> Result<Option<AwaitedJob>> {
        self.store.get(job_id)
    }

    pub fn is_awaited_job(&self, job_id: &str) -> Result<bool> {
        self.store.contains(job_id)
    }

    pub fn put_awaited_job(&self, job_id: &str, job: AwaitedJob) -> Result<()> {
        self.store.put(job_id, job)
    }

    /// Set or clear the transferring flag. Returns `false` if the task is
    /// not tracked.
    pub fn set_task_transferring(&self, job_id: &str, task_name: &str, transferring: bool) -> Result<bool> {
        let found = self.store.update(job_id, |job| match job.awaited_task_mut(task_name) {
            Some(task) => {
                task.transferring = transferring;
                true
            }
            None => false,
        })?;
        Ok(found.unwrap_or(false))
    }

    /// Record the runtime id of a task. Returns `false` if the task is not
    /// tracked.
    pub fn set_task_id(&self, job_id: &str, task_name: &str, task_id: &str) -> Result<bool> {
        let found = self.store.update(job_id, |job| match job.awaited_task_mut(task_name) {
            Some(task) => {
                task.task_id = Some(task_id.to_string());
                true
            }
            None => false,
        })?;
        Ok(found.unwrap_or(false))
    }

    /// Claim the download of a task; see
    /// [`PersistentAwaitedJobStore::begin_transfer`].
    pub fn begin_transfer(&self, job_id: &str, task_name: &str) -> Result<bool> {
        self.store.begin_transfer(job_id, task_name)
    }

    /// Stop tracking a job and delete its remote input/output folders.
    ///
    /// The record is removed first; a failing remote cleanup is logged and
    /// does not bring the record back.
    pub async fn remove_awaited_job(&self, job_id: &str) -> Result<Option<AwaitedJob>> {
        let Some(job) = self.untrack_job(job_id)? else {
            return Ok(None);
        };
        self.remove_remote_folders(&job).await;
        Ok(Some(job))
    }

    /// Remove the record of a job whose remote folders are about to be
    /// deleted with [`remove_remote_folders`](Self::remove_remote_folders).
    pub fn untrack_job(&self, job_id: &str) -> Result<Option<AwaitedJob>> {
        let removed = self.store.remove(job_id)?;
        if removed.is_some() {
            info!(job_id = %job_id, "removed awaited job");
        }
        Ok(removed)
    }

    /// Delete the remote folders of an untracked job. Failures are logged.
    pub async fn remove_remote_folders(&self, job: &AwaitedJob) {
        if let Err(e) = self.agent.remove_awaited_job_io(job).await {
            warn!(
                job_id = %job.job_id,
                push_url = ?job.push_url,
                pull_url = ?job.pull_url,
                error = %e,
                "could not remove remote folders of job"
            );
        }
    }

    /// Stop awaiting one task.
    ///
    /// When the job is left without awaited tasks it is removed as well if
    /// `remove_drained_jobs` is set, otherwise the empty record stays until
    /// it is discarded.
    pub async fn remove_awaited_task(&self, job_id: &str, task_name: &str) -> Result<TaskRemoval> {
        let outcome = self.store.update(job_id, |job| {
            job.remove_awaited_task(task_name)
                .map(|_| job.is_drained())
        })?;

        match outcome {
            None | Some(None) => Ok(TaskRemoval::NotTracked),
            Some(Some(drained)) => {
                debug!(job_id = %job_id, task = %task_name, "removed awaited task");
                if drained && self.remove_drained_jobs {
                    self.remove_awaited_job(job_id).await?;
                    return Ok(TaskRemoval::JobRemoved);
                }
                Ok(TaskRemoval::TaskRemoved)
            }
        }
    }
}

impl std::fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTracker")
            .field("store", &self.store)
            .field("remove_drained_jobs", &self.remove_drained_jobs)
            .finish_non_exhaustive()
    }
}

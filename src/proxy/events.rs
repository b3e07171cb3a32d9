// src/proxy/events.rs

//! Applying scheduler notifications to the tracked jobs.

use tracing::{debug, error, info, warn};

use crate::errors::{ProxyError, Result};
use crate::proxy::ProxyCore;
use crate::scheduler::{JobInfo, NotificationData, SchedulerNotification, TaskInfo};
use crate::tracking::AwaitedJob;
use crate::types::JobStatus;

impl ProxyCore {
    /// Update the tracked state for one notification, then forward it to the
    /// listeners.
    ///
    /// Bookkeeping errors are logged; listeners see the notification either
    /// way.
    pub async fn dispatch(&self, notification: SchedulerNotification) {
        let applied = match &notification {
            SchedulerNotification::JobStateUpdated(data) => self.update_job(data).await,
            SchedulerNotification::TaskStateUpdated(data) => self.update_task(data).await,
            SchedulerNotification::SchedulerStateUpdated(event) => {
                debug!(event = ?event, "scheduler state changed");
                Ok(())
            }
            SchedulerNotification::JobSubmitted(_) | SchedulerNotification::JobUpdatedFullData(_) => {
                Ok(())
            }
        };
        if let Err(e) = applied {
            error!(error = %e, "could not apply scheduler notification");
        }

        self.inner.listeners.notify_scheduler(&notification);
    }

    /// Job-level bookkeeping.
    ///
    /// A killed or canceled job is dropped at once; its remote folders are
    /// deleted on the transfer pool.
    /// Finished and failed jobs stay tracked; they go away as their tasks
    /// drain.
    pub async fn update_job(&self, notification: &NotificationData<JobInfo>) -> Result<()> {
        let info = &notification.data;
        if !self.inner.tracker.is_awaited_job(&info.job_id)? {
            return Ok(());
        }

        match info.status {
            JobStatus::Killed | JobStatus::Canceled => {
                info!(
                    job_id = %info.job_id,
                    status = %info.status,
                    "job will not complete; removing it from awaited jobs"
                );
                // The record goes now; the folders are deleted off the
                // event path.
                if let Some(job) = self.inner.tracker.untrack_job(&info.job_id)? {
                    let core = self.clone();
                    self.inner.pool.spawn(async move {
                        core.inner.tracker.remove_remote_folders(&job).await;
                    });
                }
            }
            status => {
                debug!(job_id = %info.job_id, status = %status, event = ?notification.event, "job updated");
            }
        }
        Ok(())
    }

    /// Task-level bookkeeping.
    ///
    /// Records the runtime id, drops tasks that never ran, and queues the
    /// output download of a terminated task when the job uses automatic
    /// transfer.
    pub async fn update_task(&self, notification: &NotificationData<TaskInfo>) -> Result<()> {
        let info = &notification.data;
        let Some(job) = self.inner.tracker.awaited_job(&info.job_id)? else {
            return Ok(());
        };
        let Some(task) = job.awaited_task(&info.task_name) else {
            return Ok(());
        };

        if task.task_id.as_deref() != Some(info.task_id.as_str()) {
            self.inner
                .tracker
                .set_task_id(&info.job_id, &info.task_name, &info.task_id)?;
        }

        if info.status.never_ran() {
            debug!(
                job_id = %info.job_id,
                task = %info.task_name,
                status = %info.status,
                "task did not run; nothing to fetch"
            );
            self.inner
                .tracker
                .remove_awaited_task(&info.job_id, &info.task_name)
                .await?;
            return Ok(());
        }

        if info.status.has_output() && job.automatic_transfer {
            self.start_transfer(&info.job_id, &info.task_name)?;
        }
        Ok(())
    }

    /// Claim the task and queue its download on the transfer pool.
    ///
    /// Does nothing when a download for the task is already in flight.
    fn start_transfer(&self, job_id: &str, task_name: &str) -> Result<()> {
        if !self.inner.tracker.begin_transfer(job_id, task_name)? {
            debug!(job_id = %job_id, task = %task_name, "output transfer already in progress");
            return Ok(());
        }
        // Re-read so the queued transfer sees the recorded task id.
        let Some(job) = self.inner.tracker.awaited_job(job_id)? else {
            return Ok(());
        };

        let core = self.clone();
        let task_name = task_name.to_string();
        self.inner.pool.spawn(async move {
            core.run_automatic_transfer(job, task_name).await;
        });
        Ok(())
    }

    async fn run_automatic_transfer(&self, job: AwaitedJob, task_name: String) {
        let job_id = job.job_id.clone();
        let remote = job.task_pull_url(&task_name).unwrap_or_default();

        let result = match job.local_output_folder.clone() {
            Some(folder) => self
                .inner
                .agent
                .download_task_output_files(&job, &job_id, &task_name, &folder)
                .await
                .map(|()| folder),
            None => Err(ProxyError::NoOutputFolder(job_id.clone())),
        };

        // No retry: the task is dropped whatever the outcome.
        if let Err(e) = self.inner.tracker.remove_awaited_task(&job_id, &task_name).await {
            warn!(job_id = %job_id, task = %task_name, error = %e, "could not remove awaited task");
        }

        match result {
            Ok(folder) => {
                info!(job_id = %job_id, task = %task_name, folder = ?folder, "output data transferred");
                self.inner
                    .listeners
                    .notify("pull_data_finished", |l| l.pull_data_finished(&job_id, &task_name, &folder));
            }
            Err(e) => {
                error!(
                    job_id = %job_id,
                    task = %task_name,
                    remote = %remote,
                    error = %e,
                    "error while transferring output data"
                );
                self.inner
                    .listeners
                    .notify("pull_data_failed", |l| l.pull_data_failed(&job_id, &task_name, &remote, &e));
            }
        }
    }
}

// src/proxy/sync.rs

//! Reconciliation of tracked jobs with the scheduler after (re)connecting.

use tracing::{debug, error, info, warn};

use crate::errors::{ProxyError, Result};
use crate::proxy::ProxyCore;
use crate::scheduler::{JobState, NotificationData, SchedulerNotification};
use crate::types::SchedulerEvent;

impl ProxyCore {
    /// Bring every tracked job up to date with the scheduler.
    ///
    /// Tasks that terminated while no events were received are replayed as
    /// task-finished notifications, so their outputs follow the same path as
    /// live events. Per-job failures are handled as follows:
    /// - connection lost: the job stays tracked for the next pass;
    /// - permission denied: the job stays tracked (another identity may see it);
    /// - unknown job: the record is discarded, remote data is left in place.
    pub async fn sync_awaited_jobs(&self) -> Result<()> {
        let job_ids = self.inner.tracker.awaited_job_ids()?;
        info!(jobs = job_ids.len(), "synchronizing awaited jobs");
        for job_id in &job_ids {
            self.sync_awaited_job(job_id).await;
        }
        Ok(())
    }

    /// Reconcile a single tracked job. Errors are logged, never returned.
    pub async fn sync_awaited_job(&self, job_id: &str) {
        let state = match self.inner.transport.job_state(job_id).await {
            Ok(state) => state,
            Err(e) => {
                self.handle_sync_failure(job_id, e);
                return;
            }
        };
        if let Err(e) = self.replay_job_state(job_id, &state).await {
            error!(job_id = %job_id, error = %e, "could not synchronize job");
        }
    }

    async fn replay_job_state(&self, job_id: &str, state: &JobState) -> Result<()> {
        let Some(job) = self.inner.tracker.awaited_job(job_id)? else {
            return Ok(());
        };

        for task_state in &state.tasks {
            let name = task_state.name();
            match job.awaited_task(name) {
                Some(task) if !task.transferring => {}
                _ => continue,
            }

            match self.inner.transport.task_result(job_id, name).await {
                Ok(Some(_)) => {
                    debug!(job_id = %job_id, task = %name, "synchronizing task");
                    let notification = NotificationData::new(
                        SchedulerEvent::TaskRunningToFinished,
                        task_state.info.clone(),
                    );
                    self.dispatch(SchedulerNotification::TaskStateUpdated(notification))
                        .await;
                }
                Ok(None) => {}
                Err(e) if e.is_unknown() => {
                    error!(
                        job_id = %job_id,
                        task = %name,
                        error = %e,
                        "could not retrieve output data; the scheduler does not know this task"
                    );
                }
                Err(e) => {
                    error!(job_id = %job_id, task = %name, error = %e, "error while getting task result");
                }
            }
        }

        if state.is_finished() {
            let notification =
                NotificationData::new(SchedulerEvent::JobRunningToFinished, state.info.clone());
            self.dispatch(SchedulerNotification::JobStateUpdated(notification))
                .await;
        }
        Ok(())
    }

    fn handle_sync_failure(&self, job_id: &str, e: ProxyError) {
        if e.is_connection_lost() {
            error!(
                job_id = %job_id,
                error = %e,
                "connection error while synchronizing job; it stays awaited and will be retried on the next initialization"
            );
        } else if e.is_permission_denied() {
            error!(
                job_id = %job_id,
                error = %e,
                "no permission to access job; reconnect with the credentials used to submit it"
            );
        } else if e.is_unknown() {
            let pull_url = self
                .inner
                .tracker
                .awaited_job(job_id)
                .ok()
                .flatten()
                .and_then(|job| job.pull_url);
            error!(job_id = %job_id, error = %e, "job is not known by the scheduler");
            warn!(
                job_id = %job_id,
                pull_url = ?pull_url,
                "removing job from awaited jobs; its output data may be copied manually from the pull URL"
            );
            if let Err(e) = self.inner.tracker.discard_job(job_id) {
                error!(job_id = %job_id, error = %e, "could not discard unknown job");
            }
        } else {
            error!(job_id = %job_id, error = %e, "unexpected error while synchronizing job");
        }
    }
}

// src/proxy/pull.rs

use std::path::Path;

use tracing::{info, warn};

use crate::errors::{ProxyError, Result};
use crate::proxy::ProxyCore;

impl ProxyCore {
    /// Copy the outputs of one task of a job submitted without automatic
    /// transfer.
    ///
    /// `local_folder` defaults to the output folder given at submission.
    /// The download runs to completion before returning; the task stops
    /// being awaited afterwards, whether it succeeded or not. Calling this
    /// while the same task is being downloaded does nothing.
    pub async fn pull_data(&self, job_id: &str, task_name: &str, local_folder: Option<&Path>) -> Result<()> {
        self.check_initialized()?;

        let job = self
            .inner
            .tracker
            .awaited_job(job_id)?
            .ok_or_else(|| ProxyError::JobNotTracked(job_id.to_string()))?;
        if job.automatic_transfer {
            return Err(ProxyError::AutomaticTransferEnabled(job_id.to_string()));
        }
        let folder = local_folder
            .map(Path::to_path_buf)
            .or_else(|| job.local_output_folder.clone())
            .ok_or_else(|| ProxyError::NoOutputFolder(job_id.to_string()))?;
        if job.awaited_task(task_name).is_none() {
            return Err(ProxyError::UnknownTask {
                job_id: job_id.to_string(),
                task: task_name.to_string(),
            });
        }

        if !self.inner.tracker.begin_transfer(job_id, task_name)? {
            warn!(job_id = %job_id, task = %task_name, "task is already transferring its output");
            return Ok(());
        }

        let result = self
            .inner
            .agent
            .download_task_output_files(&job, job_id, task_name, &folder)
            .await;

        if let Err(e) = self.inner.tracker.remove_awaited_task(job_id, task_name).await {
            warn!(job_id = %job_id, task = %task_name, error = %e, "could not remove awaited task");
        }

        result?;
        info!(job_id = %job_id, task = %task_name, folder = ?folder, "output data pulled");
        Ok(())
    }
}

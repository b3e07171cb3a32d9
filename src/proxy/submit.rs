// src/proxy/submit.rs

//! Job submission with input/output staging.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::errors::Result;
use crate::proxy::ProxyCore;
use crate::scheduler::model::{
    GENERIC_INFO_INPUT_FOLDER, GENERIC_INFO_OUTPUT_FOLDER, GENERIC_INFO_PULL_URL,
    GENERIC_INFO_PUSH_URL,
};
use crate::scheduler::JobSpec;
use crate::tracking::{AwaitedJob, AwaitedTask, TASKID_PLACEHOLDER};
use crate::types::JobId;

/// Where a submitted job reads its inputs from and writes its outputs to,
/// and how its outputs come back.
///
/// Unset push/pull URLs default to the user's `file:` space on the
/// scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingOptions {
    pub local_input_folder: Option<PathBuf>,
    pub push_url: Option<String>,
    pub local_output_folder: Option<PathBuf>,
    pub pull_url: Option<String>,
    /// Give every task its own output subfolder (`.../output/[TASKID]`).
    pub isolate_task_outputs: bool,
    /// Download each task's outputs as soon as it finishes.
    pub automatic_transfer: bool,
}

impl StagingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.local_input_folder = Some(folder.into());
        self
    }

    pub fn push_url(mut self, url: impl Into<String>) -> Self {
        self.push_url = Some(url.into());
        self
    }

    pub fn output_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.local_output_folder = Some(folder.into());
        self
    }

    pub fn pull_url(mut self, url: impl Into<String>) -> Self {
        self.pull_url = Some(url.into());
        self
    }

    pub fn isolate_task_outputs(mut self, isolate: bool) -> Self {
        self.isolate_task_outputs = isolate;
        self
    }

    pub fn automatic_transfer(mut self, automatic: bool) -> Self {
        self.automatic_transfer = automatic;
        self
    }
}

/// Last millisecond handed out for a folder name in this process.
static LAST_FOLDER_MILLIS: AtomicI64 = AtomicI64::new(0);

fn next_folder_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_FOLDER_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(previous + 1)
}

/// Unique name for the remote folders of one submission:
/// `<user>_<yyyy-MM-dd_HH.mm.ss.SSS>`, escaped for use in a URL.
///
/// Timestamps are strictly increasing within the process, so two
/// submissions never share a folder.
pub fn new_folder_name(user: &str) -> String {
    let millis = next_folder_millis();
    let stamp = DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d_%H.%M.%S%.3f").to_string())
        .unwrap_or_else(|| millis.to_string());
    urlencoding::encode(&format!("{user}_{stamp}")).into_owned()
}

fn join_url(base: &str, segment: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), segment)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

/// Push and pull URLs actually created for a submission.
#[derive(Debug, Default)]
struct StagedFolders {
    push_url: Option<String>,
    pull_url: Option<String>,
}

impl ProxyCore {
    /// Submit `job`, staging data through the user's default space.
    pub async fn submit(
        &self,
        job: JobSpec,
        local_input_folder: Option<&Path>,
        local_output_folder: Option<&Path>,
        isolate_task_outputs: bool,
        automatic_transfer: bool,
    ) -> Result<JobId> {
        let options = StagingOptions {
            local_input_folder: local_input_folder.map(Path::to_path_buf),
            local_output_folder: local_output_folder.map(Path::to_path_buf),
            isolate_task_outputs,
            automatic_transfer,
            ..StagingOptions::default()
        };
        self.submit_with(job, options).await
    }

    /// Submit `job` with explicit staging options.
    ///
    /// Remote folders are created and inputs uploaded before the job is
    /// sent. If the upload or the submission fails, the folders are removed
    /// and the original error is returned; nothing is tracked. On success
    /// the job and all its tasks are recorded before the id is returned.
    pub async fn submit_with(&self, mut job: JobSpec, options: StagingOptions) -> Result<JobId> {
        self.check_initialized()?;

        let options = StagingOptions {
            local_input_folder: options.local_input_folder.as_deref().map(absolute).transpose()?,
            local_output_folder: options.local_output_folder.as_deref().map(absolute).transpose()?,
            ..options
        };
        let (push_base, pull_base) = self.resolve_space_urls(&options).await?;
        let folder_name = new_folder_name(&self.inner.config.effective_user());
        debug!(job = %job.name, folder = %folder_name, "staging job data");

        let staged = self
            .stage(&mut job, &options, push_base.as_deref(), pull_base.as_deref(), &folder_name)
            .await;
        let submitted = match staged {
            Ok(staged) => self
                .inner
                .transport
                .submit(&job)
                .await
                .map(|job_id| (job_id, staged)),
            Err(e) => Err(e),
        };

        let (job_id, staged) = match submitted {
            Ok(ok) => ok,
            Err(e) => {
                error!(job = %job.name, error = %e, "error while submitting job");
                self.rollback(&job, push_base.as_deref(), pull_base.as_deref(), &folder_name)
                    .await;
                return Err(e);
            }
        };

        let awaited = awaited_job_for(&job_id, &job, &options, staged);
        self.inner.tracker.put_awaited_job(&job_id, awaited)?;
        info!(
            job_id = %job_id,
            job = %job.name,
            tasks = job.tasks.len(),
            automatic_transfer = options.automatic_transfer,
            "job submitted"
        );
        Ok(job_id)
    }

    /// Fill in missing push/pull URLs from the user's `file:` space. The
    /// scheduler is only asked when a side actually needs staging.
    async fn resolve_space_urls(&self, options: &StagingOptions) -> Result<(Option<String>, Option<String>)> {
        let mut push = non_empty(options.push_url.as_deref()).map(str::to_string);
        let mut pull = non_empty(options.pull_url.as_deref()).map(str::to_string);

        let need_push = push.is_none() && options.local_input_folder.is_some();
        let need_pull = pull.is_none() && options.local_output_folder.is_some();
        if need_push || need_pull {
            let user_space = self
                .inner
                .transport
                .user_space_uris()
                .await?
                .into_iter()
                .find(|uri| uri.starts_with("file:"));
            debug!(user_space = ?user_space, "resolved default user space");
            if need_push {
                push = user_space.clone();
            }
            if need_pull {
                pull = user_space;
            }
        }
        Ok((push, pull))
    }

    async fn stage(
        &self,
        job: &mut JobSpec,
        options: &StagingOptions,
        push_base: Option<&str>,
        pull_base: Option<&str>,
        folder_name: &str,
    ) -> Result<StagedFolders> {
        let mut staged = StagedFolders::default();

        // Inputs: push_base/<folder>/input, seen by the tasks as
        // input_space/<folder>/input.
        if let (Some(local), Some(space), Some(base)) = (
            options.local_input_folder.as_deref(),
            non_empty(job.input_space.as_deref()).map(str::to_string),
            push_base,
        ) {
            let relative = format!("{folder_name}/input");
            let push_url = join_url(base, &relative);
            self.inner.agent.create_folder(&push_url).await?;

            job.input_space = Some(join_url(&space, &relative));
            job.add_generic_info(GENERIC_INFO_INPUT_FOLDER, local.to_string_lossy());
            job.add_generic_info(GENERIC_INFO_PUSH_URL, push_url.clone());
            debug!(job = %job.name, push_url = %push_url, "input folder staged");
            staged.push_url = Some(push_url);
        }

        // Outputs: pull_base/<folder>/output, with a [TASKID] segment the
        // execution side resolves per task when outputs are isolated.
        if let (Some(local), Some(space), Some(base)) = (
            options.local_output_folder.as_deref(),
            non_empty(job.output_space.as_deref()).map(str::to_string),
            pull_base,
        ) {
            let output_root = join_url(base, &format!("{folder_name}/output"));
            self.inner.agent.create_folder(&output_root).await?;

            let relative = if options.isolate_task_outputs {
                format!("{folder_name}/output/{TASKID_PLACEHOLDER}")
            } else {
                format!("{folder_name}/output")
            };
            let pull_url = join_url(base, &relative);

            job.output_space = Some(join_url(&space, &relative));
            job.add_generic_info(GENERIC_INFO_OUTPUT_FOLDER, local.to_string_lossy());
            job.add_generic_info(GENERIC_INFO_PULL_URL, pull_url.clone());
            debug!(job = %job.name, pull_url = %pull_url, "output folder staged");
            staged.pull_url = Some(pull_url);
        }

        if let Some(local) = options.local_input_folder.as_deref() {
            let uploaded = self.inner.agent.upload_input_files(job, local).await?;
            debug!(job = %job.name, uploaded, "input upload done");
        }

        Ok(staged)
    }

    async fn rollback(
        &self,
        job: &JobSpec,
        push_base: Option<&str>,
        pull_base: Option<&str>,
        folder_name: &str,
    ) {
        if let Err(e) = self
            .inner
            .agent
            .remove_job_io(job, push_base, pull_base, folder_name)
            .await
        {
            error!(job = %job.name, error = %e, "error while removing job IO");
        }
    }
}

fn awaited_job_for(
    job_id: &str,
    job: &JobSpec,
    options: &StagingOptions,
    staged: StagedFolders,
) -> AwaitedJob {
    let awaited_tasks: BTreeMap<_, _> = job
        .tasks
        .iter()
        .map(|t| (t.name.clone(), AwaitedTask::new(t.name.clone(), t.output_files.clone())))
        .collect();

    AwaitedJob {
        job_id: job_id.to_string(),
        local_input_folder: options.local_input_folder.clone(),
        input_space_url: job.input_space.clone(),
        push_url: staged.push_url,
        local_output_folder: options.local_output_folder.clone(),
        output_space_url: job.output_space.clone(),
        pull_url: staged.pull_url,
        isolate_task_outputs: options.isolate_task_outputs,
        automatic_transfer: options.automatic_transfer,
        awaited_tasks,
    }
}

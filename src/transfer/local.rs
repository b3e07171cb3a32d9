// src/transfer/local.rs

//! `DataTransferAgent` for data spaces reachable as `file:` URLs
//! (shared or locally mounted storage).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use tracing::{debug, error, info};
use url::Url;

use crate::errors::{ProxyError, Result};
use crate::scheduler::model::GENERIC_INFO_PUSH_URL;
use crate::scheduler::JobSpec;
use crate::tracking::{AwaitedJob, TASKID_PLACEHOLDER};
use crate::transfer::agent::DataTransferAgent;
use crate::transfer::selector::FileSelector;
use crate::types::BoxFuture;

/// Copies files between local folders and `file:` data spaces.
///
/// All filesystem work runs on Tokio's blocking pool.
#[derive(Debug, Clone, Default)]
pub struct LocalSpaceAgent;

impl LocalSpaceAgent {
    pub fn new() -> Self {
        Self
    }
}

/// Resolve a `file:` URL to a local path.
pub fn url_to_path(url: &str) -> Result<PathBuf> {
    let parsed = Url::parse(url).map_err(|e| ProxyError::Url(format!("{url}: {e}")))?;
    if parsed.scheme() != "file" {
        return Err(ProxyError::Url(format!(
            "{url}: only file: URLs are supported by the local agent"
        )));
    }
    parsed
        .to_file_path()
        .map_err(|_| ProxyError::Url(format!("{url}: not a valid local path")))
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ProxyError::Other(anyhow!("blocking transfer task failed: {e}")))?
}

/// Copy the files of `src_root` selected by `selector` into `dest_root`,
/// keeping their relative layout.
fn copy_selected(src_root: &Path, selector: &FileSelector, dest_root: &Path) -> anyhow::Result<usize> {
    let files = selector.collect(src_root)?;
    for (src, rel) in &files {
        let dest = dest_root.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
        }
        fs::copy(src, &dest).with_context(|| format!("copying {:?} to {:?}", src, dest))?;
        debug!(from = ?src, to = ?dest, "copied file");
    }
    Ok(files.len())
}

fn remove_folder(path: &Path) -> std::io::Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(path)?;
    Ok(true)
}

/// Output root of a pull URL, without the `[TASKID]` placeholder segment.
fn pull_root(pull_url: &str) -> &str {
    pull_url
        .strip_suffix(TASKID_PLACEHOLDER)
        .map(|s| s.trim_end_matches('/'))
        .unwrap_or(pull_url)
}

impl DataTransferAgent for LocalSpaceAgent {
    fn create_folder<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let path = url_to_path(url)?;
            blocking(move || {
                fs::create_dir_all(&path)?;
                Ok(())
            })
            .await?;
            debug!(url = %url, "created remote folder");
            Ok(())
        })
    }

    fn upload_input_files<'a>(
        &'a self,
        job: &'a JobSpec,
        local_folder: &'a Path,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let Some(push_url) = job.generic_info(GENERIC_INFO_PUSH_URL).filter(|u| !u.trim().is_empty())
            else {
                return Ok(false);
            };
            let dest = url_to_path(push_url)?;
            let src = local_folder.to_path_buf();

            let mut selectors = Vec::with_capacity(job.tasks.len());
            for task in &job.tasks {
                let selector = FileSelector::from_patterns(&task.input_files)
                    .with_context(|| format!("input patterns of task {}", task.name))?;
                selectors.push((task.name.clone(), selector));
            }

            let job_name = job.name.clone();
            let pushed = blocking(move || {
                let mut total = 0usize;
                for (task, selector) in &selectors {
                    debug!(job = %job_name, task = %task, "pushing input files");
                    total += copy_selected(&src, selector, &dest).map_err(|e| {
                        ProxyError::Transfer(format!(
                            "input files of task {task} for job {job_name} could not be transferred: {e:#}"
                        ))
                    })?;
                }
                Ok(total)
            })
            .await?;

            info!(job = %job.name, files = pushed, to = %push_url, "input files pushed");
            Ok(true)
        })
    }

    fn download_task_output_files<'a>(
        &'a self,
        job: &'a AwaitedJob,
        job_id: &'a str,
        task_name: &'a str,
        local_folder: &'a Path,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let task = job.awaited_task(task_name).ok_or_else(|| ProxyError::UnknownTask {
                job_id: job_id.to_string(),
                task: task_name.to_string(),
            })?;
            let source_url = job.task_pull_url(task_name).ok_or_else(|| {
                ProxyError::Transfer(format!("job {job_id} does not define a pull URL"))
            })?;
            let src = url_to_path(&source_url)?;
            let selector = FileSelector::from_patterns(&task.output_file_patterns)
                .with_context(|| format!("output patterns of task {task_name}"))?;
            let dest = local_folder.to_path_buf();

            let copied = blocking(move || {
                if !src.is_dir() {
                    return Err(ProxyError::Transfer(format!(
                        "remote output folder {:?} does not exist",
                        src
                    )));
                }
                copy_selected(&src, &selector, &dest)
                    .map_err(|e| ProxyError::Transfer(format!("{e:#}")))
            })
            .await?;

            info!(
                job_id = %job_id,
                task = %task_name,
                files = copied,
                from = %source_url,
                to = ?local_folder,
                "output files pulled"
            );
            Ok(())
        })
    }

    fn remove_job_io<'a>(
        &'a self,
        job: &'a JobSpec,
        push_url: Option<&'a str>,
        pull_url: Option<&'a str>,
        folder_name: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for (kind, base) in [("push", push_url), ("pull", pull_url)] {
                let Some(base) = base else { continue };
                let url = format!("{}/{}", base.trim_end_matches('/'), folder_name);
                let result = match url_to_path(&url) {
                    Ok(path) => blocking(move || Ok(remove_folder(&path)?)).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(removed) => debug!(job = %job.name, kind, url = %url, removed, "removed job folder"),
                    Err(e) => error!(job = %job.name, kind, url = %url, error = %e, "error while removing job IO"),
                }
            }
            Ok(())
        })
    }

    fn remove_awaited_job_io<'a>(&'a self, job: &'a AwaitedJob) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let folders = [job.push_url.as_deref(), job.pull_url.as_deref().map(pull_root)];
            for url in folders.into_iter().flatten().filter(|u| !u.is_empty()) {
                let path = url_to_path(url)?;
                blocking(move || {
                    remove_folder(&path)?;
                    // Drop the per-submission parent folder once both sides are gone.
                    if let Some(parent) = path.parent() {
                        let _ = fs::remove_dir(parent);
                    }
                    Ok(())
                })
                .await?;
                debug!(job_id = %job.job_id, url = %url, "removed awaited job folder");
            }
            Ok(())
        })
    }
}

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use smartproxy::errors::{ProxyError, Result};
use smartproxy::scheduler::JobSpec;
use smartproxy::tracking::AwaitedJob;
use smartproxy::transfer::DataTransferAgent;
use smartproxy::types::BoxFuture;

/// One `download_task_output_files` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCall {
    pub job_id: String,
    pub task_name: String,
    pub local_folder: PathBuf,
    pub remote_folder: Option<String>,
}

/// One `remove_job_io` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveJobIoCall {
    pub job_name: String,
    pub push_url: Option<String>,
    pub pull_url: Option<String>,
    pub folder_name: String,
}

#[derive(Debug, Default)]
struct Calls {
    created_folders: Vec<String>,
    uploads: Vec<(String, PathBuf)>,
    downloads: Vec<DownloadCall>,
    removed_job_io: Vec<RemoveJobIoCall>,
    removed_awaited_jobs: Vec<String>,
}

/// `DataTransferAgent` that moves no data and records every call.
///
/// Downloads are recorded when they start, so a delayed download is
/// already counted while it is still running.
#[derive(Clone, Default)]
pub struct CountingTransferAgent {
    calls: Arc<Mutex<Calls>>,
    fail_uploads: Arc<AtomicBool>,
    fail_downloads: Arc<AtomicBool>,
    download_delay: Arc<Mutex<Option<Duration>>>,
    cleanup_delay: Arc<Mutex<Option<Duration>>>,
}

impl CountingTransferAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    pub fn set_download_delay(&self, delay: Duration) {
        *self.download_delay.lock().unwrap() = Some(delay);
    }

    /// Delay applied by `remove_awaited_job_io` after recording the call.
    pub fn set_cleanup_delay(&self, delay: Duration) {
        *self.cleanup_delay.lock().unwrap() = Some(delay);
    }

    pub fn created_folders(&self) -> Vec<String> {
        self.calls.lock().unwrap().created_folders.clone()
    }

    pub fn uploads(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().uploads.clone()
    }

    pub fn downloads(&self) -> Vec<DownloadCall> {
        self.calls.lock().unwrap().downloads.clone()
    }

    pub fn download_count(&self) -> usize {
        self.calls.lock().unwrap().downloads.len()
    }

    pub fn removed_job_io(&self) -> Vec<RemoveJobIoCall> {
        self.calls.lock().unwrap().removed_job_io.clone()
    }

    pub fn removed_awaited_jobs(&self) -> Vec<String> {
        self.calls.lock().unwrap().removed_awaited_jobs.clone()
    }
}

impl DataTransferAgent for CountingTransferAgent {
    fn create_folder<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.calls.lock().unwrap().created_folders.push(url.to_string());
            Ok(())
        })
    }

    fn upload_input_files<'a>(
        &'a self,
        job: &'a JobSpec,
        local_folder: &'a Path,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .uploads
                .push((job.name.clone(), local_folder.to_path_buf()));
            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(ProxyError::Transfer(format!("upload of {} failed", job.name)));
            }
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
            self.calls.lock().unwrap().downloads.push(DownloadCall {
                job_id: job_id.to_string(),
                task_name: task_name.to_string(),
                local_folder: local_folder.to_path_buf(),
                remote_folder: job.task_pull_url(task_name),
            });

            let delay = *self.download_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_downloads.load(Ordering::SeqCst) {
                return Err(ProxyError::Transfer(format!(
                    "download of {task_name} in job {job_id} failed"
                )));
            }
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
            self.calls.lock().unwrap().removed_job_io.push(RemoveJobIoCall {
                job_name: job.name.clone(),
                push_url: push_url.map(str::to_string),
                pull_url: pull_url.map(str::to_string),
                folder_name: folder_name.to_string(),
            });
            Ok(())
        })
    }

    fn remove_awaited_job_io<'a>(&'a self, job: &'a AwaitedJob) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .removed_awaited_jobs
                .push(job.job_id.clone());

            let delay = *self.cleanup_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        })
    }
}

// src/transfer/agent.rs

//! Port to the storage / data-transfer layer.

use std::path::Path;

use crate::errors::Result;
use crate::scheduler::JobSpec;
use crate::tracking::AwaitedJob;
use crate::types::BoxFuture;

/// Operations the proxy needs on the shared storage behind the data spaces.
///
/// Production code uses a backend for the actual remote storage (see
/// [`LocalSpaceAgent`](super::LocalSpaceAgent) for `file:` spaces); tests
/// provide fakes that record calls.
pub trait DataTransferAgent: Send + Sync {
    /// Create a remote folder (and missing parents).
    fn create_folder<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Upload the input files of every task from `local_folder` into the
    /// folder recorded under the job's `push_url` generic info.
    ///
    /// Returns `false` when the job has nothing to push.
    fn upload_input_files<'a>(
        &'a self,
        job: &'a JobSpec,
        local_folder: &'a Path,
    ) -> BoxFuture<'a, Result<bool>>;

    /// Copy the output files of one task into `local_folder`.
    fn download_task_output_files<'a>(
        &'a self,
        job: &'a AwaitedJob,
        job_id: &'a str,
        task_name: &'a str,
        local_folder: &'a Path,
    ) -> BoxFuture<'a, Result<()>>;

    /// Delete `<push_url>/<folder_name>` and `<pull_url>/<folder_name>`,
    /// undoing the staging of a job whose submission failed.
    fn remove_job_io<'a>(
        &'a self,
        job: &'a JobSpec,
        push_url: Option<&'a str>,
        pull_url: Option<&'a str>,
        folder_name: &'a str,
    ) -> BoxFuture<'a, Result<()>>;

    /// Delete the remote input and output folders recorded for a tracked job.
    fn remove_awaited_job_io<'a>(&'a self, job: &'a AwaitedJob) -> BoxFuture<'a, Result<()>>;
}

// src/scheduler/model.rs

//! Data exchanged with the remote scheduler.
//!
//! Only the parts the proxy needs are modelled: the job description it
//! submits, the live state it queries during reconciliation, and the
//! notifications it receives.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{JobId, JobStatus, SchedulerEvent, TaskName, TaskStatus};

/// Generic info key recording the absolute local input folder.
pub const GENERIC_INFO_INPUT_FOLDER: &str = "client_input_data_folder";
/// Generic info key recording the absolute local output folder.
pub const GENERIC_INFO_OUTPUT_FOLDER: &str = "client_output_data_folder";
/// Generic info key recording the resolved remote input folder.
pub const GENERIC_INFO_PUSH_URL: &str = "push_url";
/// Generic info key recording the resolved remote output folder.
pub const GENERIC_INFO_PULL_URL: &str = "pull_url";

/// A job as described by the client before submission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    /// Dataspace URL the tasks read their inputs from.
    pub input_space: Option<String>,
    /// Dataspace URL the tasks write their outputs to.
    pub output_space: Option<String>,
    pub generic_info: BTreeMap<String, String>,
    pub tasks: Vec<TaskSpec>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_generic_info(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.generic_info.insert(key.into(), value.into());
    }

    pub fn generic_info(&self, key: &str) -> Option<&str> {
        self.generic_info.get(key).map(String::as_str)
    }
}

/// One task of a [`JobSpec`].
///
/// File patterns are globs relative to the input/output space; a leading
/// `!` turns a pattern into an exclusion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: TaskName,
    pub input_files: Vec<String>,
    pub output_files: Vec<String>,
}

impl TaskSpec {
    pub fn new(name: impl Into<TaskName>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Job-level notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// Task-level notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub job_id: JobId,
    /// Runtime id assigned by the scheduler (used for isolated outputs).
    pub task_id: String,
    pub task_name: TaskName,
    pub status: TaskStatus,
}

/// Live state of one task, as returned by a job state query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub info: TaskInfo,
}

impl TaskState {
    pub fn name(&self) -> &str {
        &self.info.task_name
    }
}

/// Live state of a job, as returned by a job state query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub info: JobInfo,
    pub tasks: Vec<TaskState>,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        self.info.status.is_terminal()
    }
}

/// Result of a terminated task. The proxy only needs to know one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_name: TaskName,
    pub had_exception: bool,
}

/// An event kind plus its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationData<T> {
    pub event: SchedulerEvent,
    pub data: T,
}

impl<T> NotificationData<T> {
    pub fn new(event: SchedulerEvent, data: T) -> Self {
        Self { event, data }
    }
}

/// Everything the scheduler pushes to a subscribed proxy.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerNotification {
    /// Scheduler-wide transition (shutdown, stopped, resumed, ...).
    SchedulerStateUpdated(SchedulerEvent),
    JobSubmitted(JobState),
    JobStateUpdated(NotificationData<JobInfo>),
    JobUpdatedFullData(JobState),
    TaskStateUpdated(NotificationData<TaskInfo>),
}

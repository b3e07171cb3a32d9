// src/tracking/records.rs

//! Bookkeeping records for submitted jobs whose outputs are still awaited.
//!
//! These are the values the persistent store keeps per job id; their serde
//! shape is the on-disk contract.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{JobId, TaskName};

/// Placeholder segment in an isolated pull URL, replaced per task by the
/// task's runtime id.
pub const TASKID_PLACEHOLDER: &str = "[TASKID]";

/// One task whose output has not been fetched yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitedTask {
    pub name: TaskName,
    pub output_file_patterns: Vec<String>,
    /// Runtime id, known once the scheduler reported on the task.
    #[serde(default)]
    pub task_id: Option<String>,
    /// Set while a download is in flight; no second download may start.
    #[serde(default)]
    pub transferring: bool,
}

impl AwaitedTask {
    pub fn new(name: impl Into<TaskName>, output_file_patterns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            output_file_patterns,
            task_id: None,
            transferring: false,
        }
    }
}

/// A submitted job and the tasks whose outputs are still awaited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitedJob {
    pub job_id: JobId,
    pub local_input_folder: Option<PathBuf>,
    pub input_space_url: Option<String>,
    pub push_url: Option<String>,
    pub local_output_folder: Option<PathBuf>,
    pub output_space_url: Option<String>,
    pub pull_url: Option<String>,
    pub isolate_task_outputs: bool,
    pub automatic_transfer: bool,
    pub awaited_tasks: BTreeMap<TaskName, AwaitedTask>,
}

impl AwaitedJob {
    pub fn awaited_task(&self, name: &str) -> Option<&AwaitedTask> {
        self.awaited_tasks.get(name)
    }

    pub fn awaited_task_mut(&mut self, name: &str) -> Option<&mut AwaitedTask> {
        self.awaited_tasks.get_mut(name)
    }

    pub fn remove_awaited_task(&mut self, name: &str) -> Option<AwaitedTask> {
        self.awaited_tasks.remove(name)
    }

    /// Clear the transferring flag of every task. Returns how many were set.
    pub fn clear_transferring(&mut self) -> usize {
        let mut cleared = 0;
        for task in self.awaited_tasks.values_mut().filter(|t| t.transferring) {
            task.transferring = false;
            cleared += 1;
        }
        cleared
    }

    /// No task of this job is awaited any more.
    pub fn is_drained(&self) -> bool {
        self.awaited_tasks.is_empty()
    }

    /// Remote folder holding the outputs of one task.
    ///
    /// With isolated outputs the `[TASKID]` placeholder is resolved with the
    /// task's runtime id, when known.
    pub fn task_pull_url(&self, task_name: &str) -> Option<String> {
        let pull_url = self.pull_url.as_deref()?;
        if !self.isolate_task_outputs {
            return Some(pull_url.to_string());
        }
        match self.awaited_task(task_name).and_then(|t| t.task_id.as_deref()) {
            Some(task_id) => Some(pull_url.replace(TASKID_PLACEHOLDER, task_id)),
            None => Some(pull_url.to_string()),
        }
    }
}

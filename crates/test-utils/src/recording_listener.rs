use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::bail;
use smartproxy::errors::ProxyError;
use smartproxy::proxy::ProxyEventListener;
use smartproxy::scheduler::{JobInfo, JobState, NotificationData, TaskInfo};
use smartproxy::types::{JobStatus, SchedulerEvent, TaskStatus};

/// What a [`RecordingListener`] saw, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    SchedulerState(SchedulerEvent),
    JobSubmitted(String),
    JobState { job_id: String, status: JobStatus },
    JobFullData(String),
    TaskState { job_id: String, task_name: String, status: TaskStatus },
    PullFinished { job_id: String, task_name: String, local_folder: PathBuf },
    PullFailed { job_id: String, task_name: String, remote_folder: String, cause: String },
}

/// Listener recording every callback. A failing one returns an error from
/// each callback after recording it.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
    failing: bool,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn pulls_finished(&self) -> Vec<ListenerEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, ListenerEvent::PullFinished { .. }))
            .collect()
    }

    pub fn pulls_failed(&self) -> Vec<ListenerEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, ListenerEvent::PullFailed { .. }))
            .collect()
    }

    fn record(&self, event: ListenerEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event);
        if self.failing {
            bail!("listener configured to fail");
        }
        Ok(())
    }
}

impl ProxyEventListener for RecordingListener {
    fn scheduler_state_updated(&self, event: SchedulerEvent) -> anyhow::Result<()> {
        self.record(ListenerEvent::SchedulerState(event))
    }

    fn job_submitted(&self, job: &JobState) -> anyhow::Result<()> {
        self.record(ListenerEvent::JobSubmitted(job.info.job_id.clone()))
    }

    fn job_state_updated(&self, notification: &NotificationData<JobInfo>) -> anyhow::Result<()> {
        self.record(ListenerEvent::JobState {
            job_id: notification.data.job_id.clone(),
            status: notification.data.status,
        })
    }

    fn job_updated_full_data(&self, job: &JobState) -> anyhow::Result<()> {
        self.record(ListenerEvent::JobFullData(job.info.job_id.clone()))
    }

    fn task_state_updated(&self, notification: &NotificationData<TaskInfo>) -> anyhow::Result<()> {
        self.record(ListenerEvent::TaskState {
            job_id: notification.data.job_id.clone(),
            task_name: notification.data.task_name.clone(),
            status: notification.data.status,
        })
    }

    fn pull_data_finished(&self, job_id: &str, task_name: &str, local_folder: &Path) -> anyhow::Result<()> {
        self.record(ListenerEvent::PullFinished {
            job_id: job_id.to_string(),
            task_name: task_name.to_string(),
            local_folder: local_folder.to_path_buf(),
        })
    }

    fn pull_data_failed(
        &self,
        job_id: &str,
        task_name: &str,
        remote_folder: &str,
        cause: &ProxyError,
    ) -> anyhow::Result<()> {
        self.record(ListenerEvent::PullFailed {
            job_id: job_id.to_string(),
            task_name: task_name.to_string(),
            remote_folder: remote_folder.to_string(),
            cause: cause.to_string(),
        })
    }
}

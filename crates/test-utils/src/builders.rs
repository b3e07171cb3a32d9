#![allow(dead_code)]

use smartproxy::scheduler::{
    JobInfo, JobSpec, JobState, NotificationData, SchedulerNotification, TaskInfo, TaskSpec,
    TaskState,
};
use smartproxy::tracking::{AwaitedJob, AwaitedTask};
use smartproxy::types::{JobStatus, SchedulerEvent, TaskStatus};

/// Builder for `JobSpec` to simplify test setup.
pub struct JobSpecBuilder {
    job: JobSpec,
}

impl JobSpecBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            job: JobSpec::new(name),
        }
    }

    pub fn input_space(mut self, url: &str) -> Self {
        self.job.input_space = Some(url.to_string());
        self
    }

    pub fn output_space(mut self, url: &str) -> Self {
        self.job.output_space = Some(url.to_string());
        self
    }

    pub fn task(mut self, task: TaskSpec) -> Self {
        self.job.tasks.push(task);
        self
    }

    pub fn build(self) -> JobSpec {
        self.job
    }
}

/// Builder for `TaskSpec`.
pub struct TaskSpecBuilder {
    task: TaskSpec,
}

impl TaskSpecBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: TaskSpec::new(name),
        }
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.task.input_files.push(pattern.to_string());
        self
    }

    pub fn output(mut self, pattern: &str) -> Self {
        self.task.output_files.push(pattern.to_string());
        self
    }

    pub fn build(self) -> TaskSpec {
        self.task
    }
}

/// A tracked job with the given tasks and no staged folders.
pub fn awaited_job(job_id: &str, tasks: &[&str]) -> AwaitedJob {
    AwaitedJob {
        job_id: job_id.to_string(),
        local_input_folder: None,
        input_space_url: None,
        push_url: None,
        local_output_folder: None,
        output_space_url: None,
        pull_url: Some(format!("file:///spaces/{job_id}/output")),
        isolate_task_outputs: false,
        automatic_transfer: false,
        awaited_tasks: tasks
            .iter()
            .map(|t| (t.to_string(), AwaitedTask::new(*t, vec!["*.out".to_string()])))
            .collect(),
    }
}

pub fn task_info(job_id: &str, task_name: &str, status: TaskStatus) -> TaskInfo {
    TaskInfo {
        job_id: job_id.to_string(),
        task_id: format!("{job_id}t{task_name}"),
        task_name: task_name.to_string(),
        status,
    }
}

pub fn task_event(job_id: &str, task_name: &str, status: TaskStatus) -> SchedulerNotification {
    SchedulerNotification::TaskStateUpdated(NotificationData::new(
        SchedulerEvent::TaskRunningToFinished,
        task_info(job_id, task_name, status),
    ))
}

pub fn job_event(job_id: &str, status: JobStatus) -> SchedulerNotification {
    let event = match status {
        JobStatus::Killed | JobStatus::Canceled => SchedulerEvent::Killed,
        _ => SchedulerEvent::JobRunningToFinished,
    };
    SchedulerNotification::JobStateUpdated(NotificationData::new(
        event,
        JobInfo {
            job_id: job_id.to_string(),
            status,
        },
    ))
}

pub fn job_state(job_id: &str, status: JobStatus, tasks: &[(&str, TaskStatus)]) -> JobState {
    JobState {
        info: JobInfo {
            job_id: job_id.to_string(),
            status,
        },
        tasks: tasks
            .iter()
            .map(|(name, task_status)| TaskState {
                info: task_info(job_id, name, *task_status),
            })
            .collect(),
    }
}

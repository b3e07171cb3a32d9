// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier the remote scheduler assigns to an accepted job.
pub type JobId = String;

/// Task names are unique within a job.
pub type TaskName = String;

/// Status of a job as reported by the remote scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Stalled,
    Paused,
    InError,
    Finished,
    Canceled,
    Failed,
    Killed,
}

impl JobStatus {
    /// Whether the job will not run any more tasks.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Canceled | JobStatus::Failed | JobStatus::Killed
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Stalled => "stalled",
            JobStatus::Paused => "paused",
            JobStatus::InError => "in_error",
            JobStatus::Finished => "finished",
            JobStatus::Canceled => "canceled",
            JobStatus::Failed => "failed",
            JobStatus::Killed => "killed",
        };
        f.write_str(s)
    }
}

/// Status of a single task as reported by the remote scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Submitted,
    Pending,
    Paused,
    Running,
    WaitingOnError,
    WaitingOnFailure,
    InError,
    Failed,
    NotStarted,
    NotRestarted,
    Aborted,
    Skipped,
    Faulty,
    Finished,
}

impl TaskStatus {
    /// The task ended without producing anything worth fetching.
    pub fn never_ran(self) -> bool {
        matches!(
            self,
            TaskStatus::Aborted
                | TaskStatus::NotRestarted
                | TaskStatus::NotStarted
                | TaskStatus::Skipped
        )
    }

    /// The task ended and may have left output files behind.
    pub fn has_output(self) -> bool {
        matches!(self, TaskStatus::Finished | TaskStatus::Faulty)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Kinds of notifications the remote scheduler can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerEvent {
    JobPendingToRunning,
    JobPendingToFinished,
    JobRunningToFinished,
    JobPaused,
    JobResumed,
    JobRestartedFromError,
    JobInError,
    Killed,
    Shutdown,
    ShuttingDown,
    Stopped,
    Resumed,
    TaskPendingToRunning,
    TaskRunningToFinished,
    TaskProgress,
    TaskInError,
}

/// The event kinds the proxy subscribes to on (re)connection.
pub const PROXY_EVENTS: &[SchedulerEvent] = &[
    SchedulerEvent::JobRunningToFinished,
    SchedulerEvent::JobPendingToRunning,
    SchedulerEvent::JobPendingToFinished,
    SchedulerEvent::JobPaused,
    SchedulerEvent::JobResumed,
    SchedulerEvent::TaskPendingToRunning,
    SchedulerEvent::Killed,
    SchedulerEvent::Shutdown,
    SchedulerEvent::ShuttingDown,
    SchedulerEvent::Stopped,
    SchedulerEvent::Resumed,
    SchedulerEvent::TaskRunningToFinished,
    SchedulerEvent::TaskProgress,
    SchedulerEvent::JobRestartedFromError,
    SchedulerEvent::JobInError,
    SchedulerEvent::TaskInError,
];

/// Log level accepted in the `[log]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!(
                "invalid log level: {other} (expected error, warn, info, debug or trace)"
            )),
        }
    }
}

/// Boxed future returned by the object-safe ports (`SchedulerTransport`,
/// `DataTransferAgent`).
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

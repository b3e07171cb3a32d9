use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use smartproxy::errors::{ProxyError, Result};
use smartproxy::scheduler::{
    JobSpec, JobState, SchedulerNotification, SchedulerTransport, TaskResult,
};
use smartproxy::types::{BoxFuture, JobId, SchedulerEvent};
use tokio::sync::mpsc;

/// Failure categories the fake scheduler can be told to raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotConnected,
    PermissionDenied,
    SubmissionClosed,
    JobCreation,
    UnknownJob,
}

impl FailureKind {
    pub fn to_error(self, context: &str) -> ProxyError {
        let context = context.to_string();
        match self {
            FailureKind::NotConnected => ProxyError::NotConnected(context),
            FailureKind::PermissionDenied => ProxyError::PermissionDenied(context),
            FailureKind::SubmissionClosed => ProxyError::SubmissionClosed(context),
            FailureKind::JobCreation => ProxyError::JobCreation(context),
            FailureKind::UnknownJob => ProxyError::UnknownJob(context),
        }
    }
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    submitted: Vec<JobSpec>,
    submit_failure: Option<FailureKind>,
    user_spaces: Vec<String>,
    job_states: HashMap<JobId, JobState>,
    job_state_failures: HashMap<JobId, FailureKind>,
    task_results: HashSet<(JobId, String)>,
    subscriber: Option<mpsc::Sender<SchedulerNotification>>,
    subscribed_events: Vec<SchedulerEvent>,
}

/// In-process `SchedulerTransport` with scripted answers.
///
/// - `submit` hands out ids `"1"`, `"2"`, ... and records the job, unless a
///   failure is scripted;
/// - `job_state` / `task_result` answer from what the test registered;
/// - [`push`](Self::push) delivers a notification to the current subscriber.
#[derive(Clone, Default)]
pub struct FakeScheduler {
    state: Arc<Mutex<FakeState>>,
    connected: Arc<AtomicBool>,
    job_state_queries: Arc<AtomicUsize>,
    task_result_queries: Arc<AtomicUsize>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage area returned by `user_space_uris`.
    pub fn with_user_space(self, uri: &str) -> Self {
        self.state.lock().unwrap().user_spaces.push(uri.to_string());
        self
    }

    /// Make every following `submit` fail with `kind`.
    pub fn fail_submissions(&self, kind: FailureKind) {
        self.state.lock().unwrap().submit_failure = Some(kind);
    }

    pub fn set_job_state(&self, state: JobState) {
        self.state
            .lock()
            .unwrap()
            .job_states
            .insert(state.info.job_id.clone(), state);
    }

    pub fn fail_job_state(&self, job_id: &str, kind: FailureKind) {
        self.state
            .lock()
            .unwrap()
            .job_state_failures
            .insert(job_id.to_string(), kind);
    }

    /// Make a result available for the task.
    pub fn set_task_result(&self, job_id: &str, task_name: &str) {
        self.state
            .lock()
            .unwrap()
            .task_results
            .insert((job_id.to_string(), task_name.to_string()));
    }

    pub fn submitted(&self) -> Vec<JobSpec> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn subscribed_events(&self) -> Vec<SchedulerEvent> {
        self.state.lock().unwrap().subscribed_events.clone()
    }

    pub fn job_state_queries(&self) -> usize {
        self.job_state_queries.load(Ordering::SeqCst)
    }

    pub fn task_result_queries(&self) -> usize {
        self.task_result_queries.load(Ordering::SeqCst)
    }

    /// Deliver a notification as the scheduler would.
    pub async fn push(&self, notification: SchedulerNotification) {
        let sender = self.state.lock().unwrap().subscriber.clone();
        sender
            .expect("nobody subscribed to the fake scheduler")
            .send(notification)
            .await
            .expect("subscriber dropped");
    }
}

impl SchedulerTransport for FakeScheduler {
    fn submit<'a>(&'a self, job: &'a JobSpec) -> BoxFuture<'a, Result<JobId>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if let Some(kind) = state.submit_failure {
                return Err(kind.to_error(&format!("submission of {} refused", job.name)));
            }
            state.next_id += 1;
            state.submitted.push(job.clone());
            Ok(state.next_id.to_string())
        })
    }

    fn job_state<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<JobState>> {
        Box::pin(async move {
            self.job_state_queries.fetch_add(1, Ordering::SeqCst);
            let state = self.state.lock().unwrap();
            if let Some(kind) = state.job_state_failures.get(job_id) {
                return Err(kind.to_error(job_id));
            }
            state
                .job_states
                .get(job_id)
                .cloned()
                .ok_or_else(|| ProxyError::UnknownJob(job_id.to_string()))
        })
    }

    fn task_result<'a>(
        &'a self,
        job_id: &'a str,
        task_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<TaskResult>>> {
        Box::pin(async move {
            self.task_result_queries.fetch_add(1, Ordering::SeqCst);
            let state = self.state.lock().unwrap();
            let key = (job_id.to_string(), task_name.to_string());
            Ok(state.task_results.contains(&key).then(|| TaskResult {
                task_name: task_name.to_string(),
                had_exception: false,
            }))
        })
    }

    fn user_space_uris(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().user_spaces.clone()) })
    }

    fn subscribe<'a>(
        &'a self,
        events: &'a [SchedulerEvent],
    ) -> BoxFuture<'a, Result<mpsc::Receiver<SchedulerNotification>>> {
        Box::pin(async move {
            let (tx, rx) = mpsc::channel(64);
            let mut state = self.state.lock().unwrap();
            state.subscriber = Some(tx);
            state.subscribed_events = events.to_vec();
            self.connected.store(true, Ordering::SeqCst);
            Ok(rx)
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.state.lock().unwrap().subscriber = None;
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

// tests/proxy_scenarios.rs

mod common;
use crate::common::{build_proxy, Harness, INPUT_SPACE, OUTPUT_SPACE, USER_SPACE};

use std::sync::Arc;
use std::time::Duration;

use smartproxy::errors::ProxyError;
use smartproxy::proxy::ProxyEventListener;
use smartproxy::scheduler::JobSpec;
use smartproxy::types::{JobStatus, TaskStatus, PROXY_EVENTS};
use smartproxy_test_utils::builders::{job_event, job_state, task_event};
use smartproxy_test_utils::{
    wait_until, with_timeout, FailureKind, FakeScheduler, JobSpecBuilder, ListenerEvent,
    RecordingListener, TaskSpecBuilder,
};

fn two_task_job() -> JobSpec {
    JobSpecBuilder::new("render")
        .input_space(INPUT_SPACE)
        .output_space(OUTPUT_SPACE)
        .task(TaskSpecBuilder::new("A").input("*.in").output("a/*.out").build())
        .task(TaskSpecBuilder::new("B").output("b/*.out").build())
        .build()
}

async fn submit_two_tasks(h: &Harness, automatic: bool) -> String {
    let input = h.input_folder();
    let output = h.output_folder();
    h.proxy
        .submit(two_task_job(), Some(&input), Some(&output), false, automatic)
        .await
        .unwrap()
}

fn awaited_tasks(h: &Harness, job_id: &str) -> Vec<String> {
    h.proxy
        .awaited_job(job_id)
        .unwrap()
        .map(|j| j.awaited_tasks.keys().cloned().collect())
        .unwrap_or_default()
}

fn task_events_seen(listener: &RecordingListener, task: &str) -> usize {
    listener
        .events()
        .iter()
        .filter(|e| matches!(e, ListenerEvent::TaskState { task_name, .. } if task_name == task))
        .count()
}

#[tokio::test]
async fn init_subscribes_to_proxy_events() {
    let h = Harness::new();
    with_timeout(h.proxy.init()).await.unwrap();

    assert!(h.proxy.is_initialized());
    assert!(h.proxy.is_connected());
    assert_eq!(h.scheduler.subscribed_events(), PROXY_EVENTS.to_vec());
}

#[tokio::test]
async fn submit_stages_folders_and_tracks_every_task() {
    let h = Harness::new();
    h.proxy.init().await.unwrap();

    let job_id = submit_two_tasks(&h, true).await;

    let created = h.agent.created_folders();
    assert_eq!(created.len(), 2);
    assert!(created[0].starts_with(&format!("{USER_SPACE}/alice_")));
    assert!(created[0].ends_with("/input"));
    assert!(created[1].ends_with("/output"));
    assert_eq!(h.agent.uploads().len(), 1);

    let submitted = &h.scheduler.submitted()[0];
    let input_space = submitted.input_space.clone().unwrap();
    assert!(input_space.starts_with(&format!("{INPUT_SPACE}/alice_")));
    assert!(input_space.ends_with("/input"));
    assert_eq!(submitted.generic_info("push_url"), Some(created[0].as_str()));
    assert_eq!(submitted.generic_info("pull_url"), Some(created[1].as_str()));
    let output = h.output_folder().to_string_lossy().into_owned();
    assert_eq!(submitted.generic_info("client_output_data_folder"), Some(output.as_str()));

    let job = h.proxy.awaited_job(&job_id).unwrap().unwrap();
    assert_eq!(job.job_id, job_id);
    assert!(job.automatic_transfer);
    assert!(!job.isolate_task_outputs);
    assert_eq!(job.push_url.as_deref(), Some(created[0].as_str()));
    assert_eq!(job.pull_url.as_deref(), Some(created[1].as_str()));
    assert_eq!(job.local_output_folder, Some(h.output_folder()));
    assert_eq!(job.awaited_task("A").unwrap().output_file_patterns, vec!["a/*.out".to_string()]);
    assert_eq!(awaited_tasks(&h, &job_id), vec!["A".to_string(), "B".to_string()]);
}

#[tokio::test]
async fn isolated_outputs_record_task_placeholder() {
    let h = Harness::new();
    h.proxy.init().await.unwrap();

    let output = h.output_folder();
    let job_id = h
        .proxy
        .submit(two_task_job(), None, Some(&output), true, false)
        .await
        .unwrap();

    let created = h.agent.created_folders();
    assert_eq!(created.len(), 1);
    assert!(created[0].ends_with("/output"));

    let job = h.proxy.awaited_job(&job_id).unwrap().unwrap();
    let pull_url = job.pull_url.clone().unwrap();
    assert_eq!(pull_url, format!("{}/[TASKID]", created[0]));
    assert!(job.output_space_url.unwrap().ends_with("/output/[TASKID]"));
    assert!(job.push_url.is_none());
    assert!(h.agent.uploads().is_empty());
}

#[tokio::test]
async fn job_without_declared_spaces_is_not_staged() {
    let h = Harness::new();
    h.proxy.init().await.unwrap();

    let job = JobSpecBuilder::new("plain")
        .task(TaskSpecBuilder::new("A").build())
        .build();
    let output = h.output_folder();
    let job_id = h.proxy.submit(job, None, Some(&output), false, true).await.unwrap();

    assert!(h.agent.created_folders().is_empty());
    let job = h.proxy.awaited_job(&job_id).unwrap().unwrap();
    assert!(job.pull_url.is_none());
    assert_eq!(job.local_output_folder, Some(output));
}

// Scenario A
#[tokio::test]
async fn automatic_transfer_downloads_each_finished_task_once() {
    let h = Harness::new();
    let listener = Arc::new(RecordingListener::new());
    h.proxy.add_event_listener(listener.clone());
    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, true).await;

    h.scheduler.push(task_event(&job_id, "A", TaskStatus::Finished)).await;
    h.scheduler.push(task_event(&job_id, "B", TaskStatus::Finished)).await;

    wait_until(|| listener.pulls_finished().len() == 2).await;

    let downloads = h.agent.downloads();
    assert_eq!(downloads.len(), 2);
    assert!(downloads.iter().all(|d| d.local_folder == h.output_folder()));
    let mut tasks: Vec<_> = downloads.iter().map(|d| d.task_name.clone()).collect();
    tasks.sort();
    assert_eq!(tasks, vec!["A".to_string(), "B".to_string()]);

    // The drained job stays tracked.
    let job = h.proxy.awaited_job(&job_id).unwrap().unwrap();
    assert!(job.awaited_tasks.is_empty());
    assert!(h.agent.removed_awaited_jobs().is_empty());
}

// Scenario B
#[tokio::test]
async fn manual_transfer_waits_for_pull_data() {
    let h = Harness::new();
    let listener = Arc::new(RecordingListener::new());
    h.proxy.add_event_listener(listener.clone());
    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, false).await;

    h.scheduler.push(task_event(&job_id, "A", TaskStatus::Finished)).await;
    wait_until(|| task_events_seen(&listener, "A") == 1).await;

    assert_eq!(h.agent.download_count(), 0);
    let job = h.proxy.awaited_job(&job_id).unwrap().unwrap();
    assert_eq!(job.awaited_task("A").unwrap().task_id.as_deref(), Some("1tA"));

    let target = h.dir.path().join("elsewhere");
    h.proxy.pull_data(&job_id, "A", Some(&target)).await.unwrap();

    let downloads = h.agent.downloads();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].task_name, "A");
    assert_eq!(downloads[0].local_folder, target);
    assert_eq!(awaited_tasks(&h, &job_id), vec!["B".to_string()]);
    // Manual pulls report through the return value only.
    assert!(listener.pulls_finished().is_empty());
}

#[tokio::test]
async fn pull_data_defaults_to_recorded_output_folder() {
    let h = Harness::new();
    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, false).await;

    h.proxy.pull_data(&job_id, "B", None).await.unwrap();

    assert_eq!(h.agent.downloads()[0].local_folder, h.output_folder());
}

#[tokio::test]
async fn pull_data_rejections() {
    let h = Harness::new();
    assert!(matches!(
        h.proxy.pull_data("1", "A", None).await,
        Err(ProxyError::NotInitialized)
    ));

    h.proxy.init().await.unwrap();
    let automatic = submit_two_tasks(&h, true).await;
    let manual_no_output = h
        .proxy
        .submit(two_task_job(), None, None, false, false)
        .await
        .unwrap();

    assert!(matches!(
        h.proxy.pull_data("999", "A", None).await,
        Err(ProxyError::JobNotTracked(_))
    ));
    assert!(matches!(
        h.proxy.pull_data(&automatic, "A", None).await,
        Err(ProxyError::AutomaticTransferEnabled(_))
    ));
    assert!(matches!(
        h.proxy.pull_data(&manual_no_output, "A", None).await,
        Err(ProxyError::NoOutputFolder(_))
    ));
    let target = h.output_folder();
    assert!(matches!(
        h.proxy.pull_data(&manual_no_output, "Z", Some(&target)).await,
        Err(ProxyError::UnknownTask { .. })
    ));
    assert_eq!(h.agent.download_count(), 0);

    h.proxy.terminate();
    assert!(matches!(
        h.proxy.pull_data(&manual_no_output, "A", Some(&target)).await,
        Err(ProxyError::Terminated)
    ));
}

#[tokio::test]
async fn failed_manual_pull_is_returned_and_task_dropped() {
    let h = Harness::new();
    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, false).await;
    h.agent.fail_downloads(true);

    let result = h.proxy.pull_data(&job_id, "A", None).await;

    assert!(matches!(result, Err(ProxyError::Transfer(_))));
    assert_eq!(awaited_tasks(&h, &job_id), vec!["B".to_string()]);
}

// Scenario C
#[tokio::test]
async fn reconciliation_replays_tasks_finished_while_away() {
    let h = Harness::new();
    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, true).await;
    h.proxy.terminate();

    h.scheduler.set_job_state(job_state(
        &job_id,
        JobStatus::Running,
        &[("A", TaskStatus::Finished), ("B", TaskStatus::Running)],
    ));
    h.scheduler.set_task_result(&job_id, "A");

    let proxy = h.restart();
    let listener = Arc::new(RecordingListener::new());
    proxy.add_event_listener(listener.clone());
    with_timeout(proxy.init()).await.unwrap();

    wait_until(|| listener.pulls_finished().len() == 1).await;
    assert_eq!(task_events_seen(&listener, "A"), 1);
    assert_eq!(task_events_seen(&listener, "B"), 0);
    assert_eq!(h.agent.download_count(), 1);
    assert_eq!(h.agent.downloads()[0].task_name, "A");
    assert_eq!(h.scheduler.task_result_queries(), 2);

    let job = proxy.awaited_job(&job_id).unwrap().unwrap();
    assert_eq!(job.awaited_tasks.keys().cloned().collect::<Vec<_>>(), vec!["B".to_string()]);
}

#[tokio::test]
async fn resync_skips_tasks_already_transferring() {
    let h = Harness::new();
    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, true).await;
    assert!(h.proxy.tracker().begin_transfer(&job_id, "A").unwrap());

    h.scheduler.set_job_state(job_state(
        &job_id,
        JobStatus::Finished,
        &[("A", TaskStatus::Finished), ("B", TaskStatus::Finished)],
    ));
    h.scheduler.set_task_result(&job_id, "A");
    h.scheduler.set_task_result(&job_id, "B");

    h.proxy.reconnect().await.unwrap();

    wait_until(|| h.agent.download_count() == 1).await;
    assert_eq!(h.scheduler.task_result_queries(), 1);
    assert_eq!(h.agent.downloads()[0].task_name, "B");
    // A finished job is not removed by reconciliation.
    wait_until(|| {
        h.proxy
            .awaited_job(&job_id)
            .unwrap()
            .is_some_and(|j| j.awaited_task("B").is_none())
    })
    .await;
    assert!(h.proxy.awaited_job(&job_id).unwrap().unwrap().awaited_task("A").is_some());
}

#[tokio::test]
async fn transfer_interrupted_by_restart_is_fetched_again() {
    let h = Harness::new();
    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, true).await;
    assert!(h.proxy.tracker().set_task_transferring(&job_id, "A", true).unwrap());
    assert!(!h.proxy.tracker().set_task_transferring(&job_id, "Z", true).unwrap());
    h.proxy.terminate();

    h.scheduler.set_job_state(job_state(
        &job_id,
        JobStatus::Running,
        &[("A", TaskStatus::Finished), ("B", TaskStatus::Running)],
    ));
    h.scheduler.set_task_result(&job_id, "A");

    let proxy = h.restart();
    let listener = Arc::new(RecordingListener::new());
    proxy.add_event_listener(listener.clone());
    with_timeout(proxy.init()).await.unwrap();

    wait_until(|| listener.pulls_finished().len() == 1).await;
    assert_eq!(h.agent.download_count(), 1);
    assert_eq!(h.agent.downloads()[0].task_name, "A");
    assert_eq!(h.scheduler.task_result_queries(), 2);

    let job = proxy.awaited_job(&job_id).unwrap().unwrap();
    assert_eq!(job.awaited_tasks.keys().cloned().collect::<Vec<_>>(), vec!["B".to_string()]);
    assert!(!job.awaited_task("B").unwrap().transferring);

    h.scheduler.push(task_event(&job_id, "B", TaskStatus::Finished)).await;
    wait_until(|| h.agent.download_count() == 2).await;
}

#[tokio::test]
async fn reconciliation_error_table() {
    let h = Harness::new();
    h.proxy.init().await.unwrap();
    let lost = submit_two_tasks(&h, true).await;
    let denied = submit_two_tasks(&h, true).await;
    let unknown = submit_two_tasks(&h, true).await;
    h.proxy.terminate();

    h.scheduler.fail_job_state(&lost, FailureKind::NotConnected);
    h.scheduler.fail_job_state(&denied, FailureKind::PermissionDenied);
    h.scheduler.fail_job_state(&unknown, FailureKind::UnknownJob);

    let proxy = h.restart();
    proxy.init().await.unwrap();

    assert_eq!(proxy.awaited_job_ids().unwrap(), vec![lost, denied]);
    assert_eq!(h.scheduler.job_state_queries(), 3);
    // Unknown jobs are forgotten but their remote data is kept.
    assert!(h.agent.removed_awaited_jobs().is_empty());
}

// Scenario D
#[tokio::test]
async fn failed_submission_rolls_back_both_folders() {
    let h = Harness::new();
    h.proxy.init().await.unwrap();
    h.scheduler.fail_submissions(FailureKind::SubmissionClosed);

    let input = h.input_folder();
    let output = h.output_folder();
    let result = h
        .proxy
        .submit(two_task_job(), Some(&input), Some(&output), false, true)
        .await;

    assert!(matches!(result, Err(ProxyError::SubmissionClosed(_))));

    let created = h.agent.created_folders();
    assert_eq!(created.len(), 2);
    let folder = created[0]
        .strip_prefix(&format!("{USER_SPACE}/"))
        .and_then(|rest| rest.strip_suffix("/input"))
        .unwrap()
        .to_string();

    let removed = h.agent.removed_job_io();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].push_url.as_deref(), Some(USER_SPACE));
    assert_eq!(removed[0].pull_url.as_deref(), Some(USER_SPACE));
    assert_eq!(removed[0].folder_name, folder);
    assert_eq!(created[1], format!("{USER_SPACE}/{folder}/output"));

    assert!(h.proxy.awaited_job_ids().unwrap().is_empty());
}

#[tokio::test]
async fn submission_errors_keep_their_category() {
    let cases = [
        FailureKind::NotConnected,
        FailureKind::PermissionDenied,
        FailureKind::SubmissionClosed,
        FailureKind::JobCreation,
    ];
    for kind in cases {
        let h = Harness::new();
        h.proxy.init().await.unwrap();
        h.scheduler.fail_submissions(kind);

        let err = h
            .proxy
            .submit(two_task_job(), None, None, false, false)
            .await
            .unwrap_err();

        let same = match kind {
            FailureKind::NotConnected => matches!(err, ProxyError::NotConnected(_)),
            FailureKind::PermissionDenied => matches!(err, ProxyError::PermissionDenied(_)),
            FailureKind::SubmissionClosed => matches!(err, ProxyError::SubmissionClosed(_)),
            FailureKind::JobCreation => matches!(err, ProxyError::JobCreation(_)),
            FailureKind::UnknownJob => false,
        };
        assert!(same, "{kind:?} surfaced as {err:?}");
        assert!(h.proxy.awaited_job_ids().unwrap().is_empty());
    }
}

#[tokio::test]
async fn failed_upload_rolls_back_before_submitting() {
    let h = Harness::new();
    h.proxy.init().await.unwrap();
    h.agent.fail_uploads(true);

    let input = h.input_folder();
    let result = h
        .proxy
        .submit(two_task_job(), Some(&input), None, false, false)
        .await;

    assert!(matches!(result, Err(ProxyError::Transfer(_))));
    assert!(h.scheduler.submitted().is_empty());
    assert_eq!(h.agent.removed_job_io().len(), 1);
    assert!(h.proxy.awaited_job_ids().unwrap().is_empty());
}

#[tokio::test]
async fn submit_requires_initialized_proxy() {
    let h = Harness::new();
    let result = h.proxy.submit(two_task_job(), None, None, false, false).await;
    assert!(matches!(result, Err(ProxyError::NotInitialized)));

    h.proxy.init().await.unwrap();
    h.proxy.terminate();
    h.proxy.terminate();
    let result = h.proxy.submit(two_task_job(), None, None, false, false).await;
    assert!(matches!(result, Err(ProxyError::Terminated)));
    assert!(matches!(h.proxy.init().await, Err(ProxyError::Terminated)));
}

#[tokio::test]
async fn concurrent_triggers_download_a_task_once() {
    let h = Harness::new();
    let listener = Arc::new(RecordingListener::new());
    h.proxy.add_event_listener(listener.clone());
    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, true).await;
    h.agent.set_download_delay(Duration::from_millis(100));

    let smartproxy::scheduler::SchedulerNotification::TaskStateUpdated(finished) =
        task_event(&job_id, "A", TaskStatus::Finished)
    else {
        unreachable!()
    };
    let (first, second) = tokio::join!(
        h.proxy.update_task(&finished),
        h.proxy.update_task(&finished)
    );
    first.unwrap();
    second.unwrap();
    h.scheduler.push(task_event(&job_id, "A", TaskStatus::Finished)).await;

    wait_until(|| listener.pulls_finished().len() == 1).await;
    wait_until(|| task_events_seen(&listener, "A") == 1).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(h.agent.download_count(), 1);
    assert_eq!(listener.pulls_finished().len(), 1);
}

#[tokio::test]
async fn killed_or_canceled_job_is_removed_with_its_folders() {
    for status in [JobStatus::Killed, JobStatus::Canceled] {
        let h = Harness::new();
        h.proxy.init().await.unwrap();
        let job_id = submit_two_tasks(&h, true).await;

        h.scheduler.push(job_event(&job_id, status)).await;

        wait_until(|| h.proxy.awaited_job(&job_id).unwrap().is_none()).await;
        wait_until(|| h.agent.removed_awaited_jobs().len() == 1).await;
        assert_eq!(h.agent.removed_awaited_jobs(), vec![job_id]);
        assert_eq!(h.agent.download_count(), 0);
    }
}

#[tokio::test]
async fn slow_folder_cleanup_does_not_hold_up_later_events() {
    let h = Harness::new();
    let listener = Arc::new(RecordingListener::new());
    h.proxy.add_event_listener(listener.clone());
    h.agent.set_cleanup_delay(Duration::from_secs(30));
    h.proxy.init().await.unwrap();
    let killed = submit_two_tasks(&h, true).await;
    let running = submit_two_tasks(&h, true).await;

    h.scheduler.push(job_event(&killed, JobStatus::Killed)).await;
    h.scheduler.push(task_event(&running, "A", TaskStatus::Finished)).await;

    wait_until(|| listener.pulls_finished().len() == 1).await;
    assert!(h.proxy.awaited_job(&killed).unwrap().is_none());
    wait_until(|| h.agent.removed_awaited_jobs() == vec![killed.clone()]).await;
    assert_eq!(awaited_tasks(&h, &running), vec!["B".to_string()]);
}

#[tokio::test]
async fn finished_job_stays_tracked() {
    let h = Harness::new();
    let listener = Arc::new(RecordingListener::new());
    h.proxy.add_event_listener(listener.clone());
    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, true).await;

    h.scheduler.push(job_event(&job_id, JobStatus::Finished)).await;
    h.scheduler.push(job_event(&job_id, JobStatus::Failed)).await;
    wait_until(|| listener.events().len() == 2).await;

    assert_eq!(awaited_tasks(&h, &job_id), vec!["A".to_string(), "B".to_string()]);
}

#[tokio::test]
async fn tasks_that_never_ran_are_dropped_without_download() {
    let h = Harness::new();
    let listener = Arc::new(RecordingListener::new());
    h.proxy.add_event_listener(listener.clone());
    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, true).await;

    h.scheduler.push(task_event(&job_id, "A", TaskStatus::Aborted)).await;
    h.scheduler.push(task_event(&job_id, "B", TaskStatus::Skipped)).await;
    wait_until(|| task_events_seen(&listener, "B") == 1).await;

    assert_eq!(h.agent.download_count(), 0);
    assert!(awaited_tasks(&h, &job_id).is_empty());
    assert!(h.proxy.awaited_job(&job_id).unwrap().is_some());
}

#[tokio::test]
async fn drained_job_is_removed_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = FakeScheduler::new().with_user_space(USER_SPACE);
    let h = Harness::in_dir(dir, scheduler);
    let proxy = build_proxy(h.dir.path(), &h.scheduler, &h.agent, true);
    proxy.init().await.unwrap();

    let output = h.output_folder();
    let job_id = proxy
        .submit(two_task_job(), None, Some(&output), false, true)
        .await
        .unwrap();

    h.scheduler.push(task_event(&job_id, "A", TaskStatus::NotStarted)).await;
    h.scheduler.push(task_event(&job_id, "B", TaskStatus::Finished)).await;

    wait_until(|| proxy.awaited_job(&job_id).unwrap().is_none()).await;
    assert_eq!(h.agent.removed_awaited_jobs(), vec![job_id]);
    assert_eq!(h.agent.download_count(), 1);
}

#[tokio::test]
async fn failed_automatic_transfer_notifies_and_drops_task() {
    let h = Harness::new();
    let listener = Arc::new(RecordingListener::new());
    h.proxy.add_event_listener(listener.clone());
    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, true).await;
    let pull_url = h.proxy.awaited_job(&job_id).unwrap().unwrap().pull_url.unwrap();
    h.agent.fail_downloads(true);

    h.scheduler.push(task_event(&job_id, "A", TaskStatus::Faulty)).await;

    wait_until(|| listener.pulls_failed().len() == 1).await;
    match &listener.pulls_failed()[0] {
        ListenerEvent::PullFailed { job_id: id, task_name, remote_folder, cause } => {
            assert_eq!(id, &job_id);
            assert_eq!(task_name, "A");
            assert_eq!(remote_folder, &pull_url);
            assert!(cause.contains("failed"));
        }
        other => panic!("Expected PullFailed, got: {:?}", other),
    }
    assert_eq!(awaited_tasks(&h, &job_id), vec!["B".to_string()]);
}

#[tokio::test]
async fn failing_listener_is_removed_and_others_still_notified() {
    let h = Harness::new();
    let good = Arc::new(RecordingListener::new());
    let bad = Arc::new(RecordingListener::failing());
    h.proxy.add_event_listener(bad.clone());
    h.proxy.add_event_listener(good.clone());
    assert!(!h.proxy.add_event_listener(good.clone()));
    assert_eq!(h.proxy.listener_count(), 2);

    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, true).await;

    h.scheduler.push(task_event(&job_id, "A", TaskStatus::Aborted)).await;
    wait_until(|| good.events().len() == 1).await;

    assert_eq!(h.proxy.listener_count(), 1);
    assert_eq!(bad.events().len(), 1);
    // Bookkeeping happened before delivery and is kept.
    assert_eq!(awaited_tasks(&h, &job_id), vec!["B".to_string()]);

    h.scheduler.push(task_event(&job_id, "B", TaskStatus::Aborted)).await;
    wait_until(|| good.events().len() == 2).await;
    assert_eq!(bad.events().len(), 1);

    let good_dyn: Arc<dyn ProxyEventListener> = good.clone();
    assert!(h.proxy.remove_event_listener(&good_dyn));
    assert_eq!(h.proxy.listener_count(), 0);
}

#[tokio::test]
async fn events_for_untracked_jobs_are_forwarded_only() {
    let h = Harness::new();
    let listener = Arc::new(RecordingListener::new());
    h.proxy.add_event_listener(listener.clone());
    h.proxy.init().await.unwrap();

    h.scheduler.push(task_event("404", "A", TaskStatus::Finished)).await;
    h.scheduler.push(job_event("404", JobStatus::Killed)).await;
    wait_until(|| listener.events().len() == 2).await;

    assert_eq!(h.agent.download_count(), 0);
    assert!(h.agent.removed_awaited_jobs().is_empty());
}

#[tokio::test]
async fn database_lifecycle_through_the_proxy() {
    let h = Harness::new();
    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, false).await;

    assert!(matches!(h.proxy.clean_database(), Err(ProxyError::StoreNotClosed)));
    assert!(matches!(
        h.proxy.set_session_name("other"),
        Err(ProxyError::SessionAlreadyOpen(_))
    ));

    h.proxy.discard_job(&job_id).unwrap();
    assert!(h.proxy.awaited_job_ids().unwrap().is_empty());
    assert!(h.agent.removed_awaited_jobs().is_empty());

    submit_two_tasks(&h, false).await;
    h.proxy.discard_all_jobs().unwrap();
    assert!(h.proxy.awaited_job_ids().unwrap().is_empty());

    h.proxy.terminate();
    h.proxy.clean_database().unwrap();
}

#[tokio::test]
async fn reconnect_resubscribes_and_resyncs() {
    let h = Harness::new();
    h.proxy.init().await.unwrap();
    let job_id = submit_two_tasks(&h, true).await;

    h.proxy.disconnect().await.unwrap();
    assert!(!h.proxy.is_connected());

    h.scheduler.set_job_state(job_state(
        &job_id,
        JobStatus::Running,
        &[("A", TaskStatus::Finished), ("B", TaskStatus::Pending)],
    ));
    h.scheduler.set_task_result(&job_id, "A");

    h.proxy.reconnect().await.unwrap();
    assert!(h.proxy.is_connected());

    wait_until(|| h.agent.download_count() == 1).await;
    h.scheduler.push(task_event(&job_id, "B", TaskStatus::Finished)).await;
    wait_until(|| h.agent.download_count() == 2).await;
}

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use smartproxy::config::{ProxyConfig, RawProxyConfig};
use smartproxy::proxy::ProxyCore;
use smartproxy_test_utils::{init_tracing, CountingTransferAgent, FakeScheduler};

/// User space the fake scheduler advertises.
pub const USER_SPACE: &str = "file:///grid/users/alice";
pub const INPUT_SPACE: &str = "file:///nodes/input";
pub const OUTPUT_SPACE: &str = "file:///nodes/output";

/// A proxy wired to fakes, with its store in a temporary directory.
pub struct Harness {
    pub dir: TempDir,
    pub scheduler: FakeScheduler,
    pub agent: CountingTransferAgent,
    pub proxy: ProxyCore,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self::in_dir(dir, FakeScheduler::new().with_user_space(USER_SPACE))
    }

    pub fn in_dir(dir: TempDir, scheduler: FakeScheduler) -> Self {
        init_tracing();
        let agent = CountingTransferAgent::new();
        let proxy = build_proxy(dir.path(), &scheduler, &agent, false);
        Self {
            dir,
            scheduler,
            agent,
            proxy,
        }
    }

    /// A second proxy on the same store directory and fakes, as after a
    /// process restart.
    pub fn restart(&self) -> ProxyCore {
        build_proxy(self.dir.path(), &self.scheduler, &self.agent, false)
    }

    pub fn output_folder(&self) -> PathBuf {
        self.dir.path().join("results")
    }

    pub fn input_folder(&self) -> PathBuf {
        self.dir.path().join("inputs")
    }
}

pub fn build_proxy(
    store_dir: &Path,
    scheduler: &FakeScheduler,
    agent: &CountingTransferAgent,
    remove_drained_jobs: bool,
) -> ProxyCore {
    let mut raw = RawProxyConfig::default();
    raw.session.store_dir = store_dir.join("store");
    raw.session.user = Some("alice".to_string());
    raw.transfer.max_threads = 4;
    raw.tracking.remove_drained_jobs = remove_drained_jobs;
    let config = ProxyConfig::try_from(raw).unwrap();

    ProxyCore::new(config, Arc::new(scheduler.clone()), Arc::new(agent.clone())).unwrap()
}

// src/proxy/mod.rs

//! The smart proxy core.
//!
//! `ProxyCore` sits between client code and the remote scheduler:
//! - [`submit`] stages input/output folders, uploads inputs and records the
//!   job once the scheduler accepted it;
//! - [`events`] applies scheduler notifications to the tracked jobs and
//!   queues automatic output transfers;
//! - [`sync`] reconciles tracked jobs with the scheduler after connecting;
//! - [`pull`] fetches outputs on request for jobs without automatic transfer;
//! - [`listeners`] fans everything out to external listeners.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ProxyConfig;
use crate::errors::{ProxyError, Result};
use crate::scheduler::{SchedulerNotification, SchedulerTransport};
use crate::store::PersistentAwaitedJobStore;
use crate::tracking::{AwaitedJob, JobTracker};
use crate::transfer::{DataTransferAgent, TransferPool};
use crate::types::{JobId, PROXY_EVENTS};

pub mod events;
pub mod listeners;
pub mod pull;
pub mod submit;
pub mod sync;

pub use listeners::{ListenerSet, ProxyEventListener};
pub use submit::{new_folder_name, StagingOptions};

/// Client-side job and data tracking on top of a remote scheduler.
///
/// Cloning is cheap; clones share the same state. Create with
/// [`new`](Self::new), then [`init`](Self::init) before submitting.
#[derive(Clone)]
pub struct ProxyCore {
    inner: Arc<ProxyInner>,
}

struct ProxyInner {
    config: ProxyConfig,
    tracker: JobTracker,
    transport: Arc<dyn SchedulerTransport>,
    agent: Arc<dyn DataTransferAgent>,
    listeners: ListenerSet,
    pool: TransferPool,
    initialized: AtomicBool,
    terminated: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ProxyCore {
    /// Build a proxy. Nothing is opened or contacted until [`init`](Self::init).
    pub fn new(
        config: ProxyConfig,
        transport: Arc<dyn SchedulerTransport>,
        agent: Arc<dyn DataTransferAgent>,
    ) -> Result<Self> {
        let store = PersistentAwaitedJobStore::new(
            config.store_dir(),
            config.session_name(),
            config.compact_after(),
        )?;
        let tracker = JobTracker::new(store, Arc::clone(&agent), config.remove_drained_jobs());
        let pool = TransferPool::new(config.effective_max_threads());

        debug!(
            session = %config.session_name(),
            store_dir = ?config.store_dir(),
            max_threads = pool.max_threads(),
            "smart proxy created"
        );

        Ok(Self {
            inner: Arc::new(ProxyInner {
                config,
                tracker,
                transport,
                agent,
                listeners: ListenerSet::new(),
                pool,
                initialized: AtomicBool::new(false),
                terminated: AtomicBool::new(false),
                pump: Mutex::new(None),
            }),
        })
    }

    /// Load the tracked jobs, subscribe to scheduler events and reconcile.
    ///
    /// Returns once reconciliation has run over every tracked job.
    pub async fn init(&self) -> Result<()> {
        if self.is_terminated() {
            return Err(ProxyError::Terminated);
        }

        self.inner.tracker.load_jobs()?;
        let notifications = self.inner.transport.subscribe(PROXY_EVENTS).await?;
        self.start_pump(notifications);
        self.inner.initialized.store(true, Ordering::SeqCst);

        self.sync_awaited_jobs().await?;
        info!(session = %self.inner.tracker.session_name(), "smart proxy initialized");
        Ok(())
    }

    /// Stop receiving events and drop the scheduler connection. Tracked jobs
    /// stay loaded.
    pub async fn disconnect(&self) -> Result<()> {
        self.stop_pump();
        self.inner.transport.disconnect().await?;
        info!("disconnected from scheduler");
        Ok(())
    }

    /// Disconnect, then run [`init`](Self::init) again.
    pub async fn reconnect(&self) -> Result<()> {
        if let Err(e) = self.disconnect().await {
            warn!(error = %e, "disconnect before reconnect failed");
        }
        self.init().await
    }

    pub fn is_connected(&self) -> bool {
        self.inner.transport.is_connected()
    }

    /// Close the store and stop event delivery. The proxy cannot be used
    /// afterwards. Transfers already running are not cancelled.
    pub fn terminate(&self) {
        if self.inner.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_pump();
        self.inner.listeners.clear();
        self.inner.tracker.close();
        info!(
            in_flight = self.inner.pool.in_flight(),
            "smart proxy terminated"
        );
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Select the session whose jobs this proxy tracks. Only allowed before
    /// [`init`](Self::init).
    pub fn set_session_name(&self, name: &str) -> Result<()> {
        self.inner.tracker.set_session_name(name)
    }

    pub fn session_name(&self) -> String {
        self.inner.tracker.session_name()
    }

    /// Delete the session's files. The store must not be loaded (before
    /// `init` or after `terminate`).
    pub fn clean_database(&self) -> Result<()> {
        self.inner.tracker.clean_database()
    }

    /// Stop tracking a job, keeping its remote data.
    pub fn discard_job(&self, job_id: &str) -> Result<Option<AwaitedJob>> {
        self.inner.tracker.discard_job(job_id)
    }

    pub fn discard_all_jobs(&self) -> Result<()> {
        self.inner.tracker.discard_all_jobs()
    }

    pub fn awaited_job(&self, job_id: &str) -> Result<Option<AwaitedJob>> {
        self.inner.tracker.awaited_job(job_id)
    }

    pub fn awaited_job_ids(&self) -> Result<Vec<JobId>> {
        self.inner.tracker.awaited_job_ids()
    }

    /// Returns `false` if the listener was already registered.
    pub fn add_event_listener(&self, listener: Arc<dyn ProxyEventListener>) -> bool {
        self.inner.listeners.add(listener)
    }

    pub fn remove_event_listener(&self, listener: &Arc<dyn ProxyEventListener>) -> bool {
        self.inner.listeners.remove(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.inner.config
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.inner.tracker
    }

    pub fn transfer_pool(&self) -> &TransferPool {
        &self.inner.pool
    }

    fn check_initialized(&self) -> Result<()> {
        if self.is_terminated() {
            return Err(ProxyError::Terminated);
        }
        if !self.is_initialized() {
            return Err(ProxyError::NotInitialized);
        }
        Ok(())
    }

    /// Spawn the task delivering scheduler notifications, replacing any
    /// previous one.
    ///
    /// The task only holds a weak reference so that dropping every
    /// `ProxyCore` ends it.
    fn start_pump(&self, mut notifications: mpsc::Receiver<SchedulerNotification>) {
        let weak: Weak<ProxyInner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            while let Some(notification) = notifications.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                ProxyCore { inner }.dispatch(notification).await;
            }
            debug!("scheduler notification stream ended");
        });

        let previous = self
            .inner
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn stop_pump(&self) {
        let handle = self
            .inner
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for ProxyCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCore")
            .field("session", &self.inner.tracker.session_name())
            .field("initialized", &self.is_initialized())
            .field("terminated", &self.is_terminated())
            .field("listeners", &self.inner.listeners)
            .field("pool", &self.inner.pool)
            .finish_non_exhaustive()
    }
}

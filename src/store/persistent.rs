// src/store/persistent.rs

//! Durable job id -> `AwaitedJob` map, scoped to a named session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, warn};

use crate::config::is_valid_session_name;
use crate::errors::{ProxyError, Result};
use crate::store::journal::{self, Journal};
use crate::store::record::JournalRecord;
use crate::tracking::AwaitedJob;
use crate::types::JobId;

/// Crash-recoverable store of awaited jobs.
///
/// A single read-write lock guards both the in-memory map and the journal
/// handle:
/// - `get`, `keys`, `len` take the read lock and run concurrently;
/// - every mutation takes the write lock, appends to the journal and syncs
///   it, and only then updates the in-memory map.
///
/// A failed commit therefore leaves the map untouched and is returned to the
/// caller.
#[derive(Debug)]
pub struct PersistentAwaitedJobStore {
    dir: PathBuf,
    compact_after: usize,
    state: RwLock<StoreState>,
}

#[derive(Debug)]
struct StoreState {
    session: String,
    journal: Option<Journal>,
    jobs: HashMap<JobId, AwaitedJob>,
}

impl StoreState {
    fn journal_mut(&mut self) -> Result<&mut Journal> {
        self.journal.as_mut().ok_or(ProxyError::StoreClosed)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.journal.is_none() {
            return Err(ProxyError::StoreClosed);
        }
        Ok(())
    }
}

impl PersistentAwaitedJobStore {
    /// Create a closed store for `session` under `dir`. Call [`load`](Self::load)
    /// before use.
    pub fn new(dir: impl Into<PathBuf>, session: &str, compact_after: usize) -> Result<Self> {
        if !is_valid_session_name(session) {
            return Err(ProxyError::InvalidSessionName(session.to_string()));
        }
        Ok(Self {
            dir: dir.into(),
            compact_after: compact_after.max(1),
            state: RwLock::new(StoreState {
                session: session.to_string(),
                journal: None,
                jobs: HashMap::new(),
            }),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn session_name(&self) -> String {
        self.read().session.clone()
    }

    /// Path of the journal for the current session.
    pub fn journal_path(&self) -> PathBuf {
        journal::journal_path(&self.dir, &self.read().session)
    }

    /// Change the session. Must happen before [`load`](Self::load).
    pub fn set_session_name(&self, name: &str) -> Result<()> {
        if !is_valid_session_name(name) {
            return Err(ProxyError::InvalidSessionName(name.to_string()));
        }
        let mut state = self.write();
        if state.journal.is_some() {
            return Err(ProxyError::SessionAlreadyOpen(state.session.clone()));
        }
        state.session = name.to_string();
        debug!(session = %name, "session name set");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.read().journal.is_some()
    }

    /// Open the session's journal and replay it. Does nothing if already open.
    ///
    /// If the journal cannot be read back, all files of the session are
    /// deleted and opening is attempted once more; a second failure is
    /// returned. Transferring flags left by a previous process are cleared
    /// and the cleared state is committed before the store opens.
    pub fn load(&self) -> Result<()> {
        let mut state = self.write();
        if state.journal.is_some() {
            return Ok(());
        }

        let session = state.session.clone();
        let (mut journal, mut jobs) = match Journal::open(&self.dir, &session) {
            Ok(opened) => opened,
            Err(e) => {
                error!(
                    session = %session,
                    error = %e,
                    "could not read awaited job journal; deleting session files and retrying"
                );
                let deleted = journal::delete_session_files(&self.dir, &session)?;
                warn!(session = %session, deleted, "awaited job session wiped");
                Journal::open(&self.dir, &session)?
            }
        };

        // Nothing is in flight right after loading: flags found on disk were
        // left by a process that stopped mid-download.
        let stale: usize = jobs.values_mut().map(AwaitedJob::clear_transferring).sum();
        if stale > 0 {
            journal.rewrite(jobs.values())?;
            warn!(session = %session, tasks = stale, "cleared stale transferring flags");
        }

        info!(
            session = %session,
            jobs = jobs.len(),
            "awaited job store loaded"
        );
        state.journal = Some(journal);
        state.jobs = jobs;
        Ok(())
    }

    pub fn get(&self, job_id: &str) -> Result<Option<AwaitedJob>> {
        let state = self.read();
        state.ensure_open()?;
        Ok(state.jobs.get(job_id).cloned())
    }

    pub fn contains(&self, job_id: &str) -> Result<bool> {
        let state = self.read();
        state.ensure_open()?;
        Ok(state.jobs.contains_key(job_id))
    }

    /// Snapshot of all tracked job ids, sorted.
    pub fn keys(&self) -> Result<Vec<JobId>> {
        let state = self.read();
        state.ensure_open()?;
        let mut keys: Vec<JobId> = state.jobs.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    pub fn len(&self) -> Result<usize> {
        let state = self.read();
        state.ensure_open()?;
        Ok(state.jobs.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Store `job` under `job_id` and commit.
    ///
    /// Rejected without touching the store when `job.job_id != job_id`.
    /// Writing a value equal to the stored one is a no-op.
    pub fn put(&self, job_id: &str, job: AwaitedJob) -> Result<()> {
        if job.job_id != job_id {
            return Err(ProxyError::JobIdMismatch {
                key: job_id.to_string(),
                job_id: job.job_id,
            });
        }

        let mut state = self.write();
        state.ensure_open()?;
        if state.jobs.get(job_id) == Some(&job) {
            return Ok(());
        }

        state.journal_mut()?.append(&JournalRecord::put(job.clone()))?;
        state.jobs.insert(job_id.to_string(), job);
        self.maybe_compact(&mut state);
        Ok(())
    }

    /// Read-modify-commit of one job under the write lock.
    ///
    /// Returns `None` when the job is not tracked. The closure may not change
    /// the job id.
    pub fn update<R>(&self, job_id: &str, f: impl FnOnce(&mut AwaitedJob) -> R) -> Result<Option<R>> {
        let mut state = self.write();
        state.ensure_open()?;

        let Some(current) = state.jobs.get(job_id) else {
            return Ok(None);
        };
        let mut updated = current.clone();
        let out = f(&mut updated);

        if updated.job_id != job_id {
            return Err(ProxyError::JobIdMismatch {
                key: job_id.to_string(),
                job_id: updated.job_id,
            });
        }
        if state.jobs.get(job_id) == Some(&updated) {
            return Ok(Some(out));
        }

        state.journal_mut()?.append(&JournalRecord::put(updated.clone()))?;
        state.jobs.insert(job_id.to_string(), updated);
        self.maybe_compact(&mut state);
        Ok(Some(out))
    }

    /// Atomically mark a task as transferring.
    ///
    /// Returns `true` only for the caller that flipped the flag; `false` if
    /// the task is unknown or a transfer is already in flight.
    pub fn begin_transfer(&self, job_id: &str, task_name: &str) -> Result<bool> {
        let won = self.update(job_id, |job| match job.awaited_task_mut(task_name) {
            Some(task) if !task.transferring => {
                task.transferring = true;
                true
            }
            _ => false,
        })?;
        Ok(won.unwrap_or(false))
    }

    /// Remove a job record and commit. Returns the removed record.
    pub fn remove(&self, job_id: &str) -> Result<Option<AwaitedJob>> {
        let mut state = self.write();
        state.ensure_open()?;
        if !state.jobs.contains_key(job_id) {
            return Ok(None);
        }

        state.journal_mut()?.append(&JournalRecord::remove(job_id))?;
        let removed = state.jobs.remove(job_id);
        self.maybe_compact(&mut state);
        Ok(removed)
    }

    /// Stop tracking a job without any remote cleanup.
    pub fn discard_job(&self, job_id: &str) -> Result<Option<AwaitedJob>> {
        let removed = self.remove(job_id)?;
        if removed.is_some() {
            info!(job_id = %job_id, "discarded awaited job");
        }
        Ok(removed)
    }

    /// Stop tracking every job of the session.
    pub fn discard_all_jobs(&self) -> Result<()> {
        let mut state = self.write();
        state.ensure_open()?;
        if state.jobs.is_empty() {
            return Ok(());
        }

        state.journal_mut()?.append(&JournalRecord::clear())?;
        let count = state.jobs.len();
        state.jobs.clear();
        self.maybe_compact(&mut state);
        info!(count, "discarded all awaited jobs");
        Ok(())
    }

    /// Release the journal handle. Further reads and writes fail until the
    /// next [`load`](Self::load).
    pub fn close(&self) {
        let mut state = self.write();
        if state.journal.take().is_some() {
            state.jobs.clear();
            debug!(session = %state.session, "awaited job store closed");
        }
    }

    /// Delete all files of the session. The store must be closed.
    pub fn clean_database(&self) -> Result<()> {
        let state = self.read();
        if state.journal.is_some() {
            return Err(ProxyError::StoreNotClosed);
        }
        let deleted = journal::delete_session_files(&self.dir, &state.session)?;
        info!(session = %state.session, deleted, "awaited job database cleaned");
        Ok(())
    }

    fn maybe_compact(&self, state: &mut StoreState) {
        let live = state.jobs.len();
        let Some(journal) = state.journal.as_mut() else {
            return;
        };
        let records = journal.records();
        if records <= self.compact_after || records <= 2 * live {
            return;
        }
        if let Err(e) = journal.rewrite(state.jobs.values()) {
            // The journal is still complete; compaction is retried on a later write.
            warn!(error = %e, records, live, "journal compaction failed");
        }
    }
}

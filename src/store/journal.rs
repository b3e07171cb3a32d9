// src/store/journal.rs

//! Append-only journal file backing one session.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::{ProxyError, Result};
use crate::store::record::{decode_line, encode_line, JournalOp, JournalRecord};
use crate::tracking::AwaitedJob;
use crate::types::JobId;

/// Suffix of the journal file: `<store_dir>/<session>.journal`.
pub const JOURNAL_SUFFIX: &str = "journal";

/// Suffix of the temporary file used while compacting.
pub const COMPACT_SUFFIX: &str = "journal.compact";

pub fn journal_path(dir: &Path, session: &str) -> PathBuf {
    dir.join(format!("{session}.{JOURNAL_SUFFIX}"))
}

fn compact_path(dir: &Path, session: &str) -> PathBuf {
    dir.join(format!("{session}.{COMPACT_SUFFIX}"))
}

/// Open handle on a session journal.
#[derive(Debug)]
pub struct Journal {
    dir: PathBuf,
    session: String,
    file: File,
    /// Number of records currently in the file (live or superseded).
    records: usize,
}

impl Journal {
    /// Open (or create) the journal of `session` and replay it.
    ///
    /// Every record is decoded, so a corrupted or incompatible file fails
    /// here rather than on a later read. A last line that lacks its newline
    /// and does not verify is a torn append and gets truncated away.
    pub fn open(dir: &Path, session: &str) -> Result<(Journal, HashMap<JobId, AwaitedJob>)> {
        fs::create_dir_all(dir)?;
        let path = journal_path(dir, session);

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProxyError::CorruptedStore(format!("reading {path:?}: {e}")))?;

        let mut jobs = HashMap::new();
        let mut records = 0usize;
        let mut valid_len = 0usize;
        let mut unterminated_tail = false;

        for chunk in contents.split_inclusive('\n') {
            let terminated = chunk.ends_with('\n');
            let line = chunk.trim_end_matches(['\n', '\r']);

            if line.trim().is_empty() {
                valid_len += chunk.len();
                continue;
            }

            match decode_line(line) {
                Ok(record) => {
                    apply(&mut jobs, record.op);
                    records += 1;
                    valid_len += chunk.len();
                    unterminated_tail = !terminated;
                }
                Err(e) if !terminated => {
                    warn!(
                        path = ?path,
                        error = %e,
                        "dropping torn record at end of journal"
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if valid_len < contents.len() {
            file.set_len(valid_len as u64)?;
            file.sync_data()?;
        }
        if unterminated_tail {
            file.write_all(b"\n")?;
            file.sync_data()?;
        }

        debug!(
            path = ?path,
            records,
            jobs = jobs.len(),
            "replayed awaited job journal"
        );

        Ok((
            Journal {
                dir: dir.to_path_buf(),
                session: session.to_string(),
                file,
                records,
            },
            jobs,
        ))
    }

    pub fn records(&self) -> usize {
        self.records
    }

    /// Append one record and sync it to disk.
    pub fn append(&mut self, record: &JournalRecord) -> Result<()> {
        let line = encode_line(record)?;
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.records += 1;
        Ok(())
    }

    /// Replace the journal with one `put` per live job.
    ///
    /// The new contents are written and synced to a side file first, then
    /// renamed over the journal, so a crash leaves either file intact.
    pub fn rewrite<'a>(&mut self, jobs: impl IntoIterator<Item = &'a AwaitedJob>) -> Result<()> {
        let tmp = compact_path(&self.dir, &self.session);
        let target = journal_path(&self.dir, &self.session);

        // The handle on the side file becomes the journal handle, so once the
        // rename succeeds nothing else can fail.
        let mut out = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        let mut count = 0usize;
        for job in jobs {
            out.write_all(encode_line(&JournalRecord::put(job.clone()))?.as_bytes())?;
            count += 1;
        }
        out.flush()?;
        out.sync_all()?;
        fs::rename(&tmp, &target)?;

        self.file = out;
        info!(
            session = %self.session,
            before = self.records,
            after = count,
            "compacted awaited job journal"
        );
        self.records = count;
        Ok(())
    }
}

/// Apply a replayed operation to the in-memory map.
pub fn apply(jobs: &mut HashMap<JobId, AwaitedJob>, op: JournalOp) {
    match op {
        JournalOp::Put { job } => {
            jobs.insert(job.job_id.clone(), job);
        }
        JournalOp::Remove { job_id } => {
            jobs.remove(&job_id);
        }
        JournalOp::Clear => jobs.clear(),
    }
}

/// All files in `dir` that belong to `session` (`<session>.*`).
pub fn session_files(dir: &Path, session: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let prefix = format!("{session}.");
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(&prefix) && entry.path().is_file() {
            files.push(entry.path());
        }
    }
    Ok(files)
}

/// Delete every file belonging to `session`.
pub fn delete_session_files(dir: &Path, session: &str) -> Result<usize> {
    let files = session_files(dir, session)?;
    for path in &files {
        fs::remove_file(path)?;
        debug!(path = ?path, "deleted session file");
    }
    Ok(files.len())
}

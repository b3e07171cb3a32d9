// src/store/record.rs

//! Versioned journal records and their line encoding.
//!
//! Each journal line is `<blake3-hex> <payload-json>\n`, where the hash is
//! computed over the payload bytes. The payload always carries a `version`
//! so that newer builds can keep reading older journals.

use serde::{Deserialize, Serialize};

use crate::errors::{ProxyError, Result};
use crate::tracking::AwaitedJob;
use crate::types::JobId;

/// Highest record version this build can read (and the one it writes).
pub const CURRENT_VERSION: u32 = 1;

/// One mutation of the awaited-job map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalOp {
    Put { job: AwaitedJob },
    Remove { job_id: JobId },
    Clear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub version: u32,
    #[serde(flatten)]
    pub op: JournalOp,
}

impl JournalRecord {
    pub fn new(op: JournalOp) -> Self {
        Self {
            version: CURRENT_VERSION,
            op,
        }
    }

    pub fn put(job: AwaitedJob) -> Self {
        Self::new(JournalOp::Put { job })
    }

    pub fn remove(job_id: impl Into<JobId>) -> Self {
        Self::new(JournalOp::Remove {
            job_id: job_id.into(),
        })
    }

    pub fn clear() -> Self {
        Self::new(JournalOp::Clear)
    }
}

/// Encode a record as a complete journal line, trailing newline included.
pub fn encode_line(record: &JournalRecord) -> Result<String> {
    let payload = serde_json::to_string(record)?;
    let checksum = blake3::hash(payload.as_bytes()).to_hex();
    Ok(format!("{checksum} {payload}\n"))
}

/// Decode one journal line (without its trailing newline).
pub fn decode_line(line: &str) -> Result<JournalRecord> {
    let (checksum, payload) = line
        .split_once(' ')
        .ok_or_else(|| ProxyError::CorruptedStore("journal line without checksum".to_string()))?;

    let actual = blake3::hash(payload.as_bytes()).to_hex();
    if actual.as_str() != checksum {
        return Err(ProxyError::CorruptedStore(format!(
            "checksum mismatch (expected {checksum}, computed {actual})"
        )));
    }

    // Check the version before decoding the body so that records written by a
    // newer build are reported as such instead of as a shape mismatch.
    let value: serde_json::Value = serde_json::from_str(payload)?;
    let version = value
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| ProxyError::CorruptedStore("record without version".to_string()))?;
    let version = u32::try_from(version).unwrap_or(u32::MAX);
    if version > CURRENT_VERSION {
        return Err(ProxyError::UnsupportedRecordVersion {
            found: version,
            supported: CURRENT_VERSION,
        });
    }

    Ok(serde_json::from_value(value)?)
}

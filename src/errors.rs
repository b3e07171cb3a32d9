// src/errors.rs

//! Crate-wide error type and helpers.
//!
//! Variants are grouped by who raises them:
//! - the remote scheduler (connection, permission, submission, unknown ids)
//! - the data-transfer layer
//! - the proxy's own lifecycle and argument checks
//! - the persistent store

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Not connected to the scheduler: {0}")]
    NotConnected(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Submission closed: {0}")]
    SubmissionClosed(String),

    #[error("Job creation failed: {0}")]
    JobCreation(String),

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Unknown task '{task}' in job {job_id}")]
    UnknownTask { job_id: String, task: String },

    #[error("Data transfer failed: {0}")]
    Transfer(String),

    #[error("The job {0} is unknown or has been removed")]
    JobNotTracked(String),

    #[error("Transfer of output files for job {0} is handled automatically")]
    AutomaticTransferEnabled(String),

    #[error("The job {0} does not define a local output folder; provide one explicitly")]
    NoOutputFolder(String),

    #[error("The proxy has not been initialized")]
    NotInitialized,

    #[error("The proxy has been terminated and cannot be used any more")]
    Terminated,

    #[error("Invalid session name '{0}': only alphanumeric characters are allowed")]
    InvalidSessionName(String),

    #[error("Session '{0}' is already open; set the session name before loading")]
    SessionAlreadyOpen(String),

    #[error("The job store is closed")]
    StoreClosed,

    #[error("The job store must be closed before its files can be deleted")]
    StoreNotClosed,

    #[error("Record for job {job_id} cannot be stored under key {key}")]
    JobIdMismatch { key: String, job_id: String },

    #[error("Corrupted job store: {0}")]
    CorruptedStore(String),

    #[error("Unsupported record version {found} (this build reads up to {supported})")]
    UnsupportedRecordVersion { found: u32, supported: u32 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProxyError {
    /// The connection to the scheduler was lost; the operation may succeed on
    /// a later attempt.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, ProxyError::NotConnected(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ProxyError::PermissionDenied(_))
    }

    /// The scheduler does not know the job (or one of its tasks).
    pub fn is_unknown(&self) -> bool {
        matches!(
            self,
            ProxyError::UnknownJob(_) | ProxyError::UnknownTask { .. }
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProxyError>;

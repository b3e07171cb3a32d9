// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::LogLevel;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [session]
/// name = "default"
/// store_dir = ".smartproxy"
///
/// [transfer]
/// max_threads = 0
///
/// [tracking]
/// remove_drained_jobs = false
///
/// [store]
/// compact_after = 512
///
/// [log]
/// level = "info"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawProxyConfig {
    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub transfer: TransferSection,

    #[serde(default)]
    pub tracking: TrackingSection,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub log: LogSection,
}

/// Validated configuration. Built from [`RawProxyConfig`] via `TryFrom`.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    session: SessionSection,
    transfer: TransferSection,
    tracking: TrackingSection,
    store: StoreSection,
    log: LogSection,
}

impl ProxyConfig {
    pub(crate) fn new_unchecked(raw: RawProxyConfig) -> Self {
        Self {
            session: raw.session,
            transfer: raw.transfer,
            tracking: raw.tracking,
            store: raw.store,
            log: raw.log,
        }
    }

    /// Default configuration with journal files kept under `store_dir`.
    pub fn for_store_dir(store_dir: impl Into<PathBuf>) -> Self {
        let mut raw = RawProxyConfig::default();
        raw.session.store_dir = store_dir.into();
        Self::new_unchecked(raw)
    }

    pub fn session_name(&self) -> &str {
        &self.session.name
    }

    pub fn store_dir(&self) -> &Path {
        &self.session.store_dir
    }

    /// User name embedded in remote folder names.
    ///
    /// Falls back to `$USER` / `$USERNAME`, then `"anonymous"`.
    pub fn effective_user(&self) -> String {
        self.session
            .user
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    /// Size of the transfer worker pool. `0` means three per available core.
    pub fn effective_max_threads(&self) -> usize {
        if self.transfer.max_threads > 0 {
            return self.transfer.max_threads;
        }
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        3 * cores
    }

    pub fn remove_drained_jobs(&self) -> bool {
        self.tracking.remove_drained_jobs
    }

    pub fn compact_after(&self) -> usize {
        self.store.compact_after
    }

    pub fn log_level(&self) -> LogLevel {
        self.log.level
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new_unchecked(RawProxyConfig::default())
    }
}

/// `[session]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    /// Alphanumeric session name; selects the journal files so that several
    /// proxies can share one `store_dir`.
    #[serde(default = "default_session_name")]
    pub name: String,

    /// Directory holding the journal files.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Overrides the user name used in remote folder names.
    #[serde(default)]
    pub user: Option<String>,
}

fn default_session_name() -> String {
    "default".to_string()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".smartproxy")
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            name: default_session_name(),
            store_dir: default_store_dir(),
            user: None,
        }
    }
}

/// `[transfer]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TransferSection {
    /// Maximum number of concurrent output downloads; `0` picks a default
    /// from the number of available cores.
    #[serde(default)]
    pub max_threads: usize,
}

/// `[tracking]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TrackingSection {
    /// Remove a job record as soon as its last awaited task is removed.
    ///
    /// Off by default: drained jobs stay tracked until discarded.
    #[serde(default)]
    pub remove_drained_jobs: bool,
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    /// Number of journal records after which the journal is rewritten
    /// with only the live jobs.
    #[serde(default = "default_compact_after")]
    pub compact_after: usize,
}

fn default_compact_after() -> usize {
    512
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            compact_after: default_compact_after(),
        }
    }
}

/// `[log]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogSection {
    #[serde(default)]
    pub level: LogLevel,
}

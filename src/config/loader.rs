// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ProxyConfig, RawProxyConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawProxyConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawProxyConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawProxyConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ProxyConfig> {
    let raw_config = load_from_path(&path)?;
    ProxyConfig::try_from(raw_config)
}

/// Default config location: `SmartProxy.toml` in the current directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("SmartProxy.toml")
}

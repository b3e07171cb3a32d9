// src/config/validate.rs

use crate::config::model::{ProxyConfig, RawProxyConfig};
use crate::errors::{ProxyError, Result};

impl TryFrom<RawProxyConfig> for ProxyConfig {
    type Error = ProxyError;

    fn try_from(raw: RawProxyConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ProxyConfig::new_unchecked(raw))
    }
}

/// Session names end up in file names, so only ASCII alphanumerics pass.
pub fn is_valid_session_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

fn validate_raw_config(cfg: &RawProxyConfig) -> Result<()> {
    validate_session(cfg)?;
    validate_store(cfg)?;
    Ok(())
}

fn validate_session(cfg: &RawProxyConfig) -> Result<()> {
    if !is_valid_session_name(&cfg.session.name) {
        return Err(ProxyError::InvalidSessionName(cfg.session.name.clone()));
    }
    if cfg.session.store_dir.as_os_str().is_empty() {
        return Err(ProxyError::ConfigError(
            "[session].store_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_store(cfg: &RawProxyConfig) -> Result<()> {
    if cfg.store.compact_after == 0 {
        return Err(ProxyError::ConfigError(
            "[store].compact_after must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

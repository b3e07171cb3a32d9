// src/config/mod.rs

//! Configuration loading and validation for the smart proxy.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants like session naming (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    LogSection, ProxyConfig, RawProxyConfig, SessionSection, StoreSection, TrackingSection,
    TransferSection,
};
pub use validate::is_valid_session_name;

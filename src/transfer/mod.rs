// src/transfer/mod.rs

//! Moving data between local folders and the remote data spaces.
//!
//! - [`agent`] defines the `DataTransferAgent` port.
//! - [`pool`] bounds how many downloads run at once.
//! - [`selector`] compiles task file patterns.
//! - [`local`] implements the port for `file:` spaces.

pub mod agent;
pub mod local;
pub mod pool;
pub mod selector;

pub use agent::DataTransferAgent;
pub use local::LocalSpaceAgent;
pub use pool::TransferPool;
pub use selector::FileSelector;

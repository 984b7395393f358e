pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod processors;
pub mod readers;
pub mod store;
pub mod utils;

pub use config::SyncConfig;
pub use error::{Result, SyncError};

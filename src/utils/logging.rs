//! Tracing subscriber setup for the CLI.
//!
//! `RUST_LOG` always wins; otherwise the level is `info`, or `debug` with
//! `--verbose`. When a log file is given, output goes there instead of stderr.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Result, SyncError};

pub fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("station_sync={level},warn")))
}

pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let builder = fmt()
        .with_env_filter(default_filter(verbose))
        .with_target(false)
        .with_thread_ids(verbose);

    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| SyncError::Config(format!("Failed to install log subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert!(default_filter(false).to_string().contains("station_sync=info"));
        assert!(default_filter(true).to_string().contains("station_sync=debug"));
    }
}

//! Diagnostic logging setup.
//!
//! Diagnostics never share the terminal with the conversation unless asked
//! for. `--log <file>` appends to that file; otherwise a set `RUST_LOG`
//! sends them to stderr, and the default is `threadchat.log` in the data
//! directory. The level comes from `RUST_LOG` and defaults to `warn`.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::core::config::data::path_display;

pub const DEFAULT_FILTER: &str = "warn";
pub const LOG_FILE_NAME: &str = "threadchat.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

/// Pick where diagnostics go. An explicit path wins, then `RUST_LOG` being
/// set selects stderr, then the data directory. With no data directory
/// there is nowhere quiet to write, so stderr is used.
pub fn choose_target(
    explicit: Option<&Path>,
    rust_log_set: bool,
    data_dir: Option<&Path>,
) -> LogTarget {
    if let Some(path) = explicit {
        return LogTarget::File(path.to_path_buf());
    }
    if rust_log_set {
        return LogTarget::Stderr;
    }
    match data_dir {
        Some(dir) => LogTarget::File(dir.join(LOG_FILE_NAME)),
        None => LogTarget::Stderr,
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn open_log_file(path: &Path, create_parent: bool) -> io::Result<fs::File> {
    if create_parent {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber. Calling this twice is harmless; the
/// second call leaves the first subscriber in place.
///
/// `create_parent` is set for the default data-directory log, which may not
/// exist yet on first run. An explicit `--log` path is opened as given.
pub fn init(target: &LogTarget, create_parent: bool) -> io::Result<()> {
    match target {
        LogTarget::File(path) => {
            let file = open_log_file(path, create_parent)?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file))
                .try_init();
            tracing::info!(log_file = %path_display(path), "logging initialized");
        }
        LogTarget::Stderr => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(io::stderr)
                .try_init();
        }
    }
    Ok(())
}

//! Logging setup
//!
//! Three sinks share one subscriber: the console (filtered by verbosity or
//! `RUST_LOG`), `logs/archiver.log` with everything at INFO and above, and
//! `logs/error.log` with errors only. Both files live under the output root
//! and are appended to across sessions.

use crate::output::LOGS_DIR;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const INFO_LOG: &str = "archiver.log";
pub const ERROR_LOG: &str = "error.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Cannot open log file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Logging already initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Where the log files ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub info: PathBuf,
    pub error: PathBuf,
}

impl LogPaths {
    pub fn under(output_root: &Path) -> Self {
        let dir = output_root.join(LOGS_DIR);
        Self {
            info: dir.join(INFO_LOG),
            error: dir.join(ERROR_LOG),
        }
    }
}

/// Console filter for a verbosity level; `RUST_LOG` wins when set
pub fn console_filter(verbosity: u8, quiet: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    if quiet {
        return EnvFilter::new("error");
    }

    match verbosity {
        0 => EnvFilter::new("site_archiver=info,warn"),
        1 => EnvFilter::new("site_archiver=debug,info"),
        2 => EnvFilter::new("site_archiver=trace,debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Installs the global subscriber with console and file sinks
///
/// Creates `<output_root>/logs/` if needed.
pub fn init_logging(
    output_root: &Path,
    verbosity: u8,
    quiet: bool,
) -> Result<LogPaths, LoggingError> {
    let paths = LogPaths::under(output_root);
    let info_file = open_log(&paths.info)?;
    let error_file = open_log(&paths.error)?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(console_filter(verbosity, quiet)),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(info_file))
                .with_filter(LevelFilter::INFO),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(error_file))
                .with_filter(LevelFilter::ERROR),
        )
        .try_init()?;

    Ok(paths)
}

fn open_log(path: &Path) -> Result<File, LoggingError> {
    let io_error = |source| LoggingError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_paths_under_root() {
        let paths = LogPaths::under(Path::new("/tmp/archive"));
        assert_eq!(paths.info, Path::new("/tmp/archive/logs/archiver.log"));
        assert_eq!(paths.error, Path::new("/tmp/archive/logs/error.log"));
    }

    #[test]
    fn test_open_log_creates_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deep").join("logs").join(ERROR_LOG);

        open_log(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_log_fails_under_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let err = open_log(&blocker.join("logs").join(INFO_LOG)).unwrap_err();
        assert!(matches!(err, LoggingError::Io { .. }));
    }

    #[test]
    fn test_errors_reach_error_log() {
        let dir = TempDir::new().unwrap();
        let paths = init_logging(dir.path(), 0, true).unwrap();

        tracing::info!("archived a page");
        tracing::error!("failed to archive a page");

        let info = std::fs::read_to_string(&paths.info).unwrap();
        let errors = std::fs::read_to_string(&paths.error).unwrap();
        assert!(info.contains("archived a page"));
        assert!(info.contains("failed to archive a page"));
        assert!(errors.contains("failed to archive a page"));
        assert!(!errors.contains("archived a page\n"));
    }
}

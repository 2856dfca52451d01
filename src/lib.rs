//! Site-Archiver: offline snapshots of a single website
//!
//! This crate crawls one in-scope site and freezes every page into a
//! self-contained file: images, stylesheets, scripts and icons are inlined as
//! data, dynamic content is realized through a headless browser when one is
//! available, and the results land under a deterministic path layout.

pub mod config;
pub mod crawler;
pub mod logging;
pub mod output;
pub mod render;
pub mod rewriter;
pub mod transcode;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Site-Archiver operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Render error: {0}")]
    Render(#[from] render::RenderError),

    #[error("Write error: {0}")]
    Write(#[from] output::WriteError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Cannot initialize output storage at {}: {source}", path.display())]
    OutputInit {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Worker pool failure: {0}")]
    WorkerPool(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Returns true for faults that prevent the session from running at all
    pub fn is_session_fault(&self) -> bool {
        matches!(
            self,
            Self::OutputInit { .. } | Self::WorkerPool(_) | Self::Config(_) | Self::Client(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for Site-Archiver operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{ArchiveSummary, Coordinator, StopHandle};
pub use url::{map_url_to_path, CrawlTarget};

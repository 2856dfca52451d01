//! Configuration module for Site-Archiver
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so an archive can run without any file at all.
//!
//! # Example
//!
//! ```no_run
//! use site_archiver::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("archiver.toml")).unwrap();
//! println!("Archiving with {} workers", config.crawler.threads);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ImageConfig, OutputConfig, RendererConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

//! URL handling module for Site-Archiver
//!
//! This module provides the crawl target and its scope rules, reference
//! resolution against a page URL, and the deterministic URL → file path
//! mapping used by the snapshot writer.

mod path_map;
mod resolve;

use crate::{UrlError, UrlResult};
use url::Url;

// Re-export main functions
pub use path_map::{map_url_to_path, path_for_url};
pub use resolve::{resolve_reference, strip_fragment};

/// Extensions that are never fetched or embedded unless configured otherwise
pub const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &["pdf", "zip", "exe"];

/// The site being archived: an origin URL plus the textual scope prefix
///
/// A crawl target is immutable for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct CrawlTarget {
    origin: Url,
    scope_prefix: String,
    excluded_extensions: Vec<String>,
}

impl CrawlTarget {
    /// Creates a target whose scope prefix is the origin itself
    ///
    /// # Examples
    ///
    /// ```
    /// use site_archiver::url::CrawlTarget;
    ///
    /// let target = CrawlTarget::new("https://example.com").unwrap();
    /// assert!(target.is_in_scope("https://example.com/x"));
    /// assert!(!target.is_in_scope("https://other.com/x"));
    /// ```
    pub fn new(origin: &str) -> UrlResult<Self> {
        let origin = parse_http_url(origin)?;
        let scope_prefix = default_prefix(&origin);

        Ok(Self {
            origin,
            scope_prefix,
            excluded_extensions: DEFAULT_EXCLUDED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        })
    }

    /// Replaces the scope prefix (must itself be an http(s) URL)
    pub fn with_scope_prefix(mut self, prefix: &str) -> UrlResult<Self> {
        let parsed = parse_http_url(prefix)?;
        self.scope_prefix = if prefix.ends_with('/') {
            parsed.to_string()
        } else {
            default_prefix(&parsed)
        };
        Ok(self)
    }

    /// Replaces the list of excluded file extensions (case-insensitive, no dot)
    pub fn with_excluded_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn scope_prefix(&self) -> &str {
        &self.scope_prefix
    }

    /// Returns true if the URL is textually prefixed by the scope prefix and
    /// lives on the origin's host and port
    pub fn is_in_scope(&self, url: &str) -> bool {
        if !url.starts_with(&self.scope_prefix) {
            return false;
        }

        match Url::parse(url) {
            Ok(parsed) => {
                parsed.host_str() == self.origin.host_str()
                    && parsed.port_or_known_default() == self.origin.port_or_known_default()
            }
            Err(_) => false,
        }
    }

    /// Returns true if the URL path ends in one of the excluded extensions
    pub fn is_excluded(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };

        let last_segment = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("");

        match last_segment.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_lowercase();
                self.excluded_extensions.iter().any(|excluded| *excluded == ext)
            }
            _ => false,
        }
    }

    /// Returns true if the URL may be fetched or embedded at all
    pub fn is_eligible(&self, url: &str) -> bool {
        self.is_in_scope(url) && !self.is_excluded(url)
    }
}

/// Parses a URL, accepting only http and https
fn parse_http_url(input: &str) -> UrlResult<Url> {
    let url = Url::parse(input.trim()).map_err(|e| UrlError::Parse(format!("{}: {}", input, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost(input.to_string()));
    }

    Ok(strip_fragment(url))
}

/// Bare origins compare without the trailing slash the parser adds
fn default_prefix(url: &Url) -> String {
    let serialized = url.to_string();
    if url.path() == "/" && url.query().is_none() {
        serialized.trim_end_matches('/').to_string()
    } else {
        serialized
    }
}

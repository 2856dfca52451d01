//! Crawler module for fetching and archiving pages
//!
//! This module contains the core crawl logic, including:
//! - HTTP fetching with a session-wide resource cache
//! - HTML parsing and link extraction
//! - The shared frontier and session state
//! - Overall archive coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod session;

pub use coordinator::{ArchiveSummary, Coordinator, ProgressCallback};
pub use fetcher::{build_http_client, FetchError, Fetched, ResourceFetcher};
pub use frontier::Frontier;
pub use parser::{count_loading_placeholders, parse_html, ParsedPage};
pub use session::{CaptureRecord, Session, StopHandle};

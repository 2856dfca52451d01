//! Integration tests for Site-Archiver
//!
//! Each module drives a full archive session against wiremock servers and
//! inspects the snapshot left on disk.

mod capture_tests;
mod crawl_tests;
mod support;

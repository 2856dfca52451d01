//! Headless rendering for pages that build their content with script
//!
//! This module handles:
//! - The `Renderer` capability: navigate, evaluate script, read the network
//!   log and the final document
//! - A Chromium implementation driven over the DevTools protocol
//! - A deterministic stub used by tests
//! - The bridge that runs the capture protocol and degrades to plain
//!   fetching when no renderer is usable

mod bridge;
mod chromium;
mod scripts;
mod stub;

pub use bridge::RendererBridge;
pub use chromium::ChromiumRenderer;
pub use scripts::{INSTALL_REQUEST_TRACKERS, NETWORK_LOG, QUIESCENCE_CHECK};
pub use stub::StubRenderer;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while driving a renderer
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// The renderer cannot be used for the rest of the session
    #[error("Renderer unavailable: {0}")]
    Unavailable(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Failed to read document: {0}")]
    Document(String),
}

/// One resource request observed by the renderer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkRecord {
    pub url: String,
    /// What started the request (`xmlhttprequest`, `fetch`, `img`, ...)
    #[serde(default)]
    pub initiator: String,
}

impl NetworkRecord {
    pub fn new(url: impl Into<String>, initiator: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            initiator: initiator.into(),
        }
    }

    /// Returns true for requests issued by page script
    pub fn is_async(&self) -> bool {
        self.initiator.eq_ignore_ascii_case("xmlhttprequest")
            || self.initiator.eq_ignore_ascii_case("fetch")
    }
}

/// A headless browser session that can realize one page at a time
#[async_trait]
pub trait Renderer: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, RenderError>;

    /// Requests the current page has issued so far
    async fn network_log(&mut self) -> Result<Vec<NetworkRecord>, RenderError>;

    /// Serialized DOM of the current page
    async fn document(&mut self) -> Result<String, RenderError>;

    /// Polls until no script-issued requests are pending
    ///
    /// Returns `Ok(false)` if `timeout` passes first.
    async fn wait_for_quiescence(
        &mut self,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<bool, RenderError> {
        let poll = async {
            loop {
                let idle = self.evaluate(QUIESCENCE_CHECK).await?;
                if idle.as_bool().unwrap_or(false) {
                    return Ok::<(), RenderError>(());
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result.map(|()| true),
            Err(_) => Ok(false),
        }
    }

    async fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_initiators() {
        assert!(NetworkRecord::new("https://example.com/api", "xmlhttprequest").is_async());
        assert!(NetworkRecord::new("https://example.com/api", "Fetch").is_async());
        assert!(!NetworkRecord::new("https://example.com/a.png", "img").is_async());
    }

    #[test]
    fn test_network_record_deserializes_without_initiator() {
        let record: NetworkRecord =
            serde_json::from_value(serde_json::json!({ "url": "https://example.com/x" })).unwrap();
        assert_eq!(record.initiator, "");
        assert!(!record.is_async());
    }

    #[tokio::test]
    async fn test_quiescence_times_out() {
        let mut renderer = StubRenderer::new()
            .with_page("https://example.com/", "<html></html>")
            .never_quiescent();
        renderer.navigate("https://example.com/").await.unwrap();

        let idle = renderer
            .wait_for_quiescence(Duration::from_millis(50), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(!idle);
    }

    #[tokio::test]
    async fn test_quiescence_reached() {
        let mut renderer = StubRenderer::new().with_page("https://example.com/", "<html></html>");
        renderer.navigate("https://example.com/").await.unwrap();

        let idle = renderer
            .wait_for_quiescence(Duration::from_secs(1), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(idle);
    }
}

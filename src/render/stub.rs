//! Deterministic renderer for tests and browserless runs

use crate::render::{NetworkRecord, RenderError, Renderer, QUIESCENCE_CHECK};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Serves canned documents and network logs keyed by URL
///
/// Navigating to a URL without a canned page fails, which makes the
/// archiver fall back to a plain fetch for that URL.
#[derive(Debug, Clone)]
pub struct StubRenderer {
    pages: HashMap<String, String>,
    network: HashMap<String, Vec<NetworkRecord>>,
    quiescent: bool,
    unavailable: bool,
    current: Option<String>,
    navigations: Arc<Mutex<Vec<String>>>,
}

impl Default for StubRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl StubRenderer {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            network: HashMap::new(),
            quiescent: true,
            unavailable: false,
            current: None,
            navigations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Adds a request to the network log seen while `page_url` is loaded
    pub fn with_request(mut self, page_url: impl Into<String>, record: NetworkRecord) -> Self {
        self.network.entry(page_url.into()).or_default().push(record);
        self
    }

    /// Makes every quiescence check report pending requests
    pub fn never_quiescent(mut self) -> Self {
        self.quiescent = false;
        self
    }

    /// Makes every navigation report the browser as gone
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Shared log of every URL navigated to, in order
    pub fn navigations(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.navigations)
    }

    fn current_page(&self) -> Result<&str, RenderError> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .map(String::as_str)
            .ok_or_else(|| RenderError::Document("no page loaded".to_string()))
    }
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        if self.unavailable {
            return Err(RenderError::Unavailable("browser closed".to_string()));
        }

        if !self.pages.contains_key(url) {
            self.current = None;
            return Err(RenderError::Navigation {
                url: url.to_string(),
                message: "no canned page".to_string(),
            });
        }

        self.current = Some(url.to_string());
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, RenderError> {
        self.current_page()?;
        if script == QUIESCENCE_CHECK {
            return Ok(serde_json::Value::Bool(self.quiescent));
        }
        Ok(serde_json::Value::Bool(true))
    }

    async fn network_log(&mut self) -> Result<Vec<NetworkRecord>, RenderError> {
        Ok(self
            .current
            .as_ref()
            .and_then(|url| self.network.get(url))
            .cloned()
            .unwrap_or_default())
    }

    async fn document(&mut self) -> Result<String, RenderError> {
        self.current_page().map(str::to_string)
    }

    async fn shutdown(&mut self) {
        self.current = None;
    }
}

//! Capture protocol and graceful degradation
//!
//! One renderer context serves the whole session behind a lock. A URL the
//! renderer cannot realize falls back to a plain fetch; a renderer that is
//! gone altogether disables dynamic capture for the rest of the session.

use crate::config::RendererConfig;
use crate::crawler::{count_loading_placeholders, ResourceFetcher, Session};
use crate::render::{ChromiumRenderer, RenderError, Renderer, INSTALL_REQUEST_TRACKERS};
use crate::url::resolve_reference;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

#[derive(Debug, Clone, Copy)]
struct CaptureTiming {
    settle: Duration,
    quiescence_timeout: Duration,
    poll_interval: Duration,
}

impl From<&RendererConfig> for CaptureTiming {
    fn from(config: &RendererConfig) -> Self {
        Self {
            settle: Duration::from_millis(config.settle_ms),
            quiescence_timeout: Duration::from_secs(config.quiescence_timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        }
    }
}

/// Drives the session's renderer, if there is one
pub struct RendererBridge {
    renderer: Option<Mutex<Box<dyn Renderer>>>,
    enabled: AtomicBool,
    timing: CaptureTiming,
}

impl RendererBridge {
    /// A bridge that never renders; every URL takes the plain fetch path
    pub fn disabled() -> Self {
        Self {
            renderer: None,
            enabled: AtomicBool::new(false),
            timing: CaptureTiming::from(&RendererConfig::default()),
        }
    }

    pub fn new(renderer: Box<dyn Renderer>, config: &RendererConfig) -> Self {
        Self {
            renderer: Some(Mutex::new(renderer)),
            enabled: AtomicBool::new(true),
            timing: CaptureTiming::from(config),
        }
    }

    /// Starts a Chromium renderer, degrading to a disabled bridge on failure
    pub async fn launch(config: &RendererConfig) -> Self {
        if !config.enabled {
            tracing::info!("Dynamic capture disabled by configuration");
            return Self::disabled();
        }

        match ChromiumRenderer::launch(config).await {
            Ok(renderer) => {
                tracing::info!("Headless browser initialized");
                Self::new(Box::new(renderer), config)
            }
            Err(e) => {
                tracing::error!("Failed to initialize headless browser: {}", e);
                tracing::warn!("Continuing without dynamic content capture");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.renderer.is_some() && self.enabled.load(Ordering::SeqCst)
    }

    /// Realizes a page in the renderer
    ///
    /// Returns `None` when the caller should fall back to a plain fetch.
    /// Script-issued responses seen along the way are recorded in the
    /// session's capture record.
    pub async fn capture(
        &self,
        url: &str,
        session: &Session,
        fetcher: &ResourceFetcher,
    ) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let mut renderer = self.renderer.as_ref()?.lock().await;

        match self.drive(&mut **renderer, url, session, fetcher).await {
            Ok(html) if !html.trim().is_empty() => Some(html),
            Ok(_) => {
                tracing::warn!("Renderer returned an empty document for {}", url);
                None
            }
            Err(RenderError::Unavailable(reason)) => {
                tracing::error!("Headless browser unavailable, disabling dynamic capture: {}", reason);
                self.enabled.store(false, Ordering::SeqCst);
                None
            }
            Err(e) => {
                tracing::error!("Error capturing dynamic content for {}: {}", url, e);
                None
            }
        }
    }

    async fn drive(
        &self,
        renderer: &mut dyn Renderer,
        url: &str,
        session: &Session,
        fetcher: &ResourceFetcher,
    ) -> Result<String, RenderError> {
        renderer.navigate(url).await?;
        tokio::time::sleep(self.timing.settle).await;

        match renderer
            .wait_for_quiescence(self.timing.quiescence_timeout, self.timing.poll_interval)
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Timeout waiting for dynamic content on {}", url),
            Err(e) => tracing::warn!("Could not check pending requests on {}: {}", url, e),
        }

        if let Err(e) = renderer.evaluate(INSTALL_REQUEST_TRACKERS).await {
            tracing::warn!("Failed to install request trackers on {}: {}", url, e);
        }

        record_async_responses(renderer, url, session, fetcher).await;

        let html = renderer.document().await?;

        let placeholders = count_loading_placeholders(&html);
        if placeholders > 0 {
            tracing::warn!(
                "Found {} potentially unloaded elements on {}",
                placeholders,
                url
            );
        }

        Ok(html)
    }

    /// Closes the renderer; later captures all fall back
    pub async fn shutdown(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        if let Some(renderer) = &self.renderer {
            renderer.lock().await.shutdown().await;
        }
    }
}

/// Fetches same-scope, script-issued responses into the capture record
async fn record_async_responses(
    renderer: &mut dyn Renderer,
    page_url: &str,
    session: &Session,
    fetcher: &ResourceFetcher,
) {
    let records = match renderer.network_log().await {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("Failed to read network log for {}: {}", page_url, e);
            return;
        }
    };

    let Ok(base) = Url::parse(page_url) else {
        return;
    };

    let targets: BTreeSet<String> = records
        .iter()
        .filter(|record| record.is_async())
        .filter_map(|record| resolve_reference(&base, &record.url))
        .map(|url| url.to_string())
        .filter(|url| {
            session.target().is_eligible(url) && !session.is_visited(url) && !is_script_url(url)
        })
        .collect();

    let results = join_all(targets.iter().map(|url| fetcher.fetch_shared(url))).await;

    for (url, result) in targets.iter().zip(results) {
        match result {
            Ok(fetched) => {
                session.record_capture(url.clone(), fetched.text());
                tracing::info!("Captured dynamic response: {}", url);
            }
            Err(e) => tracing::error!("Error capturing dynamic content from {}: {}", url, e),
        }
    }
}

fn is_script_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase().ends_with(".js"))
        .unwrap_or(false)
}

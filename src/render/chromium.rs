//! Chromium renderer over the DevTools protocol

use crate::config::RendererConfig;
use crate::render::{NetworkRecord, RenderError, Renderer, NETWORK_LOG};
use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

/// One browser with a single reused tab
pub struct ChromiumRenderer {
    browser: Browser,
    page: Option<Page>,
    handler: JoinHandle<()>,
}

impl ChromiumRenderer {
    /// Launches a local headless Chromium, or connects to a running one when
    /// `remote_debugging_url` is set
    pub async fn launch(config: &RendererConfig) -> Result<Self, RenderError> {
        let request_timeout = Duration::from_secs(config.page_load_timeout_secs);

        let remote = config
            .remote_debugging_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());

        let (browser, mut handler) = match remote {
            Some(url) => {
                tracing::info!("Connecting to remote browser at {}", url);
                Browser::connect(url).await.map_err(|e| {
                    RenderError::Unavailable(format!("Failed to connect to remote browser: {}", e))
                })?
            }
            None => {
                let browser_config = BrowserConfig::builder()
                    .no_sandbox()
                    .request_timeout(request_timeout)
                    .window_size(1920, 1080)
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage")
                    .build()
                    .map_err(|e| RenderError::Unavailable(e.to_string()))?;

                Browser::launch(browser_config)
                    .await
                    .map_err(|e| RenderError::Unavailable(e.to_string()))?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser event error: {}", e);
                }
            }
        });

        Ok(Self {
            browser,
            page: None,
            handler,
        })
    }

    async fn page(&mut self) -> Result<&Page, RenderError> {
        if self.page.is_none() {
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| RenderError::Unavailable(format!("Failed to open tab: {}", e)))?;
            self.page = Some(page);
        }

        self.page
            .as_ref()
            .ok_or_else(|| RenderError::Unavailable("tab closed".to_string()))
    }

    fn loaded_page(&self) -> Result<&Page, RenderError> {
        self.page
            .as_ref()
            .ok_or_else(|| RenderError::Document("no page loaded".to_string()))
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        let page = self.page().await?;
        page.goto(url).await.map_err(|e| {
            if is_connection_lost(&e) {
                RenderError::Unavailable(format!("Browser connection lost: {}", e))
            } else {
                RenderError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, RenderError> {
        let result = self
            .loaded_page()?
            .evaluate(script)
            .await
            .map_err(|e| {
                if is_connection_lost(&e) {
                    RenderError::Unavailable(format!("Browser connection lost: {}", e))
                } else {
                    RenderError::Script(e.to_string())
                }
            })?;

        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn network_log(&mut self) -> Result<Vec<NetworkRecord>, RenderError> {
        let entries = self.evaluate(NETWORK_LOG).await?;
        serde_json::from_value(entries).map_err(|e| RenderError::Script(e.to_string()))
    }

    async fn document(&mut self) -> Result<String, RenderError> {
        self.loaded_page()?
            .content()
            .await
            .map_err(|e| {
                if is_connection_lost(&e) {
                    RenderError::Unavailable(format!("Browser connection lost: {}", e))
                } else {
                    RenderError::Document(e.to_string())
                }
            })
    }

    async fn shutdown(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!("Failed to close tab: {}", e);
            }
        }
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        self.handler.abort();
    }
}

/// True when the error means the browser process or its socket is gone
fn is_connection_lost(error: &CdpError) -> bool {
    matches!(
        error,
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chromiumoxide::error::ChannelError;
    use futures::channel::oneshot::Canceled;

    #[test]
    fn test_closed_channel_is_connection_lost() {
        assert!(is_connection_lost(&CdpError::ChannelSendError(
            ChannelError::Canceled(Canceled)
        )));
        assert!(is_connection_lost(&CdpError::NoResponse));
    }

    #[test]
    fn test_page_errors_are_not_connection_lost() {
        assert!(!is_connection_lost(&CdpError::Timeout));
        assert!(!is_connection_lost(&CdpError::msg("net::ERR_NAME_NOT_RESOLVED")));
    }
}

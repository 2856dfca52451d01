//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the archiver, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Fetching pages (once each, gated by the visited set)
//! - Fetching embedded resources through a session-wide cache so each URL
//!   hits the network at most once
//! - Error classification into status, timeout and network failures

use crate::config::UserAgentConfig;
use dashmap::DashMap;
use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Distinguishable failure of one fetch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

/// A successfully fetched resource
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value, if present and non-empty
    pub content_type: Option<String>,
    /// Raw body
    pub body: Vec<u8>,
}

impl Fetched {
    /// The media type without parameters, lowercased
    pub fn mime_type(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .and_then(|value| value.split(';').next())
            .map(|mime| mime.trim().to_ascii_lowercase())
            .filter(|mime| !mime.is_empty())
    }

    /// Returns true if the body should be treated as an HTML page
    pub fn is_html(&self) -> bool {
        match self.mime_type() {
            Some(mime) => mime == "text/html" || mime == "application/xhtml+xml",
            None => {
                let head = String::from_utf8_lossy(&self.body[..self.body.len().min(256)])
                    .trim_start()
                    .to_ascii_lowercase();
                head.starts_with("<!doctype html") || head.starts_with("<html")
            }
        }
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Builds an HTTP client with proper configuration
///
/// Every request carries `timeout`, which turns a hang into a page- or
/// reference-scoped failure.
///
/// # Example
///
/// ```
/// use site_archiver::config::UserAgentConfig;
/// use site_archiver::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

type CachedFetch = Arc<OnceCell<Result<Arc<Fetched>, FetchError>>>;

/// Fetches pages and embedded resources for one session
pub struct ResourceFetcher {
    client: Client,
    cache: Option<DashMap<String, CachedFetch>>,
}

impl ResourceFetcher {
    /// Creates a fetcher; with `cache_resources` set, `fetch_shared` results
    /// (successes and failures) are kept for the rest of the session
    pub fn new(client: Client, cache_resources: bool) -> Self {
        Self {
            client,
            cache: cache_resources.then(DashMap::new),
        }
    }

    /// Fetches a URL, bypassing the resource cache
    ///
    /// Non-success statuses are errors.
    pub async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        Ok(Fetched {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    }

    /// Fetches an embedded resource at most once per session
    ///
    /// Concurrent callers for the same URL share one request.
    pub async fn fetch_shared(&self, url: &str) -> Result<Arc<Fetched>, FetchError> {
        let Some(cache) = &self.cache else {
            return self.fetch(url).await.map(Arc::new);
        };

        let cell = Arc::clone(
            cache
                .entry(url.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );

        cell.get_or_init(|| async { self.fetch(url).await.map(Arc::new) })
            .await
            .clone()
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(cache: bool) -> ResourceFetcher {
        let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(1)).unwrap();
        ResourceFetcher::new(client, cache)
    }

    fn fetched(content_type: Option<&str>, body: &str) -> Fetched {
        Fetched {
            url: "https://example.com/".to_string(),
            status: 200,
            content_type: content_type.map(str::to_string),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_mime_type_strips_parameters() {
        let page = fetched(Some("Text/HTML; charset=utf-8"), "");
        assert_eq!(page.mime_type().as_deref(), Some("text/html"));
        assert!(page.is_html());
    }

    #[test]
    fn test_non_html_content_type() {
        assert!(!fetched(Some("image/png"), "<html>").is_html());
        assert!(!fetched(Some("text/css"), "body{}").is_html());
    }

    #[test]
    fn test_missing_content_type_sniffs_markup() {
        assert!(fetched(None, "  <!DOCTYPE html><html></html>").is_html());
        assert!(!fetched(None, "plain text").is_html());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/style.css"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("body { color: red; }", "text/css"),
            )
            .mount(&server)
            .await;

        let result = fetcher(false)
            .fetch(&format!("{}/style.css", server.uri()))
            .await
            .unwrap();

        assert_eq!(result.status, 200);
        assert_eq!(result.mime_type().as_deref(), Some("text/css"));
        assert_eq!(result.text(), "body { color: red; }");
    }

    #[tokio::test]
    async fn test_fetch_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let result = fetcher(false).fetch(&url).await;

        assert_eq!(result.unwrap_err(), FetchError::Status { url, status: 404 });
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let result = fetcher(false).fetch(&format!("{}/slow", server.uri())).await;
        assert!(matches!(result.unwrap_err(), FetchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let result = fetcher(false).fetch("http://127.0.0.1:1/").await;
        assert!(matches!(result.unwrap_err(), FetchError::Network { .. }));
    }

    #[tokio::test]
    async fn test_shared_fetch_hits_network_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher(true);
        let url = format!("{}/logo.png", server.uri());

        let (a, b) = tokio::join!(fetcher.fetch_shared(&url), fetcher.fetch_shared(&url));
        let c = fetcher.fetch_shared(&url).await;

        assert_eq!(a.unwrap().body, vec![1, 2, 3]);
        assert_eq!(b.unwrap().body, vec![1, 2, 3]);
        assert_eq!(c.unwrap().body, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_shared_fetch_remembers_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher(true);
        let url = format!("{}/broken.css", server.uri());

        assert!(fetcher.fetch_shared(&url).await.is_err());
        assert!(fetcher.fetch_shared(&url).await.is_err());
    }

    #[tokio::test]
    async fn test_uncached_shared_fetch_goes_to_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x"))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = fetcher(false);
        let url = format!("{}/a.js", server.uri());

        fetcher.fetch_shared(&url).await.unwrap();
        fetcher.fetch_shared(&url).await.unwrap();
    }
}

use serde::Deserialize;

/// Main configuration structure for Site-Archiver
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub renderer: RendererConfig,
    pub images: ImageConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent workers
    pub threads: u32,

    /// Timeout applied to every network fetch (seconds)
    pub request_timeout_secs: u64,

    /// Longest a worker waits on an empty frontier before rechecking (milliseconds)
    pub claim_timeout_ms: u64,

    /// File extensions that are never fetched or embedded
    pub excluded_extensions: Vec<String>,

    /// Enqueue in-scope links discovered on saved pages
    pub follow_links: bool,

    /// Share fetched embedded resources across pages of one session
    pub cache_resources: bool,

    /// Optional scope prefix narrower than the origin
    pub scope_prefix: Option<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            threads: 5,
            request_timeout_secs: 30,
            claim_timeout_ms: 500,
            excluded_extensions: crate::url::DEFAULT_EXCLUDED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            follow_links: true,
            cache_resources: true,
            scope_prefix: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "site-archiver".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        format!("{}/{}", self.crawler_name, self.crawler_version)
    }
}

/// Headless renderer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RendererConfig {
    /// Whether dynamic capture is attempted at all
    pub enabled: bool,

    /// Fixed wait after navigation before polling for quiescence (milliseconds)
    pub settle_ms: u64,

    /// Upper bound on the quiescence poll (seconds)
    pub quiescence_timeout_secs: u64,

    /// Interval between quiescence checks (milliseconds)
    pub poll_interval_ms: u64,

    /// Navigation timeout handed to the browser (seconds)
    pub page_load_timeout_secs: u64,

    /// Connect to an already running browser instead of launching one
    pub remote_debugging_url: Option<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_ms: 2000,
            quiescence_timeout_secs: 10,
            poll_interval_ms: 250,
            page_load_timeout_secs: 30,
            remote_debugging_url: None,
        }
    }
}

/// Image transcoding configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImageConfig {
    /// Whether oversized images are re-encoded before inlining
    pub compress: bool,

    /// Size budget for an inlined image (KiB)
    pub max_size_kb: u64,

    /// First JPEG quality tried
    pub start_quality: u8,

    /// Amount the quality drops per attempt
    pub quality_step: u8,

    /// Lowest quality ever tried
    pub min_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            compress: true,
            max_size_kb: 500,
            start_quality: 95,
            quality_step: 5,
            min_quality: 30,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Root directory of the snapshot
    pub root: String,

    /// HTML larger than this is written gzip-compressed (KiB)
    pub html_compress_threshold_kb: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: "website_archives".to_string(),
            html_compress_threshold_kb: 100,
        }
    }
}

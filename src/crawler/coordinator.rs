//! Crawl coordinator - worker pool and per-page pipeline
//!
//! This module contains the archive loop that ties everything together:
//! - Initializing output storage and the renderer
//! - Seeding the frontier and running a fixed pool of workers
//! - Driving each URL through render/fetch, rewrite and write
//! - Progress reporting and cooperative stop

use crate::config::Config;
use crate::crawler::{
    build_http_client, parse_html, Frontier, ResourceFetcher, Session, StopHandle,
};
use crate::output::SnapshotWriter;
use crate::render::{Renderer, RendererBridge};
use crate::rewriter::ResourceRewriter;
use crate::transcode::{ImageTranscoder, TranscodeSettings};
use crate::url::CrawlTarget;
use crate::{ArchiveError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Called after every page attempt with (visited count, URL)
pub type ProgressCallback = Arc<dyn Fn(usize, &str) + Send + Sync>;

/// Outcome of one archive session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// URLs claimed and processed (success or failure)
    pub pages_visited: usize,
    pub pages_failed: usize,
    /// Entries in the dynamic capture record at the end
    pub captures: usize,
    pub elapsed: Duration,
}

/// Everything a worker needs, shared by the whole pool
struct ArchiveContext {
    session: Arc<Session>,
    frontier: Frontier,
    fetcher: Arc<ResourceFetcher>,
    bridge: RendererBridge,
    rewriter: ResourceRewriter,
    writer: SnapshotWriter,
    follow_links: bool,
    claim_timeout: Duration,
    progress: Option<ProgressCallback>,
}

/// Main archive coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    context: Arc<ArchiveContext>,
}

impl Coordinator {
    /// Creates a coordinator that renders with headless Chromium
    ///
    /// A browser that fails to start only disables dynamic capture.
    ///
    /// # Errors
    ///
    /// * `ArchiveError::OutputInit` - the output root can't be created
    /// * `ArchiveError::Client` - the HTTP client can't be built
    pub async fn new(target: CrawlTarget, config: Config) -> Result<Self> {
        let writer = init_writer(&config)?;
        let bridge = RendererBridge::launch(&config.renderer).await;
        Self::assemble(target, config, writer, bridge)
    }

    /// Creates a coordinator with a caller-supplied renderer
    pub fn with_renderer(
        target: CrawlTarget,
        config: Config,
        renderer: Box<dyn Renderer>,
    ) -> Result<Self> {
        let writer = init_writer(&config)?;
        let bridge = if config.renderer.enabled {
            RendererBridge::new(renderer, &config.renderer)
        } else {
            RendererBridge::disabled()
        };
        Self::assemble(target, config, writer, bridge)
    }

    /// Creates a coordinator that only ever fetches
    pub fn without_renderer(target: CrawlTarget, config: Config) -> Result<Self> {
        let writer = init_writer(&config)?;
        Self::assemble(target, config, writer, RendererBridge::disabled())
    }

    fn assemble(
        target: CrawlTarget,
        config: Config,
        writer: SnapshotWriter,
        bridge: RendererBridge,
    ) -> Result<Self> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout_secs),
        )?;
        let fetcher = Arc::new(ResourceFetcher::new(client, config.crawler.cache_resources));

        let transcoder = config
            .images
            .compress
            .then(|| ImageTranscoder::new(TranscodeSettings::from(&config.images)));

        let mut target = target.with_excluded_extensions(&config.crawler.excluded_extensions);
        if let Some(prefix) = &config.crawler.scope_prefix {
            target = target.with_scope_prefix(prefix)?;
        }
        let session = Arc::new(Session::new(target));
        let rewriter = ResourceRewriter::new(
            session.target().clone(),
            Arc::clone(&fetcher),
            transcoder,
        );

        let context = ArchiveContext {
            session,
            frontier: Frontier::new(),
            fetcher,
            bridge,
            rewriter,
            writer,
            follow_links: config.crawler.follow_links,
            claim_timeout: Duration::from_millis(config.crawler.claim_timeout_ms),
            progress: None,
        };

        Ok(Self {
            config: Arc::new(config),
            context: Arc::new(context),
        })
    }

    /// Installs a progress callback; must be called before `run`
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, &str) + Send + Sync + 'static,
    {
        if let Some(context) = Arc::get_mut(&mut self.context) {
            context.progress = Some(Arc::new(callback));
        }
        self
    }

    /// Handle that makes workers stop claiming new URLs
    pub fn stop_handle(&self) -> StopHandle {
        self.context.session.stop_handle()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.context.session
    }

    pub fn output_root(&self) -> &std::path::Path {
        self.context.writer.root()
    }

    /// Archives the site until the frontier drains or a stop is requested
    ///
    /// Per-page failures are logged and counted; only a broken worker pool
    /// fails the session.
    pub async fn run(&self) -> Result<ArchiveSummary> {
        let start = Instant::now();
        let ctx = &self.context;
        let origin = ctx.session.target().origin().to_string();
        let threads = self.config.crawler.threads.max(1);

        tracing::info!("Starting archive of {} with {} workers", origin, threads);

        ctx.session.activate();
        ctx.frontier.enqueue(origin);

        let workers: Vec<_> = (0..threads)
            .map(|id| tokio::spawn(worker_loop(id, Arc::clone(ctx))))
            .collect();

        ctx.frontier
            .wait_drained(&ctx.session.stop_handle(), ctx.claim_timeout)
            .await;
        ctx.session.deactivate();

        let mut pool_error = None;
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker terminated abnormally: {}", e);
                pool_error.get_or_insert_with(|| ArchiveError::WorkerPool(e.to_string()));
            }
        }

        ctx.bridge.shutdown().await;

        if let Some(e) = pool_error {
            return Err(e);
        }

        let summary = ArchiveSummary {
            pages_visited: ctx.session.visited_count(),
            pages_failed: ctx.session.failed_count(),
            captures: ctx.session.capture_count(),
            elapsed: start.elapsed(),
        };

        if ctx.session.is_stopped() {
            tracing::info!("Archive stopped early, {} URLs left queued", ctx.frontier.len());
        }
        tracing::info!(
            "Archive complete: {} pages visited, {} failed, {} dynamic captures in {:?}",
            summary.pages_visited,
            summary.pages_failed,
            summary.captures,
            summary.elapsed
        );

        Ok(summary)
    }
}

fn init_writer(config: &Config) -> Result<SnapshotWriter> {
    let writer = SnapshotWriter::from_config(&config.output);
    writer
        .init()
        .map_err(|source| ArchiveError::OutputInit {
            path: writer.root().to_path_buf(),
            source,
        })?;
    Ok(writer)
}

async fn worker_loop(id: u32, ctx: Arc<ArchiveContext>) {
    tracing::debug!("Worker {} started", id);

    loop {
        if ctx.session.is_stopped() {
            break;
        }

        let Some(url) = ctx.frontier.claim(ctx.claim_timeout).await else {
            if ctx.session.is_active() {
                continue;
            }
            break;
        };

        // A claim that outlived the stop signal leaves its URL unvisited
        if ctx.session.is_stopped() {
            ctx.frontier.complete();
            break;
        }

        if ctx.session.mark_visited(&url) {
            let task_ctx = Arc::clone(&ctx);
            let task_url = url.clone();
            let outcome =
                tokio::spawn(async move { task_ctx.process_url(&task_url).await }).await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("Error processing {}: {}", url, e);
                    ctx.session.record_failure();
                }
                Err(e) => {
                    tracing::error!("Processing {} panicked: {}", url, e);
                    ctx.session.record_failure();
                }
            }

            if let Some(progress) = &ctx.progress {
                progress(ctx.session.visited_count(), &url);
            }
        }

        ctx.frontier.complete();
    }

    tracing::debug!("Worker {} finished", id);
}

impl ArchiveContext {
    /// Drives one URL through render/fetch, rewrite and write
    async fn process_url(&self, url: &str) -> Result<()> {
        let requested = Url::parse(url)?;

        let (base, html) = match self.bridge.capture(url, &self.session, &self.fetcher).await {
            Some(html) => (requested.clone(), html),
            None => {
                // Shared with the rewriter so a URL both linked and embedded is fetched once
                let fetched = self.fetcher.fetch_shared(url).await?;
                if !fetched.is_html() {
                    self.writer.write_asset(&requested, &fetched.body).await?;
                    return Ok(());
                }
                let base = Url::parse(&fetched.url).unwrap_or_else(|_| requested.clone());
                (base, fetched.text())
            }
        };

        let parsed = parse_html(&html, &base);
        if let Some(title) = &parsed.title {
            tracing::debug!("Processing page {} ({})", url, title);
        }

        if self.follow_links {
            for link in parsed.links {
                if self.session.should_enqueue(&link) {
                    self.frontier.enqueue(link);
                }
            }
        }

        let captures = self.session.captures();
        let rewritten = self.rewriter.rewrite(&base, &html, &captures).await;
        self.writer.write_page(&requested, &rewritten).await?;

        Ok(())
    }
}

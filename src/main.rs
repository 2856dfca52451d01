//! Site-Archiver main entry point
//!
//! This is the command-line interface for the Site-Archiver offline website
//! snapshot tool.

use anyhow::Context;
use clap::Parser;
use site_archiver::config::{load_config_with_hash, validate, Config};
use site_archiver::logging::init_logging;
use site_archiver::{ArchiveSummary, Coordinator, CrawlTarget};
use std::io::Write;
use std::path::PathBuf;

const PROGRESS_URL_WIDTH: usize = 50;

/// Site-Archiver: offline snapshots of a single website
///
/// Site-Archiver crawls every page under a URL prefix and saves each one as a
/// self-contained file, with images, stylesheets, scripts and icons embedded
/// and dynamically loaded data captured through a headless browser.
#[derive(Parser, Debug)]
#[command(name = "site-archiver")]
#[command(version)]
#[command(about = "Offline snapshots of a single website", long_about = None)]
struct Cli {
    /// Origin URL of the site to archive
    #[arg(value_name = "URL")]
    url: String,

    /// Output directory (overrides the config file)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Number of concurrent workers (overrides the config file)
    #[arg(short, long, value_name = "N")]
    threads: Option<u32>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Only archive URLs starting with this prefix
    #[arg(long, value_name = "PREFIX")]
    scope: Option<String>,

    /// Never launch a headless browser; fetch pages directly
    #[arg(long)]
    no_render: bool,

    /// Inline images without re-encoding them
    #[arg(long)]
    no_compress_images: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress progress and non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Loads the config file, if any, and layers the command-line flags over it
    ///
    /// Also returns the hash of the config file when one was given.
    fn resolve_config(&self) -> anyhow::Result<(Config, Option<String>)> {
        let (mut config, hash) = match &self.config {
            Some(path) => {
                let (config, hash) = load_config_with_hash(path).with_context(|| {
                    format!("Failed to load configuration from {}", path.display())
                })?;
                (config, Some(hash))
            }
            None => (Config::default(), None),
        };

        if let Some(output) = &self.output {
            config.output.root = output.to_string_lossy().into_owned();
        }
        if let Some(threads) = self.threads {
            config.crawler.threads = threads;
        }
        if let Some(scope) = &self.scope {
            config.crawler.scope_prefix = Some(scope.clone());
        }
        if self.no_render {
            config.renderer.enabled = false;
        }
        if self.no_compress_images {
            config.images.compress = false;
        }

        validate(&config).context("Invalid command-line options")?;
        Ok((config, hash))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let (config, config_hash) = match cli.resolve_config() {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let output_root = PathBuf::from(&config.output.root);
    let log_paths = match init_logging(&output_root, cli.verbose, cli.quiet) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("Error: cannot set up logging: {}", e);
            std::process::exit(1);
        }
    };

    if let (Some(path), Some(hash)) = (&cli.config, &config_hash) {
        tracing::info!("Configuration loaded from {} (hash: {})", path.display(), hash);
    }

    match archive(&cli, config).await {
        Ok(summary) => {
            if !cli.quiet {
                println!();
                println!(
                    "✓ Archived {} pages ({} failed) in {:.1}s",
                    summary.pages_visited,
                    summary.pages_failed,
                    summary.elapsed.as_secs_f64()
                );
                println!("  Output: {}", output_root.display());
                println!("  Log:    {}", log_paths.info.display());
                println!("  Errors: {}", log_paths.error.display());
            }
        }
        Err(e) => {
            tracing::error!("Archive failed: {:#}", e);
            eprintln!();
            eprintln!("Error: {:#}", e);
            eprintln!("See {} for details", log_paths.error.display());
            std::process::exit(1);
        }
    }
}

/// Runs one archive session, stopping early on Ctrl-C
async fn archive(cli: &Cli, config: Config) -> anyhow::Result<ArchiveSummary> {
    let target = CrawlTarget::new(&cli.url)
        .with_context(|| format!("Invalid URL: {}", cli.url))?;

    tracing::info!(
        "Archiving {} (scope: {}) into {}",
        target.origin(),
        config
            .crawler
            .scope_prefix
            .as_deref()
            .unwrap_or_else(|| target.scope_prefix()),
        config.output.root
    );

    let quiet = cli.quiet;
    let coordinator = Coordinator::new(target, config)
        .await?
        .with_progress(move |count, url| {
            if !quiet {
                print_progress(count, url);
            }
        });

    let stop = coordinator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            stop.stop();
        }
    });

    Ok(coordinator.run().await?)
}

fn print_progress(count: usize, url: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(
        stdout,
        "\rPages archived: {} | Current: {:<width$}",
        count,
        truncate_url(url, PROGRESS_URL_WIDTH),
        width = PROGRESS_URL_WIDTH
    );
    let _ = stdout.flush();
}

fn truncate_url(url: &str, width: usize) -> String {
    if url.chars().count() <= width {
        return url.to_string();
    }
    let kept: String = url.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

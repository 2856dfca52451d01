//! Snapshot persistence
//!
//! Pages and assets are written under the output root at the path given by
//! the URL path mapper. Large HTML is gzip-compressed and written with a
//! `.gz` suffix instead of the plain file.

use crate::config::OutputConfig;
use crate::output::{WriteError, WriteResult};
use crate::url::path_for_url;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

/// Name of the log directory under the output root
pub const LOGS_DIR: &str = "logs";

/// Where site content under a top-level `logs/` path is saved instead
const RELOCATED_LOGS_DIR: &str = "_logs";

/// Where a page or asset ended up on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub path: PathBuf,
    pub compressed: bool,
}

/// Writes rewritten pages and raw assets under the output root
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    root: PathBuf,
    compress_threshold: usize,
}

impl SnapshotWriter {
    /// Creates a writer; HTML whose UTF-8 length exceeds `compress_threshold`
    /// bytes is stored gzip-compressed
    pub fn new(root: impl Into<PathBuf>, compress_threshold: usize) -> Self {
        Self {
            root: root.into(),
            compress_threshold,
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(
            &config.root,
            (config.html_compress_threshold_kb as usize).saturating_mul(1024),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    /// Creates the output root and its log directory
    ///
    /// Called once per session; a failure here means the session can't run.
    pub fn init(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.logs_dir())
    }

    /// Absolute path a URL maps to under the output root
    ///
    /// The log directory is reserved: a site path whose first segment is
    /// `logs` lands under `_logs` instead.
    pub fn target_path(&self, url: &Url) -> PathBuf {
        let relative = path_for_url(url);
        relative
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
            .enumerate()
            .fold(self.root.clone(), |path, (index, segment)| {
                if index == 0 && segment.eq_ignore_ascii_case(LOGS_DIR) {
                    path.join(RELOCATED_LOGS_DIR)
                } else {
                    path.join(segment)
                }
            })
    }

    /// Writes rewritten HTML, compressing it when it exceeds the threshold
    ///
    /// Exactly one of `<path>` and `<path>.gz` exists afterwards.
    pub async fn write_page(&self, url: &Url, html: &str) -> WriteResult<SavedFile> {
        let plain = self.target_path(url);
        let gz = gz_path(&plain);

        let saved = if html.len() > self.compress_threshold {
            let compressed = gzip(html.as_bytes()).map_err(|source| WriteError::Io {
                path: gz.clone(),
                source,
            })?;
            write_file(&gz, &compressed).await?;
            remove_stale(&plain).await?;
            SavedFile {
                path: gz,
                compressed: true,
            }
        } else {
            write_file(&plain, html.as_bytes()).await?;
            remove_stale(&gz).await?;
            SavedFile {
                path: plain,
                compressed: false,
            }
        };

        tracing::info!("Saved HTML page: {}", url);
        Ok(saved)
    }

    /// Writes raw asset bytes verbatim
    pub async fn write_asset(&self, url: &Url, bytes: &[u8]) -> WriteResult<SavedFile> {
        let path = self.target_path(url);
        write_file(&path, bytes).await?;

        tracing::info!("Saved asset: {}", url);
        Ok(SavedFile {
            path,
            compressed: false,
        })
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

async fn write_file(path: &Path, bytes: &[u8]) -> WriteResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| WriteError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Removes the other variant of a page left over from an earlier write
async fn remove_stale(path: &Path) -> WriteResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(WriteError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

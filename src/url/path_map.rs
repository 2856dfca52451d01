use crate::{UrlError, UrlResult};
use sha2::{Digest, Sha256};
use std::path::Path;
use url::Url;

/// File written for a directory-like URL path
const INDEX_FILE: &str = "index.html";

/// Hex characters of the query digest appended to file names
const QUERY_DIGEST_LEN: usize = 8;

/// Maps a URL string to a relative file path under the output root
///
/// # Mapping Rules
///
/// 1. Scheme, host and port are dropped
/// 2. An empty path becomes `index.html`
/// 3. A path whose last segment has no extension is a directory and gets
///    `/index.html` appended
/// 4. A non-empty query string adds `-<digest>` before the extension so
///    distinct queries map to distinct files
///
/// # Examples
///
/// ```
/// use site_archiver::url::map_url_to_path;
///
/// assert_eq!(map_url_to_path("https://example.com").unwrap(), "index.html");
/// assert_eq!(map_url_to_path("https://example.com/a/b").unwrap(), "a/b/index.html");
/// assert_eq!(map_url_to_path("https://example.com/a/b.css").unwrap(), "a/b.css");
/// ```
pub fn map_url_to_path(url: &str) -> UrlResult<String> {
    let parsed = Url::parse(url).map_err(|e| UrlError::Parse(format!("{}: {}", url, e)))?;
    Ok(path_for_url(&parsed))
}

/// Maps an already parsed URL to a relative file path
pub fn path_for_url(url: &Url) -> String {
    let path = url.path().trim_matches('/');

    let mapped = if path.is_empty() {
        INDEX_FILE.to_string()
    } else if has_extension(path) {
        path.to_string()
    } else {
        format!("{}/{}", path, INDEX_FILE)
    };

    match url.query().filter(|query| !query.is_empty()) {
        Some(query) => with_query_suffix(&mapped, query),
        None => mapped,
    }
}

/// Returns true if the last path segment carries a file extension
fn has_extension(path: &str) -> bool {
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    Path::new(last_segment).extension().is_some()
}

/// Inserts a short digest of the query before the file extension
fn with_query_suffix(path: &str, query: &str) -> String {
    let digest = hex::encode(Sha256::digest(query.as_bytes()));
    let suffix = &digest[..QUERY_DIGEST_LEN];

    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };

    let file = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, suffix, ext),
        _ => format!("{}-{}", file, suffix),
    };

    match dir {
        Some(dir) => format!("{}/{}", dir, file),
        None => file,
    }
}

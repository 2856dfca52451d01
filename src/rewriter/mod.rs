//! Resource rewriter: turns a live page into a self-contained one
//!
//! Steps run in a fixed order, each reading the markup the previous one
//! produced:
//! 1. `<img src>` becomes a `data:` URI (optionally transcoded)
//! 2. inline `<style>` blocks get their `url()` references embedded
//! 3. `<link rel=stylesheet>` becomes a `<style>` block
//! 4. `<script src>` gets the script text as its body
//! 5. icon links get a `data:` URI href
//!
//! Within a step, references are fetched concurrently. Only in-scope,
//! non-excluded references are touched; a reference that fails to fetch is
//! logged and left as it was.

mod css;
mod markup;

pub use css::{css_references, CssReference, CssSyntax};
pub use markup::{find_elements, Element, ElementKind, StartTag};

use crate::crawler::{CaptureRecord, FetchError, Fetched, ResourceFetcher};
use crate::transcode::{ImageTranscoder, TRANSCODED_CONTENT_TYPE};
use crate::url::{resolve_reference, CrawlTarget};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use markup::{escape_raw_text, insert_before_head_close, splice};
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Content type used for images when neither header nor extension tells
pub const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";

/// How deep nested stylesheets are followed through `@import`
pub const MAX_IMPORT_DEPTH: usize = 4;

/// Global the capture record is assigned to in saved pages
pub const CAPTURE_GLOBAL: &str = "window.ajaxData";

/// Why one reference could not be embedded
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Unknown content type for {0}")]
    UnknownContentType(String),
}

type Edit = (Range<usize>, String);

/// Inlines a page's in-scope resources
pub struct ResourceRewriter {
    target: CrawlTarget,
    fetcher: Arc<ResourceFetcher>,
    transcoder: Option<ImageTranscoder>,
}

impl ResourceRewriter {
    /// `transcoder` is applied to every inlined image when present
    pub fn new(
        target: CrawlTarget,
        fetcher: Arc<ResourceFetcher>,
        transcoder: Option<ImageTranscoder>,
    ) -> Self {
        Self {
            target,
            fetcher,
            transcoder,
        }
    }

    /// Rewrites `html` fetched from `base` and injects the capture record
    pub async fn rewrite(&self, base: &Url, html: &str, captures: &CaptureRecord) -> String {
        let html = self.inline_images(base, html).await;
        let html = self.inline_style_blocks(base, &html).await;
        let html = self.inline_stylesheets(base, &html).await;
        let html = self.inline_scripts(base, &html).await;
        let html = self.inline_icons(base, &html).await;
        inject_captures(html, captures)
    }

    fn eligible(&self, base: &Url, reference: &str) -> Option<Url> {
        resolve_reference(base, reference).filter(|url| self.target.is_eligible(url.as_str()))
    }

    async fn inline_images(&self, base: &Url, html: &str) -> String {
        let images = find_elements(html, ElementKind::Image);
        let edits = join_all(images.into_iter().map(|el| self.inline_image(base, el))).await;
        splice(html, edits.into_iter().flatten().collect())
    }

    async fn inline_image(&self, base: &Url, mut el: Element) -> Option<Edit> {
        let src = el.tag.attr("src")?.to_string();
        let url = self.eligible(base, &src)?;

        match self.image_data_uri(&url).await {
            Ok(uri) => {
                el.tag.set_attr("src", uri);
                tracing::info!("Processed image: {}", url);
                Some((el.range, el.tag.render()))
            }
            Err(e) => {
                tracing::error!("Error processing image {}: {}", src, e);
                None
            }
        }
    }

    async fn image_data_uri(&self, url: &Url) -> Result<String, RewriteError> {
        let fetched = self.fetcher.fetch_shared(url.as_str()).await?;
        let declared =
            content_type_of(&fetched, url).unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string());

        let transcoder = match &self.transcoder {
            Some(transcoder) if declared != "image/svg+xml" => transcoder.clone(),
            _ => return Ok(data_uri(&declared, &fetched.body)),
        };

        let original = Arc::clone(&fetched);
        let transcoded =
            tokio::task::spawn_blocking(move || transcoder.transcode(&original.body)).await;

        Ok(match transcoded {
            Ok(out) if out.is_reencoded() => data_uri(TRANSCODED_CONTENT_TYPE, &out.bytes),
            Ok(out) => data_uri(&declared, &out.bytes),
            Err(e) => {
                tracing::error!("Image transcoding task failed for {}: {}", url, e);
                data_uri(&declared, &fetched.body)
            }
        })
    }

    async fn inline_style_blocks(&self, base: &Url, html: &str) -> String {
        let blocks = find_elements(html, ElementKind::Style);
        let rewrites = blocks.into_iter().filter_map(|el| el.body).map(|body| async move {
            let css = &html[body.clone()];
            let rewritten = self.rewrite_css(css.to_string(), base.clone(), 0).await;
            (rewritten != css).then(|| (body, escape_raw_text(&rewritten)))
        });

        let edits = join_all(rewrites).await.into_iter().flatten().collect();
        splice(html, edits)
    }

    async fn inline_stylesheets(&self, base: &Url, html: &str) -> String {
        let links = find_elements(html, ElementKind::Link)
            .into_iter()
            .filter(|el| el.tag.has_rel(|t| t == "stylesheet"));
        let edits = join_all(links.map(|el| self.inline_stylesheet(base, el))).await;
        splice(html, edits.into_iter().flatten().collect())
    }

    async fn inline_stylesheet(&self, base: &Url, el: Element) -> Option<Edit> {
        let href = el.tag.attr("href")?.to_string();
        let url = self.eligible(base, &href)?;

        let fetched = match self.fetcher.fetch_shared(url.as_str()).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::error!("Error processing CSS {}: {}", href, e);
                return None;
            }
        };

        let css_base = Url::parse(&fetched.url).unwrap_or_else(|_| url.clone());
        let css = self.rewrite_css(fetched.text(), css_base, 0).await;

        let mut style = StartTag::new("style");
        if let Some(media) = el.tag.attr("media").filter(|m| !m.trim().is_empty()) {
            style.set_attr("media", media);
        }

        tracing::info!("Processed CSS: {}", url);
        Some((
            el.range,
            format!("{}{}</style>", style.render(), escape_raw_text(&css)),
        ))
    }

    /// Embeds every eligible reference in `css`, resolved against `base`
    fn rewrite_css<'a>(&'a self, css: String, base: Url, depth: usize) -> BoxFuture<'a, String> {
        async move {
            let references = css_references(&css);
            if references.is_empty() {
                return css;
            }

            let replacements =
                join_all(references.iter().map(|r| self.css_replacement(r, &base, depth))).await;

            let edits = references
                .iter()
                .zip(replacements)
                .filter_map(|(reference, replacement)| {
                    replacement.map(|text| (reference.range.clone(), text))
                })
                .collect();
            splice(&css, edits)
        }
        .boxed()
    }

    async fn css_replacement(
        &self,
        reference: &CssReference,
        base: &Url,
        depth: usize,
    ) -> Option<String> {
        let url = resolve_reference(base, &reference.target)?;
        if !self.target.is_eligible(url.as_str()) {
            return reference.fallback();
        }

        match self.css_data_uri(&url, depth).await {
            Ok(uri) => Some(format!("url(\"{}\")", uri)),
            Err(e) => {
                tracing::error!("Error processing CSS reference {}: {}", url, e);
                reference.fallback()
            }
        }
    }

    async fn css_data_uri(&self, url: &Url, depth: usize) -> Result<String, RewriteError> {
        let fetched = self.fetcher.fetch_shared(url.as_str()).await?;
        let content_type = content_type_of(&fetched, url)
            .ok_or_else(|| RewriteError::UnknownContentType(url.to_string()))?;

        if content_type == "text/css" && depth < MAX_IMPORT_DEPTH {
            let nested_base = Url::parse(&fetched.url).unwrap_or_else(|_| url.clone());
            let css = self.rewrite_css(fetched.text(), nested_base, depth + 1).await;
            return Ok(data_uri(&content_type, css.as_bytes()));
        }

        Ok(data_uri(&content_type, &fetched.body))
    }

    async fn inline_scripts(&self, base: &Url, html: &str) -> String {
        let scripts = find_elements(html, ElementKind::Script);
        let edits = join_all(scripts.into_iter().map(|el| self.inline_script(base, el))).await;
        splice(html, edits.into_iter().flatten().collect())
    }

    async fn inline_script(&self, base: &Url, mut el: Element) -> Option<Edit> {
        let src = el.tag.attr("src")?.to_string();
        let url = self.eligible(base, &src)?;

        match self.fetcher.fetch_shared(url.as_str()).await {
            Ok(fetched) => {
                el.tag.remove_attr("src");
                tracing::info!("Processed JavaScript: {}", url);
                Some((
                    el.range,
                    format!("{}{}</script>", el.tag.render(), escape_raw_text(&fetched.text())),
                ))
            }
            Err(e) => {
                tracing::error!("Error processing script {}: {}", src, e);
                None
            }
        }
    }

    async fn inline_icons(&self, base: &Url, html: &str) -> String {
        let icons = find_elements(html, ElementKind::Link)
            .into_iter()
            .filter(|el| el.tag.has_rel(|t| t == "icon" || t.ends_with("-icon")));
        let edits = join_all(icons.map(|el| self.inline_icon(base, el))).await;
        splice(html, edits.into_iter().flatten().collect())
    }

    async fn inline_icon(&self, base: &Url, mut el: Element) -> Option<Edit> {
        let href = el.tag.attr("href")?.to_string();
        let url = self.eligible(base, &href)?;

        let fetched = match self.fetcher.fetch_shared(url.as_str()).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::error!("Error processing link {}: {}", href, e);
                return None;
            }
        };

        let Some(content_type) = content_type_of(&fetched, &url) else {
            tracing::debug!("Skipping icon {} with unknown content type", url);
            return None;
        };

        el.tag.set_attr("href", data_uri(&content_type, &fetched.body));
        tracing::info!("Processed link resource: {}", url);
        Some((el.range, el.tag.render()))
    }
}

/// Response media type, else a guess from the URL path
fn content_type_of(fetched: &Fetched, url: &Url) -> Option<String> {
    fetched.mime_type().or_else(|| {
        mime_guess::from_path(url.path())
            .first()
            .map(|mime| mime.essence_str().to_string())
    })
}

fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(bytes))
}

/// Adds the capture record script before `</head>` when there is anything
/// to inject
fn inject_captures(html: String, captures: &CaptureRecord) -> String {
    if captures.is_empty() {
        return html;
    }

    let json = match serde_json::to_string(captures) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize captured responses: {}", e);
            return html;
        }
    };

    let script = format!("<script>{} = {};</script>", CAPTURE_GLOBAL, escape_raw_text(&json));
    insert_before_head_close(&html, &script).unwrap_or_else(|| {
        tracing::warn!("No closing head tag, captured responses not injected");
        html
    })
}

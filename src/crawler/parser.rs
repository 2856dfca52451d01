//! HTML parser for extracting links and page metadata
//!
//! This module handles parsing saved pages to find:
//! - Links to follow (from <a> tags and canonical links)
//! - Page title, for log lines
//! - Elements that still look like loading placeholders

use crate::url::resolve_reference;
use scraper::{Html, Selector};
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Absolute, fragment-free link targets in document order
    pub links: Vec<String>,
}

/// Parses HTML content and extracts links and the title
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">`
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` references
/// - Fragment-only references
///
/// Scope is not checked here.
///
/// # Example
///
/// ```
/// use site_archiver::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page#top">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_reference(base_url, href))
            {
                links.push(url.to_string());
            }
        }
    }

    if let Ok(link_selector) = Selector::parse("link[rel][href]") {
        for element in document.select(&link_selector) {
            let canonical = element
                .value()
                .attr("rel")
                .is_some_and(|rel| rel.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case("canonical")));
            if !canonical {
                continue;
            }
            if let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_reference(base_url, href))
            {
                links.push(url.to_string());
            }
        }
    }

    links
}

const PLACEHOLDER_MARKERS: &[&str] = &["loading", "skeleton", "placeholder"];

fn is_placeholder_class(class: &str) -> bool {
    let class = class.to_ascii_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|marker| class.contains(marker))
}

/// Counts elements whose class suggests content that never finished loading
pub fn count_loading_placeholders(html: &str) -> usize {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("[class]") else {
        return 0;
    };

    document
        .select(&selector)
        .filter(|element| {
            element
                .value()
                .attr("class")
                .is_some_and(is_placeholder_class)
        })
        .count()
}

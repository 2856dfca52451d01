use url::Url;

/// Resolves a reference found in a document against the document's URL
///
/// Returns None if the reference should be ignored:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs (already inline)
/// - empty or fragment-only references
/// - anything that doesn't resolve to an HTTP(S) URL
///
/// The fragment is dropped so that `page#a` and `page#b` dedup to one URL.
///
/// # Examples
///
/// ```
/// use site_archiver::url::resolve_reference;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/blog/post").unwrap();
/// let resolved = resolve_reference(&base, "../img/a.png#top").unwrap();
/// assert_eq!(resolved.as_str(), "https://example.com/img/a.png");
/// ```
pub fn resolve_reference(base: &Url, reference: &str) -> Option<Url> {
    let reference = reference.trim();

    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    let lowered = reference.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base.join(reference) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(strip_fragment(absolute))
        }
        _ => None,
    }
}

/// Removes the fragment component of a URL
pub fn strip_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

//! Locating external references inside CSS text

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static URL_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\(\s*['"]?([^'"()]*?)['"]?\s*\)"#).expect("Failed to compile url() regex")
});

static STRING_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)@import\s+(?:"([^"]+)"|'([^']+)')"#).expect("Failed to compile @import regex")
});

/// How a reference is written in the stylesheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssSyntax {
    /// `url(...)`, with or without quotes
    Function,
    /// `@import "..."`; the range covers the quoted string only
    ImportString,
}

/// One reference found in CSS text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssReference {
    pub range: Range<usize>,
    pub target: String,
    pub syntax: CssSyntax,
}

impl CssReference {
    /// Replacement text when the reference can't be embedded
    ///
    /// `url()` references are normalized to the quoted original URL; string
    /// imports stay as written.
    pub fn fallback(&self) -> Option<String> {
        match self.syntax {
            CssSyntax::Function => Some(format!("url(\"{}\")", self.target)),
            CssSyntax::ImportString => None,
        }
    }
}

/// Every `url()` and string `@import` reference, in source order
pub fn css_references(css: &str) -> Vec<CssReference> {
    let mut references: Vec<CssReference> = URL_FUNCTION
        .captures_iter(css)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let target = caps.get(1)?.as_str().trim();
            (!target.is_empty()).then(|| CssReference {
                range: whole.range(),
                target: target.to_string(),
                syntax: CssSyntax::Function,
            })
        })
        .collect();

    references.extend(STRING_IMPORT.captures_iter(css).filter_map(|caps| {
        let target = caps.get(1).or_else(|| caps.get(2))?;
        // Include the quotes in the replaced span
        let range = target.start() - 1..target.end() + 1;
        Some(CssReference {
            range,
            target: target.as_str().trim().to_string(),
            syntax: CssSyntax::ImportString,
        })
    }));

    references.sort_by_key(|r| r.range.start);
    references
}

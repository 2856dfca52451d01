//! Start-tag locator for in-place markup edits
//!
//! Tags are found with the html5ever tokenizer, fed one character at a time
//! so each emitted tag can be pinned to its byte range in the source. Every
//! edit is then a splice into the original text; markup outside the edited
//! tags is preserved byte-for-byte. Comments and the bodies of raw-text
//! elements (script, style, title...) never yield tags.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use std::ops::Range;

/// The element kinds the rewriter edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Image,
    Link,
    Script,
    Style,
}

impl ElementKind {
    fn has_body(self) -> bool {
        matches!(self, Self::Script | Self::Style)
    }

    fn tag_name(self) -> &'static str {
        match self {
            Self::Image => "img",
            Self::Link => "link",
            Self::Script => "script",
            Self::Style => "style",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Attribute {
    name: String,
    value: String,
}

/// A start tag whose attributes can be edited and re-serialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    name: String,
    attrs: Vec<Attribute>,
    self_closing: bool,
}

impl StartTag {
    /// An attribute-less tag
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attrs: Vec::new(),
            self_closing: false,
        }
    }

    /// Parses the first start tag in `raw`; attribute values are entity-decoded
    pub fn parse(raw: &str) -> Option<Self> {
        scan_tags(raw)
            .into_iter()
            .find(|scanned| scanned.kind == TagKind::StartTag)
            .map(|scanned| scanned.tag)
    }

    fn from_token(tag: Tag) -> Self {
        Self {
            name: tag.name.to_string(),
            attrs: tag
                .attrs
                .into_iter()
                .map(|attr| Attribute {
                    name: attr.name.local.to_string(),
                    value: attr.value.to_string(),
                })
                .collect(),
            self_closing: tag.self_closing,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of an attribute; names compare case-insensitively
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|a| a.name.eq_ignore_ascii_case(name)) {
            Some(attr) => attr.value = value,
            None => self.attrs.push(Attribute {
                name: name.to_ascii_lowercase(),
                value,
            }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|a| !a.name.eq_ignore_ascii_case(name));
    }

    /// Returns true if any whitespace-separated `rel` token satisfies `pred`
    pub fn has_rel(&self, pred: impl Fn(&str) -> bool) -> bool {
        self.attr("rel")
            .map(|rel| rel.split_ascii_whitespace().any(|t| pred(t.to_ascii_lowercase().as_str())))
            .unwrap_or(false)
    }

    /// Serializes the tag with double-quoted, escaped attribute values
    ///
    /// Empty values are written as bare attribute names.
    pub fn render(&self) -> String {
        let mut out = format!("<{}", self.name);
        for attr in &self.attrs {
            out.push(' ');
            out.push_str(&attr.name);
            if !attr.value.is_empty() {
                out.push_str("=\"");
                out.push_str(&html_escape::encode_double_quoted_attribute(&attr.value));
                out.push('"');
            }
        }
        if self.self_closing {
            out.push_str(" /");
        }
        out.push('>');
        out
    }
}

/// One located element
#[derive(Debug, Clone)]
pub struct Element {
    /// Whole element, including body and end tag for script/style
    pub range: Range<usize>,
    pub tag: StartTag,
    /// Raw body range for script/style
    pub body: Option<Range<usize>>,
}

/// A tag token pinned to its source range
#[derive(Debug, Clone)]
struct ScannedTag {
    kind: TagKind,
    tag: StartTag,
    range: Range<usize>,
}

enum Emitted {
    Tag(TagKind, StartTag),
    Content,
}

/// Collects what the tokenizer emits for one fed character
#[derive(Default)]
struct TagSink {
    emitted: Vec<Emitted>,
}

impl TokenSink for TagSink {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => {
                let raw = match tag.kind {
                    TagKind::StartTag => raw_text_kind(&tag.name),
                    TagKind::EndTag => None,
                };
                self.emitted.push(Emitted::Tag(tag.kind, StartTag::from_token(tag)));
                if let Some(kind) = raw {
                    return TokenSinkResult::RawData(kind);
                }
            }
            Token::ParseError(_) | Token::EOFToken => {}
            _ => self.emitted.push(Emitted::Content),
        }
        TokenSinkResult::Continue
    }
}

/// Elements whose content the tree builder tokenizes as raw text
fn raw_text_kind(name: &str) -> Option<RawKind> {
    match name {
        "script" => Some(RawKind::ScriptData),
        "style" | "xmp" | "iframe" | "noembed" | "noframes" => Some(RawKind::Rawtext),
        "title" | "textarea" => Some(RawKind::Rcdata),
        _ => None,
    }
}

/// Every start and end tag in document order with its byte range
///
/// A tag starts where the previous emitted token ended and ends at the
/// character that made the tokenizer emit it.
fn scan_tags(html: &str) -> Vec<ScannedTag> {
    let mut tokenizer = Tokenizer::new(TagSink::default(), TokenizerOpts::default());
    let mut input = BufferQueue::new();
    let mut tags = Vec::new();
    let mut boundary = 0;

    for (pos, ch) in html.char_indices() {
        let end = pos + ch.len_utf8();
        input.push_back(StrTendril::from_slice(&html[pos..end]));
        let _ = tokenizer.feed(&mut input);

        let emitted = std::mem::take(&mut tokenizer.sink.emitted);
        if emitted.is_empty() {
            continue;
        }
        for event in emitted {
            if let Emitted::Tag(kind, tag) = event {
                // Text emitted in the same step precedes the tag
                let start = html[boundary..end]
                    .find('<')
                    .map_or(boundary, |offset| boundary + offset);
                tags.push(ScannedTag {
                    kind,
                    tag,
                    range: start..end,
                });
            }
        }
        // A '<' that flushed earlier text is reconsumed as the next tag opener
        boundary = if ch == '<' { pos } else { end };
    }

    tokenizer.end();
    tags
}

/// Finds every element of one kind in document order
///
/// Script and style elements without an end tag are skipped.
pub fn find_elements(html: &str, kind: ElementKind) -> Vec<Element> {
    let tags = scan_tags(html);
    let name = kind.tag_name();

    tags.iter()
        .enumerate()
        .filter(|(_, scanned)| scanned.kind == TagKind::StartTag && scanned.tag.name() == name)
        .filter_map(|(index, start)| {
            if !kind.has_body() {
                return Some(Element {
                    range: start.range.clone(),
                    tag: start.tag.clone(),
                    body: None,
                });
            }

            // Raw text means the next tag is always the matching end tag
            let end = tags
                .get(index + 1)
                .filter(|next| next.kind == TagKind::EndTag && next.tag.name() == name)?;
            Some(Element {
                range: start.range.start..end.range.end,
                tag: start.tag.clone(),
                body: Some(start.range.end..end.range.start),
            })
        })
        .collect()
}

/// Applies non-overlapping replacements given in any order
pub fn splice(html: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    if edits.is_empty() {
        return html.to_string();
    }
    edits.sort_by_key(|(range, _)| range.start);

    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor {
            continue;
        }
        out.push_str(&html[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&html[cursor..]);
    out
}

/// Inserts `snippet` right before the first closing head tag, if any
pub fn insert_before_head_close(html: &str, snippet: &str) -> Option<String> {
    let close = scan_tags(html)
        .into_iter()
        .find(|scanned| scanned.kind == TagKind::EndTag && scanned.tag.name() == "head")?;
    let at = close.range.start;
    Some(splice(html, vec![(at..at, snippet.to_string())]))
}

/// Escapes `</` so raw text can't end its enclosing element early
pub fn escape_raw_text(text: &str) -> String {
    text.replace("</", "<\\/")
}

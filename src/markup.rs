//! HTML/XHTML to plain text
//!
//! A single forward scan over the characters of a content document. This is
//! not a conformant HTML parser: malformed markup only makes the output
//! noisier, it never fails.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::utils::DecodeBytes;

/// Tags whose boundaries separate words
///
/// A space is emitted for each opening or closing occurrence so that text on
/// both sides of the boundary is not fused into one word.
const BLOCK_TAGS: [&str; 16] = [
    "p",
    "div",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "li",
    "blockquote",
    "td",
    "th",
    "tr",
    "section",
    "article",
    "br",
];

/// Entities restored after the scan, in the form the scan leaves them
///
/// During the scan every `&` outside a tag is replaced with a space, so
/// `&amp;` reaches this table as ` amp;`.
const MANGLED_ENTITIES: [(&str, &str); 6] = [
    (" amp;", "&"),
    (" lt;", "<"),
    (" gt;", ">"),
    (" quot;", "\""),
    (" apos;", "'"),
    (" nbsp;", " "),
];

static MANGLED_CHAR_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" #(?:[xX]([0-9a-fA-F]{1,6})|([0-9]{1,7}));").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Text,
    Tag,
    /// Inside `<!-- ... -->`, where `>` does not end the markup
    Comment,
}

/// What a completed tag means for the scan
#[derive(Debug, PartialEq, Eq)]
enum TagKind {
    SuppressStart,
    SuppressEnd,
    Block,
    Other,
}

fn classify_tag(tag: &str) -> TagKind {
    let self_closing = tag.trim_end().ends_with('/');
    let name = tag
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .to_ascii_lowercase();

    match name.as_str() {
        "script" | "style" if !self_closing => TagKind::SuppressStart,
        "/script" | "/style" => TagKind::SuppressEnd,
        name if BLOCK_TAGS.contains(&name.strip_prefix('/').unwrap_or(name)) => TagKind::Block,
        _ => TagKind::Other,
    }
}

/// Converts one HTML/XHTML document into plain text
///
/// ## Parameters
/// - `bytes`: The raw content document, in any encoding [DecodeBytes] understands
///
/// ## Return
/// The text content of the document with tags removed, `script` and
/// `style` bodies dropped, and a space at every block-level boundary.
pub fn strip_markup(bytes: &[u8]) -> String {
    strip_markup_str(&bytes.decode())
}

/// Converts HTML/XHTML source text into plain text
///
/// See [strip_markup].
pub fn strip_markup_str(html: &str) -> String {
    let mut output = String::with_capacity(html.len() / 2);
    let mut tag = String::new();
    let mut state = ScanState::Text;
    let mut suppressed = false;

    for ch in html.chars() {
        match state {
            ScanState::Tag => {
                if ch == '>' {
                    match classify_tag(&tag) {
                        TagKind::SuppressStart => suppressed = true,
                        TagKind::SuppressEnd => suppressed = false,
                        TagKind::Block if !suppressed => output.push(' '),
                        _ => {}
                    }
                    tag.clear();
                    state = ScanState::Text;
                } else {
                    tag.push(ch);
                    if tag == "!--" {
                        tag.clear();
                        state = ScanState::Comment;
                    }
                }
            }

            ScanState::Comment => {
                tag.push(ch);
                if tag.ends_with("-->") {
                    tag.clear();
                    state = ScanState::Text;
                } else if tag.len() > 2 {
                    // Only the last two characters matter for the terminator
                    let keep = tag.char_indices().rev().nth(1).map_or(0, |(i, _)| i);
                    tag.drain(..keep);
                }
            }

            ScanState::Text => match ch {
                '<' => state = ScanState::Tag,
                _ if suppressed => {}
                '&' => output.push(' '),
                _ => output.push(ch),
            },
        }
    }

    restore_entities(output)
}

/// Re-substitutes the entities the scan mangled
fn restore_entities(mut text: String) -> String {
    for (mangled, replacement) in MANGLED_ENTITIES {
        if text.contains(mangled) {
            text = text.replace(mangled, replacement);
        }
    }

    if text.contains(" #") {
        text = MANGLED_CHAR_REF
            .replace_all(&text, |captures: &Captures| {
                let code = match (captures.get(1), captures.get(2)) {
                    (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
                    (None, Some(decimal)) => decimal.as_str().parse::<u32>().ok(),
                    _ => None,
                };
                code.and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_default()
            })
            .into_owned();
    }

    text
}

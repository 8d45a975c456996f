//! Minimal XML scanners
//!
//! Two focused passes over `quick-xml` events recover just enough structure
//! for package parsing without building a document tree:
//!
//! - [collect_elements] flattens a document into an ordered list of elements,
//!   used for `container.xml`, the OPF package and EPUB 3 navigation documents.
//! - [parse_nav_points] follows the nesting of NCX `navPoint` elements down to
//!   two levels, which the flat list cannot express.
//!
//! Neither pass fails. Malformed input ends the scan early with a warning,
//! and whatever was collected up to that point is returned.

use std::collections::HashMap;

use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

use log::warn;

use crate::{types::NavPoint, utils::NormalizeWhitespace};

/// Maximum `navPoint` nesting depth that is collected
const MAX_NAV_DEPTH: usize = 2;

/// One element of a flattened XML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatElement {
    /// The local name of the element (namespace prefix stripped)
    pub name: String,

    /// The attributes of the element, keyed by local name
    ///
    /// Namespace declarations (`xmlns`, `xmlns:*`) are not recorded.
    pub attributes: HashMap<String, String>,

    /// The whitespace-normalized text of the element and its descendants
    pub text: String,

    /// Number of elements still open around this one; the root has depth 0
    pub depth: usize,
}

impl FlatElement {
    fn from_start(start: &BytesStart, depth: usize) -> Self {
        Self {
            name: local_name(start.name().as_ref()),
            attributes: collect_attributes(start),
            text: String::new(),
            depth,
        }
    }

    /// Returns the value of the specified attribute
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Extract local name from potentially namespaced XML name
fn local_name(name: &[u8]) -> String {
    let local = name
        .iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name);
    String::from_utf8_lossy(local).into_owned()
}

fn collect_attributes(start: &BytesStart) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    for attr in start.attributes().flatten() {
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }

        let value = String::from_utf8_lossy(&attr.value);
        attributes.insert(local_name(key), unescape_text(&value));
    }
    attributes
}

/// Resolves the predefined XML entities and numeric character references
///
/// `&nbsp;` is accepted as well since XHTML navigation documents use it
/// freely. Unknown entities resolve to `None`.
fn resolve_entity(name: &str) -> Option<String> {
    let resolved = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse::<u32>().ok()?
            };
            return char::from_u32(code).map(String::from);
        }
    };
    Some(resolved.to_string())
}

/// Resolves an entity reference met in text content
///
/// Unknown entities become a space so the words around them stay apart.
fn resolve_text_reference(name: &[u8]) -> String {
    resolve_entity(&String::from_utf8_lossy(name)).unwrap_or_else(|| " ".to_string())
}

/// Replaces entity references inside an attribute value
fn unescape_text(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        result.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find(';') {
            Some(end) if end <= 10 => {
                match resolve_entity(&after[..end]) {
                    Some(resolved) => result.push_str(&resolved),
                    None => result.push_str(&rest[start..start + end + 2]),
                }
                rest = &after[end + 1..];
            }
            _ => {
                result.push('&');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

fn new_reader(content: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(content);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_dangling_amp = true;
    reader
}

/// Reads the next event, turning a reader error into the end of the scan
fn next_event<'a>(reader: &mut Reader<&'a [u8]>, scan: &str) -> Event<'a> {
    match reader.read_event() {
        Ok(event) => event,
        Err(err) => {
            warn!(
                "Stopped scanning {} at byte {}: {}",
                scan,
                reader.error_position(),
                err
            );
            Event::Eof
        }
    }
}

/// Flattens an XML document into its elements, in document order
///
/// The tree is flattened: every element becomes one [FlatElement], listed in the
/// order its start tag appears. Text is accumulated into the innermost open
/// element and, once that element closes, appended to its parent, so each
/// element ends up with the text of all of its descendants. The nesting
/// depth of each element is kept so callers can tell where a subtree ends.
///
/// A lone `&` is kept as text. On any other reader error the scan stops and
/// the elements seen so far are returned, with open elements keeping the
/// text they collected.
pub fn collect_elements(content: &str) -> Vec<FlatElement> {
    let mut reader = new_reader(content);

    let mut elements = Vec::<FlatElement>::new();
    // Indexes of open elements, paired with their raw text buffers
    let mut stack = Vec::<(usize, String)>::new();

    loop {
        match next_event(&mut reader, "elements") {
            Event::Eof => break,

            Event::Start(e) => {
                elements.push(FlatElement::from_start(&e, stack.len()));
                stack.push((elements.len() - 1, String::new()));
            }

            Event::Empty(e) => elements.push(FlatElement::from_start(&e, stack.len())),

            Event::End(_) => {
                if let Some((index, text)) = stack.pop() {
                    if let Some((_, parent_text)) = stack.last_mut() {
                        parent_text.push_str(&text);
                    }

                    let text = text.normalize_whitespace();
                    if !text.is_empty() {
                        elements[index].text = text;
                    }
                }
            }

            Event::Text(e) => {
                if let Some((_, text)) = stack.last_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }

            Event::CData(e) => {
                if let Some((_, text)) = stack.last_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }

            Event::GeneralRef(e) => {
                if let Some((_, text)) = stack.last_mut() {
                    text.push_str(&resolve_text_reference(e.as_ref()));
                }
            }

            // Ignore the following events (elements):
            // Comment, PI, Declaration, Doctype
            _ => continue,
        }
    }

    // Unclosed elements still keep what they collected.
    while let Some((index, text)) = stack.pop() {
        if let Some((_, parent_text)) = stack.last_mut() {
            parent_text.push_str(&text);
        }

        let text = text.normalize_whitespace();
        if !text.is_empty() {
            elements[index].text = text;
        }
    }

    elements
}

/// State of one `navPoint` that is being collected
struct OpenPoint {
    /// Index of the point in the result list, `None` when nested too deep
    index: Option<usize>,
}

/// Parses the navigation points of an NCX document
///
/// `navPoint` elements are tracked with an explicit depth counter. Points at
/// depth 1 and 2 are collected, which covers the common "Part > Chapter"
/// layout; anything nested deeper is ignored. Each collected point takes the
/// text of its first `text` descendant as title and the `src` attribute of
/// its first `content` descendant as link target. Points are returned in
/// document order, parents before their children.
///
/// ## Parameters
/// - `content`: The NCX document
///
/// ## Return
/// The collected points; titles or targets may be empty. A malformed
/// document yields the points found before the error.
pub fn parse_nav_points(content: &str) -> Vec<NavPoint> {
    let mut reader = new_reader(content);

    let mut points = Vec::<NavPoint>::new();
    let mut open = Vec::<OpenPoint>::new();
    // Point receiving the text of the `text` element currently open
    let mut text_target: Option<(usize, String)> = None;

    // The innermost collected point that is still open
    fn current(open: &[OpenPoint]) -> Option<usize> {
        open.iter().rev().find_map(|point| point.index)
    }

    loop {
        let event = next_event(&mut reader, "navigation points");
        match event {
            Event::Eof => break,

            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match local_name(e.name().as_ref()).as_str() {
                    "navPoint" if !is_empty => {
                        let depth = open.len() + 1;
                        let index = (depth <= MAX_NAV_DEPTH).then(|| {
                            points.push(NavPoint {
                                title: String::new(),
                                src: String::new(),
                                depth,
                            });
                            points.len() - 1
                        });
                        open.push(OpenPoint { index });
                    }

                    "text" if !is_empty => {
                        if let Some(index) = current(&open) {
                            if points[index].title.is_empty() && text_target.is_none() {
                                text_target = Some((index, String::new()));
                            }
                        }
                    }

                    "content" => {
                        if let Some(index) = current(&open) {
                            if points[index].src.is_empty() {
                                let attributes = collect_attributes(e);
                                if let Some(src) = attributes.get("src") {
                                    points[index].src = src.trim().to_string();
                                }
                            }
                        }
                    }

                    _ => {}
                }
            }

            Event::End(ref e) => match local_name(e.name().as_ref()).as_str() {
                "navPoint" => {
                    open.pop();
                }
                "text" => {
                    if let Some((index, text)) = text_target.take() {
                        points[index].title = text.normalize_whitespace();
                    }
                }
                _ => {}
            },

            Event::Text(ref e) => {
                if let Some((_, text)) = text_target.as_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }

            Event::CData(ref e) => {
                if let Some((_, text)) = text_target.as_mut() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }

            Event::GeneralRef(ref e) => {
                if let Some((_, text)) = text_target.as_mut() {
                    text.push_str(&resolve_text_reference(e.as_ref()));
                }
            }

            _ => continue,
        }
    }

    // A `text` element cut off by an error still names its point
    if let Some((index, text)) = text_target.take() {
        points[index].title = text.normalize_whitespace();
    }

    points
}

#[cfg(test)]
mod tests {
    use crate::xml::{collect_elements, parse_nav_points, unescape_text};

    mod collector_tests {
        use super::*;

        #[test]
        fn test_container_rootfile() {
            let xml = r#"<?xml version="1.0"?>
                <container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
                  <rootfiles>
                    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
                  </rootfiles>
                </container>"#;

            let elements = collect_elements(xml);
            let names: Vec<&str> = elements.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["container", "rootfiles", "rootfile"]);

            let rootfile = &elements[2];
            assert_eq!(rootfile.get_attr("full-path"), Some("OEBPS/content.opf"));
            assert!(!elements[0].attributes.contains_key("xmlns"));
        }

        #[test]
        fn test_prefixes_are_stripped() {
            let xml = r#"<package xmlns:dc="http://purl.org/dc/elements/1.1/">
                <metadata><dc:title xml:lang="en">A  Title</dc:title></metadata>
                <nav epub:type="toc"/>
            </package>"#;

            let elements = collect_elements(xml);
            let title = elements.iter().find(|e| e.name == "title").unwrap();
            assert_eq!(title.text, "A Title");
            assert_eq!(title.get_attr("lang"), Some("en"));

            let nav = elements.iter().find(|e| e.name == "nav").unwrap();
            assert_eq!(nav.get_attr("type"), Some("toc"));
        }

        /// Text of nested inline elements ends up in the enclosing element too
        #[test]
        fn test_descendant_text() {
            let xml = r#"<ol><li><a href="ch1.xhtml">Chapter <em>One</em> begins</a></li></ol>"#;
            let elements = collect_elements(xml);

            let anchor = elements.iter().find(|e| e.name == "a").unwrap();
            assert_eq!(anchor.text, "Chapter One begins");
            let em = elements.iter().find(|e| e.name == "em").unwrap();
            assert_eq!(em.text, "One");
        }

        #[test]
        fn test_entities_are_resolved() {
            let xml = r#"<title a="x &amp; y">Tom &amp; Jerry&#33; &#x263A;</title>"#;
            let elements = collect_elements(xml);
            assert_eq!(elements[0].text, "Tom & Jerry! \u{263A}");
            assert_eq!(elements[0].get_attr("a"), Some("x & y"));
        }

        #[test]
        fn test_empty_text_is_not_committed() {
            let elements = collect_elements("<a>   </a>");
            assert_eq!(elements[0].text, "");
        }

        #[test]
        fn test_depth_is_recorded() {
            let elements = collect_elements("<html><body><nav/><p><a>x</a></p></body></html>");
            let depths: Vec<(&str, usize)> =
                elements.iter().map(|e| (e.name.as_str(), e.depth)).collect();
            assert_eq!(
                depths,
                vec![("html", 0), ("body", 1), ("nav", 2), ("p", 2), ("a", 3)]
            );
        }

        /// A bare ampersand is plain text, not a fatal error
        #[test]
        fn test_dangling_ampersand() {
            let xml = r#"<metadata><title>Tom & Jerry</title><creator>Hanna</creator></metadata>"#;
            let elements = collect_elements(xml);
            assert_eq!(elements.len(), 3);
            assert_eq!(elements[1].text, "Tom & Jerry");
            assert_eq!(elements[2].text, "Hanna");
        }

        /// Elements before a reader error survive, open ones keep their text
        #[test]
        fn test_scan_stops_at_error() {
            let xml = r#"<package><item id="a"/><title>Kept <b>text</b><!-- unterminated"#;
            let elements = collect_elements(xml);
            let names: Vec<&str> = elements.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["package", "item", "title", "b"]);
            assert_eq!(elements[2].text, "Kept text");
            assert_eq!(elements[0].text, "Kept text");
        }

        /// Unknown entities separate words instead of fusing them
        #[test]
        fn test_unknown_entity_in_text() {
            let elements = collect_elements("<title>A&mdash;B</title>");
            assert_eq!(elements[0].text, "A B");
        }

        #[test]
        fn test_unescape_text() {
            assert_eq!(unescape_text("a &lt; b"), "a < b");
            assert_eq!(unescape_text("fish & chips"), "fish & chips");
            assert_eq!(unescape_text("&bogus; ok"), "&bogus; ok");
        }
    }

    mod nav_point_tests {
        use super::*;

        const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
            <ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
              <docTitle><text>The Book</text></docTitle>
              <navMap>
                <navPoint id="p1" playOrder="1">
                  <navLabel><text>Part One</text></navLabel>
                  <content src="Text/part1.xhtml"/>
                  <navPoint id="c1" playOrder="2">
                    <navLabel><text>Chapter 1</text></navLabel>
                    <content src="Text/ch1.xhtml#start"/>
                    <navPoint id="s1" playOrder="3">
                      <navLabel><text>Section 1.1</text></navLabel>
                      <content src="Text/ch1.xhtml#s1"/>
                    </navPoint>
                  </navPoint>
                </navPoint>
                <navPoint id="p2" playOrder="4">
                  <navLabel><text>Part Two</text></navLabel>
                  <content src="Text/part2.xhtml"/>
                </navPoint>
              </navMap>
            </ncx>"#;

        #[test]
        fn test_two_levels_are_collected() {
            let points = parse_nav_points(NCX);
            let titles: Vec<&str> = points.iter().map(|p| p.title.as_str()).collect();
            assert_eq!(titles, vec!["Part One", "Chapter 1", "Part Two"]);

            let depths: Vec<usize> = points.iter().map(|p| p.depth).collect();
            assert_eq!(depths, vec![1, 2, 1]);

            assert_eq!(points[1].src, "Text/ch1.xhtml#start");
            assert_eq!(points[2].src, "Text/part2.xhtml");
        }

        /// The document title is outside any navPoint and must not be picked up
        #[test]
        fn test_doc_title_ignored() {
            let points = parse_nav_points(NCX);
            assert!(points.iter().all(|p| p.title != "The Book"));
        }

        #[test]
        fn test_truncated_document() {
            let ncx = r#"<ncx><navMap>
                <navPoint><navLabel><text>First</text></navLabel><content src="a.xhtml"/></navPoint>
                <navPoint><navLabel><text>Second"#;
            let points = parse_nav_points(ncx);
            let titles: Vec<&str> = points.iter().map(|p| p.title.as_str()).collect();
            assert_eq!(titles, vec!["First", "Second"]);
            assert_eq!(points[0].src, "a.xhtml");
        }

        #[test]
        fn test_point_without_content() {
            let ncx = r#"<ncx><navMap>
                <navPoint><navLabel><text>Orphan</text></navLabel></navPoint>
            </navMap></ncx>"#;
            let points = parse_nav_points(ncx);
            assert_eq!(points.len(), 1);
            assert_eq!(points[0].title, "Orphan");
            assert_eq!(points[0].src, "");
        }
    }
}

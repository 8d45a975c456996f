//! Chapter resolution
//!
//! Maps navigation data onto word offsets of the tokenized stream. Paginated
//! documents resolve outline entries through the word offset of each page;
//! EPUB documents resolve table-of-contents links through the word offset at
//! which each spine document begins.
//!
//! Every resolver returns chapters sorted by word index with exact-offset
//! duplicates removed, keeping the first chapter in navigation order.

use std::collections::HashMap;

use log::warn;

use crate::{
    types::{Chapter, NavPoint, OutlineNode},
    utils::{
        normalize_path, parent_dir, percent_decode, relative_to, resolve_path, strip_fragment,
    },
};

/// Word offsets at which spine documents begin
///
/// Keys are spine paths normalized and expressed relative to the package
/// document directory. When a document appears in the spine more than once,
/// its first occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct SpineOffsets {
    package_dir: String,
    offsets: HashMap<String, usize>,
}

impl SpineOffsets {
    /// Creates an empty table for a package document located in `package_dir`
    pub fn new(package_dir: impl Into<String>) -> Self {
        Self {
            package_dir: normalize_path(&package_dir.into()),
            offsets: HashMap::new(),
        }
    }

    /// Records the offset of a spine document, given by its full archive path
    pub fn record(&mut self, full_path: &str, word_index: usize) {
        let key = self.key(full_path);
        self.offsets.entry(key).or_insert(word_index);
    }

    /// Looks up the offset of a document, given by its full archive path
    pub fn get(&self, full_path: &str) -> Option<usize> {
        self.offsets.get(&self.key(full_path)).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    fn key(&self, full_path: &str) -> String {
        relative_to(&normalize_path(full_path), &self.package_dir)
    }
}

/// A titled link of a table of contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocLink {
    pub title: String,

    /// The link target as written in the navigation document, possibly with a fragment
    pub href: String,
}

impl TocLink {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
        }
    }
}

impl From<NavPoint> for TocLink {
    fn from(point: NavPoint) -> Self {
        Self {
            title: point.title,
            href: point.src,
        }
    }
}

/// The links of one navigation document together with its location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocDocument {
    /// The full archive path of the navigation document; links are relative to its directory
    pub path: String,
    pub links: Vec<TocLink>,
}

/// Resolves outline entries of a paginated document to chapters
///
/// Top-level entries and their direct children are considered; deeper
/// entries are ignored. Entries without a label, or whose destination page
/// has no known offset, produce no chapter.
///
/// ## Parameters
/// - `outline`: The top-level outline entries
/// - `page_offsets`: The word offset at which each page begins, indexed by page
pub fn resolve_outline(outline: &[OutlineNode], page_offsets: &[usize]) -> Vec<Chapter> {
    let mut chapters = Vec::new();

    let mut push = |node: &OutlineNode| {
        let label = node.label.as_deref().map(str::trim).unwrap_or_default();
        if label.is_empty() {
            return;
        }
        if let Some(&offset) = node.destination.and_then(|page| page_offsets.get(page)) {
            chapters.push(Chapter::new(label, offset));
        }
    };

    for node in outline {
        push(node);
        for child in &node.children {
            push(child);
        }
    }

    sort_and_dedup(chapters)
}

/// Resolves the links of one navigation document to chapters
///
/// Each href has its fragment removed and is resolved against the directory
/// of the navigation document before it is looked up in `offsets`. Links
/// that do not lead to a spine document are skipped.
pub fn resolve_toc(document: &TocDocument, offsets: &SpineOffsets) -> Vec<Chapter> {
    let base = parent_dir(&document.path);

    let chapters = document
        .links
        .iter()
        .filter_map(|link| {
            let title = link.title.trim();
            let href = percent_decode(strip_fragment(link.href.trim()));
            if title.is_empty() || href.is_empty() {
                return None;
            }

            let target = resolve_path(base, &href);
            match offsets.get(&target) {
                Some(offset) => Some(Chapter::new(title, offset)),
                None => {
                    warn!("Unresolvable chapter link '{}' in '{}'", link.href, document.path);
                    None
                }
            }
        })
        .collect();

    sort_and_dedup(chapters)
}

/// Resolves EPUB chapters, preferring the EPUB 3 navigation document
///
/// The NCX is used when there is no navigation document or it yields no
/// chapter. A document with neither yields an empty list.
pub fn resolve_epub(
    nav: Option<&TocDocument>,
    ncx: Option<&TocDocument>,
    offsets: &SpineOffsets,
) -> Vec<Chapter> {
    if let Some(nav) = nav {
        let chapters = resolve_toc(nav, offsets);
        if !chapters.is_empty() {
            return chapters;
        }
    }

    ncx.map(|ncx| resolve_toc(ncx, offsets))
        .unwrap_or_default()
}

/// Drops chapters that point past the end of the word stream
pub fn clamp_to_words(mut chapters: Vec<Chapter>, word_count: usize) -> Vec<Chapter> {
    chapters.retain(|chapter| chapter.word_index < word_count);
    chapters
}

fn sort_and_dedup(mut chapters: Vec<Chapter>) -> Vec<Chapter> {
    // Stable, so the first chapter in navigation order survives a collision
    chapters.sort_by_key(|chapter| chapter.word_index);
    chapters.dedup_by_key(|chapter| chapter.word_index);
    chapters
}

#[cfg(test)]
mod tests {
    use crate::{
        chapters::{
            SpineOffsets, TocDocument, TocLink, clamp_to_words, resolve_epub, resolve_outline,
            resolve_toc,
        },
        types::{Chapter, NavPoint, OutlineNode},
    };

    fn is_strictly_ascending(chapters: &[Chapter]) -> bool {
        chapters.windows(2).all(|pair| pair[0].word_index < pair[1].word_index)
    }

    mod outline_tests {
        use super::*;

        #[test]
        fn test_two_level_outline() {
            let outline = vec![
                OutlineNode::new("Part One", 0).with_children(vec![
                    OutlineNode::new("Chapter 1", 1),
                    OutlineNode::new("Chapter 2", 3)
                        .with_children(vec![OutlineNode::new("Too deep", 4)]),
                ]),
                OutlineNode::new("Part Two", 5),
            ];
            let page_offsets = vec![0, 120, 250, 400, 520, 700];

            let chapters = resolve_outline(&outline, &page_offsets);
            assert_eq!(
                chapters,
                vec![
                    Chapter::new("Part One", 0),
                    Chapter::new("Chapter 1", 120),
                    Chapter::new("Chapter 2", 400),
                    Chapter::new("Part Two", 700),
                ]
            );
        }

        /// Entries sharing a page offset collapse into the first one
        #[test]
        fn test_duplicate_offsets_keep_first() {
            let outline = vec![
                OutlineNode::new("Later", 2),
                OutlineNode::new("Part", 1)
                    .with_children(vec![OutlineNode::new("Chapter", 1)]),
            ];
            let chapters = resolve_outline(&outline, &[0, 10, 20]);
            assert_eq!(chapters, vec![Chapter::new("Part", 10), Chapter::new("Later", 20)]);
            assert!(is_strictly_ascending(&chapters));
        }

        #[test]
        fn test_unresolvable_entries_skipped() {
            let outline = vec![
                OutlineNode::new("Out of range", 9),
                OutlineNode::new("   ", 0),
                OutlineNode {
                    label: Some("No destination".to_string()),
                    destination: None,
                    children: vec![],
                },
                OutlineNode::new("Kept", 1),
            ];
            assert_eq!(
                resolve_outline(&outline, &[0, 42]),
                vec![Chapter::new("Kept", 42)]
            );
        }
    }

    mod toc_tests {
        use super::*;

        fn offsets() -> SpineOffsets {
            let mut offsets = SpineOffsets::new("OEBPS");
            offsets.record("OEBPS/Text/ch1.xhtml", 0);
            offsets.record("OEBPS/Text/ch2.xhtml", 150);
            offsets.record("OEBPS/Text/chapter 3.xhtml", 300);
            offsets
        }

        #[test]
        fn test_spine_offsets_first_occurrence_wins() {
            let mut offsets = offsets();
            offsets.record("OEBPS/Text/ch1.xhtml", 999);
            assert_eq!(offsets.get("OEBPS/Text/ch1.xhtml"), Some(0));
            assert_eq!(offsets.get("OEBPS/Text/../Text/ch2.xhtml"), Some(150));
            assert_eq!(offsets.len(), 3);
        }

        #[test]
        fn test_links_resolved_against_document_directory() {
            let nav = TocDocument {
                path: "OEBPS/Nav/nav.xhtml".to_string(),
                links: vec![
                    TocLink::new("Two", "../Text/ch2.xhtml#start"),
                    TocLink::new("One", "../Text/ch1.xhtml"),
                    TocLink::new("Three", "../Text/chapter%203.xhtml"),
                    TocLink::new("Missing", "../Text/appendix.xhtml"),
                    TocLink::new("", "../Text/ch2.xhtml"),
                ],
            };

            let chapters = resolve_toc(&nav, &offsets());
            assert_eq!(
                chapters,
                vec![
                    Chapter::new("One", 0),
                    Chapter::new("Two", 150),
                    Chapter::new("Three", 300),
                ]
            );
        }

        /// The NCX is only consulted when the navigation document yields nothing
        #[test]
        fn test_nav_preferred_over_ncx() {
            let nav = TocDocument {
                path: "OEBPS/nav.xhtml".to_string(),
                links: vec![TocLink::new("From nav", "Text/ch2.xhtml")],
            };
            let ncx = TocDocument {
                path: "OEBPS/toc.ncx".to_string(),
                links: vec![TocLink::from(NavPoint {
                    title: "From ncx".to_string(),
                    src: "Text/ch1.xhtml".to_string(),
                    depth: 1,
                })],
            };
            let broken_nav = TocDocument {
                path: "OEBPS/nav.xhtml".to_string(),
                links: vec![TocLink::new("Broken", "nowhere.xhtml")],
            };

            let offsets = offsets();
            assert_eq!(
                resolve_epub(Some(&nav), Some(&ncx), &offsets),
                vec![Chapter::new("From nav", 150)]
            );
            assert_eq!(
                resolve_epub(Some(&broken_nav), Some(&ncx), &offsets),
                vec![Chapter::new("From ncx", 0)]
            );
            assert_eq!(
                resolve_epub(None, Some(&ncx), &offsets),
                vec![Chapter::new("From ncx", 0)]
            );
            assert!(resolve_epub(None, None, &offsets).is_empty());
        }

        #[test]
        fn test_package_at_archive_root() {
            let mut offsets = SpineOffsets::new("");
            offsets.record("ch1.xhtml", 5);
            let ncx = TocDocument {
                path: "toc.ncx".to_string(),
                links: vec![TocLink::new("Only", "ch1.xhtml")],
            };
            assert_eq!(resolve_toc(&ncx, &offsets), vec![Chapter::new("Only", 5)]);
        }
    }

    #[test]
    fn test_clamp_to_words() {
        let chapters = vec![
            Chapter::new("A", 0),
            Chapter::new("B", 9),
            Chapter::new("C", 10),
        ];
        assert_eq!(
            clamp_to_words(chapters, 10),
            vec![Chapter::new("A", 0), Chapter::new("B", 9)]
        );
    }
}

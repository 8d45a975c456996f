use std::{fmt, str::FromStr};

use indexmap::IndexMap;

/// The detected file format of an imported document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    Pdf,
    Epub,
    Unknown,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Pdf => "pdf",
            SourceType::Epub => "epub",
            SourceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chapter marker within a document, identified by its starting word index
///
/// The `word_index` is the stable identity of a chapter: within one produced
/// set no two chapters share the same index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chapter {
    /// The display title of the chapter (e.g. "Chapter 1: Introduction")
    pub title: String,

    /// The index into the document's word stream where this chapter begins
    pub word_index: usize,
}

impl Chapter {
    pub fn new(title: impl Into<String>, word_index: usize) -> Self {
        Self {
            title: title.into(),
            word_index,
        }
    }
}

/// The result of a document import operation
///
/// Produced once per import call and not mutated afterwards. The `chapters`
/// are sorted ascending by `word_index` without duplicates, and every index
/// lies within `0..words.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    /// The normalized, linearized word stream
    pub words: Vec<String>,

    /// The chapter index into `words`
    pub chapters: Vec<Chapter>,

    /// The format the document was read as
    pub source_type: SourceType,

    /// The title found in the document metadata, if any
    pub title: Option<String>,
}

/// A single entry read from a ZIP container
///
/// Entries only live for the duration of one decode call; the decoder hands
/// each one over to an [`EntrySink`](crate::container::EntrySink) and keeps nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    /// The path of the entry inside the archive, as declared in its local header
    pub path: String,

    /// Whether the entry declares a directory (its path ends with `/`)
    pub is_directory: bool,

    /// The decompressed payload; always empty for directories
    pub bytes: Vec<u8>,
}

/// Package information extracted from an OPF document
///
/// Built once per OPF parse and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    /// Resource id to percent-decoded href, relative to the OPF directory
    ///
    /// On duplicate ids the last declaration wins.
    pub items: IndexMap<String, String>,

    /// The reading order, as a sequence of manifest ids
    pub spine: Vec<String>,

    /// The manifest id of the legacy NCX navigation document
    pub toc_id: Option<String>,

    /// The href of the EPUB 3 navigation document
    pub nav_href: Option<String>,

    /// The first non-empty title found in the package metadata
    pub title: Option<String>,
}

impl Manifest {
    /// Returns the href registered for the given manifest id
    pub fn href(&self, id: &str) -> Option<&str> {
        self.items.get(id).map(String::as_str)
    }

    /// Returns the href of the NCX document referenced by the spine `toc` attribute
    pub fn toc_href(&self) -> Option<&str> {
        self.toc_id.as_deref().and_then(|id| self.href(id))
    }
}

/// A titled entry of a legacy NCX table of contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavPoint {
    /// The text of the first `text` descendant
    pub title: String,

    /// The `src` attribute of the first `content` descendant
    pub src: String,

    /// Nesting depth of the point, 1 for top-level entries
    pub depth: usize,
}

/// A node of a paginated document's outline (bookmark) tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutlineNode {
    /// The display label of the bookmark
    pub label: Option<String>,

    /// The zero-based index of the page the bookmark points to
    pub destination: Option<usize>,

    /// Nested bookmarks
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn new(label: impl Into<String>, destination: usize) -> Self {
        Self {
            label: Some(label.into()),
            destination: Some(destination),
            children: vec![],
        }
    }

    pub fn with_children(mut self, children: Vec<OutlineNode>) -> Self {
        self.children = children;
        self
    }
}

/// Controls the level of text cleaning applied during import
///
/// This is an on/off switch rather than a quality dial: `None` leaves the
/// extracted text untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CleaningLevel {
    None,
    #[default]
    Standard,
}

impl CleaningLevel {
    pub const ALL: [CleaningLevel; 2] = [CleaningLevel::None, CleaningLevel::Standard];

    pub fn as_str(&self) -> &'static str {
        match self {
            CleaningLevel::None => "none",
            CleaningLevel::Standard => "standard",
        }
    }

    /// Parses a stored setting value, falling back to the default on anything unknown
    pub fn resolve(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CleaningLevel::None => "Off",
            CleaningLevel::Standard => "Standard",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CleaningLevel::None => "Import text exactly as extracted.",
            CleaningLevel::Standard => {
                "Removes page numbers, headers, footers, and common boilerplate."
            }
        }
    }
}

impl FromStr for CleaningLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CleaningLevel::None),
            "standard" => Ok(CleaningLevel::Standard),
            other => Err(format!("unknown cleaning level \"{other}\"")),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{CleaningLevel, Manifest, SourceType};

    #[test]
    fn test_cleaning_level_resolve() {
        assert_eq!(CleaningLevel::resolve("none"), CleaningLevel::None);
        assert_eq!(CleaningLevel::resolve("standard"), CleaningLevel::Standard);
        assert_eq!(CleaningLevel::resolve("aggressive"), CleaningLevel::Standard);
        assert_eq!(CleaningLevel::default(), CleaningLevel::Standard);

        for level in CleaningLevel::ALL {
            assert_eq!(CleaningLevel::resolve(level.as_str()), level);
        }
    }

    #[test]
    fn test_manifest_toc_href() {
        let mut manifest = Manifest::default();
        manifest.items.insert("ncx".into(), "toc.ncx".into());
        assert_eq!(manifest.toc_href(), None);

        manifest.toc_id = Some("ncx".into());
        assert_eq!(manifest.toc_href(), Some("toc.ncx"));

        manifest.toc_id = Some("missing".into());
        assert_eq!(manifest.toc_href(), None);
    }

    #[test]
    fn test_source_type_display() {
        assert_eq!(SourceType::Pdf.to_string(), "pdf");
        assert_eq!(SourceType::Epub.to_string(), "epub");
        assert_eq!(SourceType::Unknown.to_string(), "unknown");
    }
}

//! Paginated document extraction
//!
//! Page-level text extraction of PDF files is left to the host platform,
//! which plugs in through the [PageSource] and [PdfBackend] traits. This
//! module turns whatever the backend reports into a cleaned word stream with
//! chapters resolved from the document outline.

use std::path::Path;

use log::info;

use crate::{
    chapters::{clamp_to_words, resolve_outline},
    cleaner::TextCleaner,
    error::ImportError,
    tokenizer::WordStream,
    types::{CleaningLevel, ImportResult, OutlineNode, SourceType},
};

/// Page-level access to an opened paginated document
pub trait PageSource {
    /// Number of pages in the document
    fn page_count(&self) -> usize;

    /// The raw text of a page, or `None` when the page has no text layer
    fn page_text(&self, index: usize) -> Option<String>;

    /// The top-level entries of the outline (bookmark) tree
    fn outline(&self) -> Vec<OutlineNode>;

    /// The title recorded in the document metadata
    fn metadata_title(&self) -> Option<String>;
}

/// Opens paginated documents for the import pipeline
///
/// Hosts that can read PDF files implement this trait on top of their
/// native text extraction and hand it to the importer. The backend lives as
/// long as the importer and is shared with whatever thread runs imports.
pub trait PdfBackend: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn PageSource>, ImportError>;
}

/// Extracts the word stream and chapters of a paginated document
///
/// All pages are cleaned together, so running headers and footers can be
/// detected across the document, and then tokenized in order with the carry
/// threaded from one page to the next. A page without text contributes an
/// empty string, which keeps page indices aligned with the outline.
///
/// ## Parameters
/// - `source`: The opened document
/// - `level`: The cleaning level applied to the pages
/// - `cleaner`: The cleaner carrying the heuristic thresholds
///
/// ## Return
/// An [ImportResult] whose word stream may be empty; deciding whether that
/// is an error is left to the caller.
pub fn extract_pages(
    source: &dyn PageSource,
    level: CleaningLevel,
    cleaner: &TextCleaner,
) -> ImportResult {
    let page_count = source.page_count();
    let pages: Vec<String> = (0..page_count)
        .map(|index| source.page_text(index).unwrap_or_default())
        .collect();

    let cleaned = cleaner.clean_pages(&pages, level);

    let mut stream = WordStream::new();
    let mut page_offsets = Vec::with_capacity(page_count);
    for page in &cleaned {
        page_offsets.push(stream.len());
        stream.feed(page);
    }
    let words = stream.finish();

    let chapters = clamp_to_words(resolve_outline(&source.outline(), &page_offsets), words.len());

    info!(
        "PDF extraction: {} pages, {} words, {} chapters",
        page_count,
        words.len(),
        chapters.len()
    );

    ImportResult {
        words,
        chapters,
        source_type: SourceType::Pdf,
        title: source
            .metadata_title()
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::{
        cleaner::TextCleaner,
        pdf::{PageSource, extract_pages},
        types::{Chapter, CleaningLevel, OutlineNode, SourceType},
    };

    /// An in-memory paginated document
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MockPages {
        pub(crate) pages: Vec<Option<String>>,
        pub(crate) outline: Vec<OutlineNode>,
        pub(crate) title: Option<String>,
    }

    impl MockPages {
        pub(crate) fn new(pages: &[&str]) -> Self {
            Self {
                pages: pages.iter().map(|page| Some(page.to_string())).collect(),
                ..Self::default()
            }
        }
    }

    impl PageSource for MockPages {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_text(&self, index: usize) -> Option<String> {
            self.pages.get(index).cloned().flatten()
        }

        fn outline(&self) -> Vec<OutlineNode> {
            self.outline.clone()
        }

        fn metadata_title(&self) -> Option<String> {
            self.title.clone()
        }
    }

    #[test]
    fn test_carry_threads_across_pages() {
        let source = MockPages::new(&["The infor-", "mation age"]);
        let result = extract_pages(&source, CleaningLevel::None, &TextCleaner::default());

        assert_eq!(result.source_type, SourceType::Pdf);
        assert_eq!(result.words, vec!["The", "information", "age"]);
    }

    #[test]
    fn test_outline_chapters_use_page_offsets() {
        let mut source = MockPages::new(&["alpha beta", "gamma delta epsilon", "zeta"]);
        source.outline = vec![
            OutlineNode::new("Part I", 0).with_children(vec![OutlineNode::new("Chapter 2", 1)]),
            OutlineNode::new("Chapter 3", 2),
        ];
        source.title = Some("  A Title ".to_string());

        let result = extract_pages(&source, CleaningLevel::Standard, &TextCleaner::default());
        assert_eq!(
            result.chapters,
            vec![
                Chapter::new("Part I", 0),
                Chapter::new("Chapter 2", 2),
                Chapter::new("Chapter 3", 5),
            ]
        );
        assert_eq!(result.title.as_deref(), Some("A Title"));
    }

    /// Pages without text keep their slot so later outline entries still line up
    #[test]
    fn test_absent_page_text() {
        let mut source = MockPages::new(&["one two", "", "three"]);
        source.pages[1] = None;
        source.outline = vec![
            OutlineNode::new("Blank", 1),
            OutlineNode::new("Last", 2),
        ];

        let result = extract_pages(&source, CleaningLevel::None, &TextCleaner::default());
        assert_eq!(result.words, vec!["one", "two", "three"]);
        // The blank page and the last page start at the same offset
        assert_eq!(result.chapters, vec![Chapter::new("Blank", 2)]);
    }

    /// Outline entries pointing at trailing pages without words are dropped
    #[test]
    fn test_chapters_stay_within_words() {
        let mut source = MockPages::new(&["only words here", "42"]);
        source.outline = vec![OutlineNode::new("Start", 0), OutlineNode::new("Index", 1)];

        let result = extract_pages(&source, CleaningLevel::Standard, &TextCleaner::default());
        assert_eq!(result.words.len(), 3);
        assert_eq!(result.chapters, vec![Chapter::new("Start", 0)]);
    }

    #[test]
    fn test_running_header_removed_across_pages() {
        let pages: Vec<String> = ["first", "second", "third", "fourth"]
            .iter()
            .map(|body| format!("Journal of Tests\n{body} body line\nclosing {body}"))
            .collect();
        let source = MockPages {
            pages: pages.into_iter().map(Some).collect(),
            ..MockPages::default()
        };

        let result = extract_pages(&source, CleaningLevel::Standard, &TextCleaner::default());
        assert!(!result.words.iter().any(|word| word == "Journal"));
        assert_eq!(result.words.first().map(String::as_str), Some("first"));
    }
}

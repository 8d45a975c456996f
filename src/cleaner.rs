//! Rule-based boilerplate removal
//!
//! Cleaning runs in two phases. The first looks across all pages (or spine
//! sections) of a document for lines that keep recurring in header and
//! footer positions. The second classifies every line on its own and drops
//! page numbers, table-of-contents leaders, copyright notices and similar
//! residue. Both phases are heuristic and never fail; blank lines always
//! survive since they carry paragraph breaks.

use std::{
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

use log::{debug, info};
use regex::Regex;

use crate::{types::CleaningLevel, utils::NormalizeWhitespace};

static PAGE_OF_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^[Pp]age\s+\d+(\s+(of|/)\s+\d+)?$",
        r"^[Pp]\.\s*\d+$",
        r"^\d+\s*/\s*\d+$",
        r"^-\s*\d+\s*-$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static TOC_LEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{3,}\s*\d+\s*$").unwrap());

static ISBN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ISBN[\s:\-]*[\d\-]{10,}").unwrap());

static FIRST_EDITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^first\s+(edition|printing)").unwrap());

const NAVIGATION_PHRASES: [&str; 14] = [
    "next",
    "previous",
    "prev",
    "back",
    "forward",
    "next chapter",
    "previous chapter",
    "next page",
    "previous page",
    "back to top",
    "return to top",
    "continue reading",
    "skip to content",
    "table of contents",
];

const PUBLISHER_PREFIXES: [&str; 3] = ["printed in", "published by", "first published"];

/// Characters ignored when deciding whether a token is numeric
const NUMERIC_FORMATTING: [char; 7] = ['$', '%', ',', '(', ')', '+', '-'];

/// Characters wrapped around standalone page numbers
const PAGE_NUMBER_WRAPPING: [char; 6] = ['-', '[', ']', '(', ')', ' '];

/// Tunable thresholds of the cleaning heuristics
///
/// The defaults are the values the heuristics were tuned with; they have no
/// derivation beyond working well on real documents.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanerConfig {
    /// Minimum number of pages for cross-page detection, and the floor of
    /// the number of pages a line must recur on
    pub repeat_min_pages: usize,

    /// Fraction of the pages a line must recur on to count as a header/footer
    pub repeat_page_ratio: f64,

    /// Minimum number of tokens before a line can be classified as tabular
    pub tabular_min_tokens: usize,

    /// Fraction of numeric tokens from which a line is treated as tabular
    pub tabular_numeric_ratio: f64,

    /// Maximum number of digits of a standalone page number
    pub page_number_max_len: usize,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            repeat_min_pages: 3,
            repeat_page_ratio: 0.5,
            tabular_min_tokens: 3,
            tabular_numeric_ratio: 0.6,
            page_number_max_len: 5,
        }
    }
}

/// Why a line was removed, logged for debugging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    RepeatedHeader,
    PageNumber,
    PageOfPattern,
    TocLeader,
    Isbn,
    Copyright,
    Navigation,
    Publisher,
    TabularData,
}

impl RemovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalReason::RepeatedHeader => "repeated header/footer",
            RemovalReason::PageNumber => "standalone page number",
            RemovalReason::PageOfPattern => "page-of pattern",
            RemovalReason::TocLeader => "TOC leader line",
            RemovalReason::Isbn => "ISBN",
            RemovalReason::Copyright => "copyright notice",
            RemovalReason::Navigation => "navigation text",
            RemovalReason::Publisher => "publisher boilerplate",
            RemovalReason::TabularData => "tabular data",
        }
    }
}

/// Strips digits and collapses whitespace, so "Page 1" and "Page 247" produce the same key
pub fn normalize_for_comparison(line: &str) -> String {
    line.chars()
        .filter(|c| !c.is_numeric())
        .collect::<String>()
        .normalize_whitespace()
}

/// The boilerplate remover
#[derive(Debug, Clone, Default)]
pub struct TextCleaner {
    config: CleanerConfig,
}

impl TextCleaner {
    pub fn new(config: CleanerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    /// Cleans a set of page-level or section-level texts
    ///
    /// Cross-page analysis first detects repeated headers and footers, then
    /// every page is cleaned line by line. The output has one entry per
    /// input page, in the same order.
    ///
    /// ## Parameters
    /// - `pages`: The texts of the pages, in reading order
    /// - `level`: The cleaning level; [CleaningLevel::None] returns the pages unchanged
    pub fn clean_pages(&self, pages: &[String], level: CleaningLevel) -> Vec<String> {
        if level == CleaningLevel::None {
            debug!("Text cleaning: OFF");
            return pages.to_vec();
        }

        info!("Text cleaning: {} - processing {} pages", level.as_str(), pages.len());

        let repeated = self.detect_repeated_patterns(pages);
        if !repeated.is_empty() {
            info!("Detected {} repeated header/footer pattern(s)", repeated.len());
            for pattern in &repeated {
                debug!("  repeated pattern: \"{}\"", pattern);
            }
        }

        let mut total_removed = 0;
        let cleaned = pages
            .iter()
            .enumerate()
            .map(|(index, page)| {
                let (cleaned, removed) = self.clean_page(page, &repeated, Some(index));
                total_removed += removed;
                cleaned
            })
            .collect();

        info!(
            "Text cleaning complete - removed {} line(s) across {} page(s)",
            total_removed,
            pages.len()
        );
        cleaned
    }

    /// Cleans a single block of text, without cross-page analysis
    pub fn clean_text(&self, text: &str, level: CleaningLevel) -> String {
        if level == CleaningLevel::None {
            return text.to_string();
        }
        self.clean_page(text, &HashSet::new(), None).0
    }

    /// Finds lines that recur, after digit normalization, across many pages
    ///
    /// Only the first two and the last two non-empty lines of each page are
    /// sampled, since that is where running headers and footers live. Each
    /// normalized form counts at most once per page.
    pub fn detect_repeated_patterns(&self, pages: &[String]) -> HashSet<String> {
        if pages.len() < self.config.repeat_min_pages {
            return HashSet::new();
        }

        let mut line_counts = HashMap::<String, usize>::new();
        for page in pages {
            let lines: Vec<&str> = page
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect();
            if lines.len() < 3 {
                continue;
            }

            let head = lines.iter().take(2);
            let tail = lines.iter().skip(lines.len().saturating_sub(2));
            let mut seen = HashSet::new();
            for line in head.chain(tail) {
                let normalized = normalize_for_comparison(line);
                if normalized.chars().count() < 2 || !seen.insert(normalized.clone()) {
                    continue;
                }
                *line_counts.entry(normalized).or_default() += 1;
            }
        }

        let ratio_threshold = (pages.len() as f64 * self.config.repeat_page_ratio).floor() as usize;
        let threshold = self.config.repeat_min_pages.max(ratio_threshold);
        line_counts
            .into_iter()
            .filter(|(_, count)| *count >= threshold)
            .map(|(line, _)| line)
            .collect()
    }

    /// Returns the first rule a non-blank, trimmed line falls foul of
    pub fn classify_line(&self, line: &str, repeated: &HashSet<String>) -> Option<RemovalReason> {
        if !repeated.is_empty() && repeated.contains(&normalize_for_comparison(line)) {
            return Some(RemovalReason::RepeatedHeader);
        }

        if self.is_standalone_page_number(line) {
            Some(RemovalReason::PageNumber)
        } else if is_page_of_pattern(line) {
            Some(RemovalReason::PageOfPattern)
        } else if TOC_LEADER.is_match(line) {
            Some(RemovalReason::TocLeader)
        } else if ISBN.is_match(line) {
            Some(RemovalReason::Isbn)
        } else if is_copyright_notice(line) {
            Some(RemovalReason::Copyright)
        } else if is_navigation_text(line) {
            Some(RemovalReason::Navigation)
        } else if is_publisher_boilerplate(line) {
            Some(RemovalReason::Publisher)
        } else if self.is_tabular_data_line(line) {
            Some(RemovalReason::TabularData)
        } else {
            None
        }
    }

    fn clean_page(
        &self,
        text: &str,
        repeated: &HashSet<String>,
        page_index: Option<usize>,
    ) -> (String, usize) {
        let mut removed = 0;
        let kept: Vec<&str> = text
            .split('\n')
            .filter(|line| {
                let trimmed = line.trim();
                // Preserve blank lines (paragraph breaks)
                if trimmed.is_empty() {
                    return true;
                }

                match self.classify_line(trimmed, repeated) {
                    Some(reason) => {
                        removed += 1;
                        match page_index {
                            Some(index) => {
                                debug!("  [page {}] {}: \"{}\"", index, reason.as_str(), trimmed)
                            }
                            None => debug!("  {}: \"{}\"", reason.as_str(), trimmed),
                        }
                        false
                    }
                    None => true,
                }
            })
            .collect();

        (kept.join("\n"), removed)
    }

    /// Lines that are just a number, optionally wrapped in dashes, brackets, or parens
    fn is_standalone_page_number(&self, line: &str) -> bool {
        let stripped = line.trim_matches(PAGE_NUMBER_WRAPPING.as_slice());
        !stripped.is_empty()
            && stripped.chars().all(char::is_numeric)
            && stripped.chars().count() <= self.config.page_number_max_len
    }

    /// Lines that look like table or chart data, e.g. "12.5  34  67.8  90.1"
    fn is_tabular_data_line(&self, line: &str) -> bool {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < self.config.tabular_min_tokens {
            return false;
        }

        let numeric = tokens
            .iter()
            .filter(|token| {
                let stripped: String = token
                    .chars()
                    .filter(|c| !NUMERIC_FORMATTING.contains(c))
                    .collect();
                !stripped.is_empty() && stripped.chars().all(|c| c.is_numeric() || c == '.')
            })
            .count();

        numeric as f64 / tokens.len() as f64 >= self.config.tabular_numeric_ratio
    }
}

/// "Page 3 of 100", "page 3", "p. 42", "3 / 100", "- 3 -"
fn is_page_of_pattern(line: &str) -> bool {
    PAGE_OF_PATTERNS.iter().any(|regex| regex.is_match(line))
}

/// Lines starting with © or "Copyright", or containing "All rights reserved"
fn is_copyright_notice(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.starts_with('\u{00A9}')
        || lower.starts_with("copyright")
        || lower.contains("all rights reserved")
}

/// Short navigation strings that appear as standalone lines
fn is_navigation_text(line: &str) -> bool {
    NAVIGATION_PHRASES.contains(&line.to_lowercase().as_str())
}

/// "Printed in...", "Published by...", "First edition..."
fn is_publisher_boilerplate(line: &str) -> bool {
    let lower = line.to_lowercase();
    PUBLISHER_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
        || FIRST_EDITION.is_match(&lower)
}

/// Cleans a set of pages with the default configuration
pub fn clean_pages(pages: &[String], level: CleaningLevel) -> Vec<String> {
    TextCleaner::default().clean_pages(pages, level)
}

/// Cleans a single block of text with the default configuration
pub fn clean_text(text: &str, level: CleaningLevel) -> String {
    TextCleaner::default().clean_text(text, level)
}

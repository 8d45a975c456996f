//! Import pipeline
//!
//! Routes a document file to the PDF or EPUB extractor and assembles the
//! final [ImportResult]. The pipeline is synchronous and keeps no state
//! between calls, and every intermediate structure lives for one import
//! only. Callers that need a responsive interface run imports on a
//! background thread.

use std::{fs, path::Path};

use log::{info, warn};

use crate::{
    cleaner::{CleanerConfig, TextCleaner},
    container::{FlateInflater, Inflate},
    epub::EpubDoc,
    error::ImportError,
    pdf::{PdfBackend, extract_pages},
    types::{CleaningLevel, ImportResult, SourceType},
};

/// File extensions stripped from file names when deriving a title
const DOCUMENT_EXTENSIONS: [&str; 2] = ["pdf", "epub"];

/// An externally detected format of the file being imported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatHint {
    /// A format already resolved by the caller
    Source(SourceType),

    /// A MIME type or uniform type identifier, e.g. `application/epub+zip`
    ContentType(String),
}

impl FormatHint {
    /// Returns the source type the hint designates, if it designates one
    pub fn source_type(&self) -> Option<SourceType> {
        match self {
            FormatHint::Source(SourceType::Unknown) => None,
            FormatHint::Source(source) => Some(*source),
            FormatHint::ContentType(content_type) => {
                match content_type.trim().to_ascii_lowercase().as_str() {
                    "application/pdf" | "com.adobe.pdf" => Some(SourceType::Pdf),
                    "application/epub+zip" | "org.idpf.epub-container" => Some(SourceType::Epub),
                    _ => None,
                }
            }
        }
    }
}

impl From<SourceType> for FormatHint {
    fn from(value: SourceType) -> Self {
        FormatHint::Source(value)
    }
}

impl From<&str> for FormatHint {
    fn from(value: &str) -> Self {
        FormatHint::ContentType(value.to_string())
    }
}

/// Determines the document format, trying the hint first and the file extension second
pub fn resolve_source_type(path: &Path, hint: Option<&FormatHint>) -> SourceType {
    if let Some(source) = hint.and_then(FormatHint::source_type) {
        return source;
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("pdf") => SourceType::Pdf,
        Some("epub") => SourceType::Epub,
        _ => SourceType::Unknown,
    }
}

/// Returns the metadata title if it is non-empty, otherwise a title derived from the file name
pub fn resolve_title(metadata_title: Option<&str>, file_name: &str) -> String {
    match metadata_title.map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => clean_file_name(file_name),
    }
}

/// Turns a file name such as `_OCEanpdf_Labor_from_blah.pdf` into `OCEanpdf Labor From Blah`
///
/// A `.pdf` or `.epub` extension is removed, underscores, hyphens and dots
/// become spaces, and the first letter of each word is capitalized with the
/// rest left as is. If nothing is left, the file name is returned unchanged.
pub fn clean_file_name(file_name: &str) -> String {
    let name = match file_name.rsplit_once('.') {
        Some((stem, ext)) if DOCUMENT_EXTENSIONS.contains(&ext.to_lowercase().as_str()) => stem,
        _ => file_name,
    };

    let words: Vec<String> = name
        .split(['_', '-', '.', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        return file_name.to_string();
    }
    words.join(" ")
}

/// Options applied to every import
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOptions {
    pub cleaning_level: CleaningLevel,
    pub cleaner: CleanerConfig,
}

/// The document importer
///
/// Holds the collaborators the pipeline depends on: the inflate primitive
/// used for EPUB archives and, optionally, a backend for paginated documents.
/// Without a PDF backend every PDF import fails with
/// [ImportError::ExtractionFailed].
///
/// An `Importer` is `Send + Sync`: it can be moved to a worker thread or
/// shared behind an `Arc`.
pub struct Importer {
    options: ImportOptions,
    cleaner: TextCleaner,
    inflater: Box<dyn Inflate>,
    pdf_backend: Option<Box<dyn PdfBackend>>,
}

impl Default for Importer {
    fn default() -> Self {
        Self::new(ImportOptions::default())
    }
}

impl Importer {
    pub fn new(options: ImportOptions) -> Self {
        Self {
            cleaner: TextCleaner::new(options.cleaner.clone()),
            options,
            inflater: Box::new(FlateInflater),
            pdf_backend: None,
        }
    }

    /// Replaces the inflate primitive used for EPUB archives
    pub fn with_inflater(mut self, inflater: Box<dyn Inflate>) -> Self {
        self.inflater = inflater;
        self
    }

    /// Installs the backend used to open PDF files
    pub fn with_pdf_backend(mut self, backend: Box<dyn PdfBackend>) -> Self {
        self.pdf_backend = Some(backend);
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Extracts words and chapters from a document file
    ///
    /// ## Parameters
    /// - `path`: The file to import
    /// - `hint`: The externally detected format, if any
    ///
    /// ## Return
    /// - `Ok(ImportResult)`: A non-empty word stream with its chapters
    /// - `Err(ImportError)`: One of the three import failures; nothing else escapes
    ///
    /// ## Notes
    /// - The archive of an EPUB is decoded into memory and dropped before
    ///   this function returns, on success and failure alike.
    pub fn import<P: AsRef<Path>>(
        &self,
        path: P,
        hint: Option<&FormatHint>,
    ) -> Result<ImportResult, ImportError> {
        let path = path.as_ref();
        let source_type = resolve_source_type(path, hint);
        info!(
            "Importing {} as {} (cleaning: {})",
            path.display(),
            source_type,
            self.options.cleaning_level.as_str()
        );

        let result = match source_type {
            SourceType::Pdf => self.import_pdf(path)?,
            SourceType::Epub => self.import_epub(path)?,
            SourceType::Unknown => return Err(ImportError::UnsupportedFileType),
        };

        if result.words.is_empty() {
            warn!("No readable text extracted from {}", path.display());
            return Err(ImportError::NoReadableText);
        }

        info!(
            "Imported {}: {} words, {} chapters",
            path.display(),
            result.words.len(),
            result.chapters.len()
        );
        Ok(result)
    }

    fn import_pdf(&self, path: &Path) -> Result<ImportResult, ImportError> {
        let backend = self
            .pdf_backend
            .as_ref()
            .ok_or_else(|| ImportError::extraction_failed("no PDF backend available"))?;
        let source = backend.open(path)?;
        Ok(extract_pages(
            source.as_ref(),
            self.options.cleaning_level,
            &self.cleaner,
        ))
    }

    fn import_epub(&self, path: &Path) -> Result<ImportResult, ImportError> {
        let data = fs::read(path)?;
        let doc = EpubDoc::from_bytes(&data, self.inflater.as_ref())?;
        Ok(doc.extract(self.options.cleaning_level, &self.cleaner))
    }
}

/// Returns the title to display for an imported document
pub fn display_title(result: &ImportResult, path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    resolve_title(result.title.as_deref(), &file_name)
}

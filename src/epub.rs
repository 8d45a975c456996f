use std::{fs, path::Path};

use log::{debug, info, warn};

use crate::{
    chapters::{SpineOffsets, TocDocument, TocLink, clamp_to_words, resolve_epub},
    cleaner::TextCleaner,
    container::{FlateInflater, Inflate, VirtualTree, decode_archive},
    error::ImportError,
    markup::strip_markup,
    tokenizer::WordStream,
    types::{CleaningLevel, ImportResult, Manifest, SourceType},
    utils::{DecodeBytes, parent_dir, percent_decode, resolve_path},
    xml::{collect_elements, parse_nav_points},
};

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// A decoded EPUB publication, ready for text extraction
///
/// The `EpubDoc` owns the in-memory file tree of the archive together with
/// the package information read from the OPF document. Everything is held in
/// memory and released when the value is dropped, so no extracted files are
/// ever left behind, whether the import succeeds or not.
///
/// # Notes
/// - Only the parts of the package needed for reading are parsed: the
///   manifest, the spine, the navigation documents and the first title.
/// - Encrypted (DRM-protected) content cannot be read; such publications
///   usually decode to markup-free noise or to no text at all.
pub struct EpubDoc {
    /// The extracted files of the archive
    tree: VirtualTree,

    /// The archive path of the OPF package document
    pub package_path: String,

    /// The directory of the package document, against which manifest hrefs resolve
    pub base_path: String,

    /// The package information extracted from the OPF document
    pub manifest: Manifest,
}

impl EpubDoc {
    /// Opens an EPUB file from disk
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ImportError> {
        let data = fs::read(path)?;
        Self::from_bytes(&data, &FlateInflater)
    }

    /// Decodes an EPUB publication held in memory
    ///
    /// ## Parameters
    /// - `data`: The raw bytes of the EPUB archive
    /// - `inflater`: The primitive used for `deflate` entries
    ///
    /// ## Return
    /// - `Ok(EpubDoc)`: The decoded publication
    /// - `Err(ImportError)`: The archive holds no container descriptor, no
    ///   `rootfile` declaration, or no package document
    pub fn from_bytes(data: &[u8], inflater: &dyn Inflate) -> Result<Self, ImportError> {
        // Parsing process
        // 1. Decode the archive into an in-memory tree
        // 2. Parse `META-INF/container.xml` to locate the OPF file
        // 3. Parse the OPF file into the manifest, spine and title

        let mut tree = VirtualTree::new();
        decode_archive(data, inflater, &mut tree)?;
        if tree.is_empty() {
            return Err(ImportError::extraction_failed("archive contains no readable entries"));
        }

        let container = tree
            .get(CONTAINER_PATH)
            .ok_or_else(|| ImportError::extraction_failed(format!("missing {CONTAINER_PATH}")))?
            .decode();
        let package_path = resolve_path("", &Self::parse_container(&container)?);
        let base_path = parent_dir(&package_path).to_string();

        let package = tree
            .get(&package_path)
            .ok_or_else(|| {
                ImportError::extraction_failed(format!("missing package document {package_path}"))
            })?
            .decode();
        let manifest = Self::parse_package(&package)?;

        debug!(
            "Package {}: {} manifest items, {} spine entries",
            package_path,
            manifest.items.len(),
            manifest.spine.len()
        );

        Ok(Self {
            tree,
            package_path,
            base_path,
            manifest,
        })
    }

    /// Parses the EPUB container file (META-INF/container.xml)
    ///
    /// Returns the `full-path` of the first `rootfile` element. When several
    /// renditions are declared, the first one is the default.
    pub fn parse_container(data: &str) -> Result<String, ImportError> {
        collect_elements(data)
            .into_iter()
            .find(|element| element.name == "rootfile")
            .ok_or_else(|| ImportError::extraction_failed("container.xml declares no rootfile"))?
            .get_attr("full-path")
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(String::from)
            .ok_or_else(|| ImportError::extraction_failed("rootfile has no full-path attribute"))
    }

    /// Parses the OPF package document into a [Manifest]
    ///
    /// ## Notes
    /// - An `item` without an `id` or `href` is skipped with a warning.
    /// - Hrefs are percent-decoded and stay relative to the package directory.
    /// - The EPUB 3 navigation document is the first `item` whose `properties`
    ///   contain the `nav` token.
    /// - A package without a `manifest` element is rejected. Malformed XML
    ///   is not an error by itself: whatever precedes the defect is used.
    pub fn parse_package(data: &str) -> Result<Manifest, ImportError> {
        let elements = collect_elements(data);
        if !elements.iter().any(|element| element.name == "manifest") {
            return Err(ImportError::extraction_failed("package document has no manifest"));
        }

        let mut manifest = Manifest::default();
        for element in &elements {
            match element.name.as_str() {
                "item" => {
                    let (Some(id), Some(href)) = (element.get_attr("id"), element.get_attr("href"))
                    else {
                        warn!("Skipping manifest item without id or href: {:?}", element.attributes);
                        continue;
                    };

                    let href = percent_decode(href.trim());
                    let is_nav = element
                        .get_attr("properties")
                        .is_some_and(|properties| properties.split_whitespace().any(|p| p == "nav"));
                    if is_nav && manifest.nav_href.is_none() {
                        manifest.nav_href = Some(href.clone());
                    }

                    manifest.items.insert(id.trim().to_string(), href);
                }

                "itemref" => match element.get_attr("idref") {
                    Some(idref) => manifest.spine.push(idref.trim().to_string()),
                    None => warn!("Skipping spine itemref without idref"),
                },

                "spine" => {
                    manifest.toc_id = element
                        .get_attr("toc")
                        .map(str::trim)
                        .filter(|toc| !toc.is_empty())
                        .map(String::from);
                }

                "title" if manifest.title.is_none() && !element.text.is_empty() => {
                    manifest.title = Some(element.text.clone());
                }

                _ => {}
            }
        }

        Ok(manifest)
    }

    /// Returns the archive path of a manifest href
    fn full_path(&self, href: &str) -> String {
        resolve_path(&self.base_path, href)
    }

    /// Returns the content documents of the spine, in reading order
    ///
    /// Each entry pairs the archive path of a document with its raw bytes.
    /// Spine entries whose id is not in the manifest, or whose file is not
    /// in the archive, are skipped with a warning.
    pub fn spine_documents(&self) -> Vec<(String, &[u8])> {
        self.manifest
            .spine
            .iter()
            .filter_map(|idref| {
                let Some(href) = self.manifest.href(idref) else {
                    warn!("Spine item '{}' is not declared in the manifest", idref);
                    return None;
                };

                let path = self.full_path(href);
                match self.tree.get(&path) {
                    Some(bytes) => Some((path, bytes)),
                    None => {
                        warn!("Spine document '{}' is missing from the archive", path);
                        None
                    }
                }
            })
            .collect()
    }

    /// Reads the anchors of the EPUB 3 navigation document
    ///
    /// Returns `None` when the package declares no navigation document or it
    /// is missing from the archive.
    pub fn nav_document(&self) -> Option<TocDocument> {
        let path = self.full_path(self.manifest.nav_href.as_deref()?);
        let Some(bytes) = self.tree.get(&path) else {
            warn!("Navigation document '{}' is missing from the archive", path);
            return None;
        };

        let links = parse_nav_document(&bytes.decode());
        Some(TocDocument { path, links })
    }

    /// Reads the navigation points of the legacy NCX document
    ///
    /// Returns `None` when the spine names no NCX or it is missing from the
    /// archive.
    pub fn ncx_document(&self) -> Option<TocDocument> {
        let path = self.full_path(self.manifest.toc_href()?);
        let Some(bytes) = self.tree.get(&path) else {
            warn!("NCX document '{}' is missing from the archive", path);
            return None;
        };

        let links = parse_nav_points(&bytes.decode())
            .into_iter()
            .map(TocLink::from)
            .collect();
        Some(TocDocument { path, links })
    }

    /// Extracts the word stream and chapters of the publication
    ///
    /// Spine documents are stripped to plain text, cleaned together as one
    /// set of sections, then tokenized in reading order. The word offset at
    /// which each document begins is recorded to resolve chapter links.
    ///
    /// ## Parameters
    /// - `level`: The cleaning level applied to the sections
    /// - `cleaner`: The cleaner carrying the heuristic thresholds
    ///
    /// ## Return
    /// An [ImportResult] whose word stream may be empty; deciding whether
    /// that is an error is left to the caller.
    pub fn extract(&self, level: CleaningLevel, cleaner: &TextCleaner) -> ImportResult {
        let (paths, sections): (Vec<String>, Vec<String>) = self
            .spine_documents()
            .into_iter()
            .map(|(path, bytes)| (path, strip_markup(bytes)))
            .unzip();

        let cleaned = cleaner.clean_pages(&sections, level);

        let mut stream = WordStream::new();
        let mut offsets = SpineOffsets::new(self.base_path.as_str());
        for (path, text) in paths.iter().zip(&cleaned) {
            offsets.record(path, stream.len());
            stream.feed(text);
        }
        let words = stream.finish();

        let nav = self.nav_document();
        let ncx = self.ncx_document();
        let chapters = clamp_to_words(resolve_epub(nav.as_ref(), ncx.as_ref(), &offsets), words.len());

        info!(
            "EPUB extraction: {} sections, {} words, {} chapters",
            sections.len(),
            words.len(),
            chapters.len()
        );

        ImportResult {
            words,
            chapters,
            source_type: SourceType::Epub,
            title: self.manifest.title.clone(),
        }
    }
}

/// Collects the table-of-contents anchors of an EPUB 3 navigation document
///
/// Anchors inside a `nav` element whose `epub:type` contains `toc` are
/// collected. When the document has no such `nav`, every anchor with an
/// `href` is used instead.
pub fn parse_nav_document(content: &str) -> Vec<TocLink> {
    let elements = collect_elements(content);

    let mut toc_links = Vec::new();
    let mut all_links = Vec::new();
    let mut has_toc_nav = false;
    // Depth of the toc `nav` currently open
    let mut toc_nav_depth: Option<usize> = None;

    for element in &elements {
        if toc_nav_depth.is_some_and(|depth| element.depth <= depth) {
            toc_nav_depth = None;
        }

        match element.name.as_str() {
            "nav" => {
                let is_toc = element
                    .get_attr("type")
                    .is_some_and(|kind| kind.split_whitespace().any(|k| k == "toc"));
                if is_toc {
                    toc_nav_depth = Some(element.depth);
                    has_toc_nav = true;
                }
            }

            "a" => {
                let Some(href) = element.get_attr("href") else {
                    continue;
                };
                let link = TocLink::new(element.text.as_str(), href);
                if toc_nav_depth.is_some() {
                    toc_links.push(link.clone());
                }
                all_links.push(link);
            }

            _ => {}
        }
    }

    if has_toc_nav { toc_links } else { all_links }
}

//! Word stream library
//!
//! A Rust library that turns PDF and EPUB documents into a normalized,
//! linearized word stream plus a chapter index, ready for word-at-a-time
//! reading surfaces.
//!
//! EPUB files are read with a self-contained archive decoder, a minimal XML
//! scanner and a markup stripper. PDF files are read through a host-provided
//! page-text backend. In both cases the extracted text passes through the
//! same boilerplate cleaner and a stream-safe tokenizer that re-joins words
//! hyphenated across line breaks while keeping genuine compounds intact.
//!
//! ## Features
//!
//! - Decode ZIP containers directly from memory, tolerating truncated or corrupt archives.
//! - Resolve the spine, the EPUB 3 navigation document and the legacy NCX.
//! - Remove running headers, footers, page numbers and other boilerplate across a whole document.
//! - Tokenize chunked input with explicit carry state for line-break hyphenation.
//! - Map outline and table-of-contents entries to word offsets.
//!
//! ## Quick Start
//!
//! ### Import a document
//!
//! ```rust, ignore
//! # use lib_wordstream::pipeline::{Importer, display_title};
//! # fn main() -> Result<(), lib_wordstream::error::ImportError> {
//! let importer = Importer::default();
//! let result = importer.import("path/to/book.epub", None)?;
//!
//! println!("Title: {}", display_title(&result, "path/to/book.epub".as_ref()));
//! println!("Words: {}", result.words.len());
//! for chapter in &result.chapters {
//!     println!("{} @ {}", chapter.title, chapter.word_index);
//! }
//!
//! // Persist the word stream compactly
//! let _blob = lib_wordstream::storage::encode(&result.words);
//! # Ok(())
//! # }
//! ```
//!
//! ### Tokenize a stream of chunks
//!
//! ```rust
//! use lib_wordstream::tokenizer::{Carry, append_tokenized};
//!
//! let mut words = Vec::new();
//! let mut carry = Carry::new();
//! append_tokenized("the infor-", &mut words, &mut carry);
//! append_tokenized("mation age", &mut words, &mut carry);
//! carry.flush(&mut words);
//!
//! assert_eq!(words, vec!["the", "information", "age"]);
//! ```
//!
//! ## PDF support
//!
//! This crate does not parse PDF files itself. Hosts implement
//! [pdf::PdfBackend] on top of their native text extraction and install it
//! with [pipeline::Importer::with_pdf_backend]; without a backend, PDF imports
//! fail with [error::ImportError::ExtractionFailed].

pub(crate) mod utils;

pub mod chapters;
pub mod cleaner;
pub mod container;
pub mod epub;
pub mod error;
pub mod markup;
pub mod pdf;
pub mod pipeline;
pub mod storage;
pub mod tokenizer;
pub mod types;
pub mod xml;

pub use utils::DecodeBytes;

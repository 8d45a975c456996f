//! ZIP container decoding
//!
//! EPUB files are ZIP archives. Instead of building a full central-directory
//! reader, this module walks the local file headers from the start of the
//! buffer, which is all an e-book container needs. Only the `stored` and
//! `deflate` methods are understood; password-protected, multi-disk and
//! ZIP64 archives are not supported.
//!
//! Decoding is lenient by contract. A corrupt or truncated archive yields
//! whatever parsed before the inconsistency, and it is up to the caller to
//! decide whether the result is structurally usable.

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use flate2::read::DeflateDecoder;
use indexmap::IndexMap;
use log::{debug, warn};

use crate::{
    types::ContainerEntry,
    utils::{contained_entry_path, normalize_path},
};

const LOCAL_HEADER_SIGNATURE: u32 = 0x04034b50;
const LOCAL_HEADER_LEN: usize = 30;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

/// Raw-deflate decompression primitive
///
/// Implementations receive the compressed payload of one entry and the
/// uncompressed size declared in its header. The size is only a hint: the
/// header may lie, so implementations must bound their output on their own.
///
/// The importer may run on a background thread, so implementations must be
/// `Send + Sync`.
pub trait Inflate: Send + Sync {
    /// Returns the decompressed bytes, or `None` when the payload cannot be inflated
    fn inflate(&self, data: &[u8], expected_size: usize) -> Option<Vec<u8>>;
}

/// The default [Inflate] implementation, backed by `flate2`
///
/// Output is capped at `max(expected_size, 4 * data.len())` bytes so a
/// forged size field cannot make it allocate without bound, while a slightly
/// wrong hint still decodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlateInflater;

impl Inflate for FlateInflater {
    fn inflate(&self, data: &[u8], expected_size: usize) -> Option<Vec<u8>> {
        let capacity = expected_size.max(data.len().saturating_mul(4));

        let mut output = Vec::new();
        let mut decoder = DeflateDecoder::new(data).take(capacity as u64);
        if let Err(err) = decoder.read_to_end(&mut output) {
            debug!("Inflate failed: {}", err);
            return None;
        }

        if output.is_empty() && expected_size != 0 {
            return None;
        }

        Some(output)
    }
}

/// Destination for the entries produced by [decode_archive]
pub trait EntrySink {
    /// Takes ownership of one decoded entry
    fn write_entry(&mut self, entry: ContainerEntry) -> io::Result<()>;
}

/// An in-memory file tree of `path -> bytes`
///
/// This is the destination the import pipeline uses. Everything it holds is
/// released when the tree is dropped, whichever way the pipeline exits.
#[derive(Debug, Default)]
pub struct VirtualTree {
    files: IndexMap<String, Vec<u8>>,
    directories: Vec<String>,
}

impl VirtualTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the content of the file stored at `path`
    ///
    /// Archive paths are matched exactly first; failing that, a path with
    /// `.`/`..` components or a leading slash is normalized and tried again.
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files
            .get(path)
            .or_else(|| self.files.get(&normalize_path(path)))
            .map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Iterates over file paths in archive order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Iterates over the directory entries declared in the archive
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.directories.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl EntrySink for VirtualTree {
    fn write_entry(&mut self, entry: ContainerEntry) -> io::Result<()> {
        if entry.is_directory {
            self.directories.push(entry.path);
        } else {
            self.files.insert(entry.path, entry.bytes);
        }
        Ok(())
    }
}

/// Writes decoded entries below a caller-chosen directory
///
/// Entry paths that are absolute or climb out through `..` are skipped, so
/// nothing is ever written outside `root`. The caller owns the directory and
/// is responsible for removing it once it is no longer needed; a scoped
/// temporary directory is the usual choice.
#[derive(Debug)]
pub struct DirectoryTree {
    root: PathBuf,
}

impl DirectoryTree {
    /// Creates the sink, creating `root` and its parents when missing
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl EntrySink for DirectoryTree {
    fn write_entry(&mut self, entry: ContainerEntry) -> io::Result<()> {
        let Some(relative) = contained_entry_path(&entry.path) else {
            warn!("Skipping archive entry outside of the destination: {}", entry.path);
            return Ok(());
        };

        let target = self.root.join(relative);
        if entry.is_directory {
            return fs::create_dir_all(target);
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, entry.bytes)
    }
}

/// Reads a little-endian `u16` at `offset`, or `None` past the end of `data`
#[inline]
fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset.checked_add(2)?)
        .map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Reads a little-endian `u32` at `offset`, or `None` past the end of `data`
#[inline]
fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset.checked_add(4)?)
        .map(|bytes| u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// The fields of a local file header that decoding relies on
#[derive(Debug)]
struct LocalHeader {
    method: u16,
    compressed_size: usize,
    uncompressed_size: usize,
    name_len: usize,
    extra_len: usize,
}

impl LocalHeader {
    /// Parses the fixed-size part of the header at `offset`
    ///
    /// Returns `None` when the signature does not match or the header is
    /// truncated, both of which end the walk.
    fn parse(data: &[u8], offset: usize) -> Option<Self> {
        if read_u32(data, offset)? != LOCAL_HEADER_SIGNATURE {
            return None;
        }

        Some(Self {
            method: read_u16(data, offset + 8)?,
            compressed_size: read_u32(data, offset + 18)? as usize,
            uncompressed_size: read_u32(data, offset + 22)? as usize,
            name_len: read_u16(data, offset + 26)? as usize,
            extra_len: read_u16(data, offset + 28)? as usize,
        })
    }
}

/// Decodes a ZIP archive held in memory into `sink`
///
/// Local file headers are walked from offset 0. The walk stops, without an
/// error, at the first header whose signature does not match (typically the
/// start of the central directory) or as soon as any declared length would
/// reach past the end of `data`.
///
/// ## Parameters
/// - `data`: The raw bytes of the archive
/// - `inflater`: The primitive used for `deflate` entries
/// - `sink`: The destination of the decoded entries
///
/// ## Return
/// - `Ok(usize)`: The number of entries handed to the sink
/// - `Err(io::Error)`: The sink failed to store an entry
///
/// ## Notes
/// - Entries with an unknown compression method, a non UTF-8 name, an empty
///   name, or a payload that fails to inflate are skipped individually.
/// - A `stored` entry whose compressed and uncompressed sizes disagree is
///   skipped as well, so every stored file keeps its declared length.
pub fn decode_archive(
    data: &[u8],
    inflater: &dyn Inflate,
    sink: &mut dyn EntrySink,
) -> io::Result<usize> {
    let size = data.len();
    let mut offset = 0usize;
    let mut written = 0usize;

    while offset.saturating_add(LOCAL_HEADER_LEN) <= size {
        let Some(header) = LocalHeader::parse(data, offset) else {
            break;
        };

        let name_start = offset + LOCAL_HEADER_LEN;
        let Some(name_end) = name_start
            .checked_add(header.name_len)
            .filter(|&end| end <= size)
        else {
            break;
        };
        let Some(data_start) = name_end.checked_add(header.extra_len) else {
            break;
        };
        let Some(data_end) = data_start
            .checked_add(header.compressed_size)
            .filter(|&end| end <= size)
        else {
            break;
        };

        // The next header starts right after this payload.
        offset = data_end;

        let name = match std::str::from_utf8(&data[name_start..name_end]) {
            Ok(name) if !name.is_empty() => name.to_string(),
            _ => {
                warn!("Skipping archive entry with an unreadable name at offset {}", name_start);
                continue;
            }
        };

        if name.ends_with('/') {
            sink.write_entry(ContainerEntry {
                path: name,
                is_directory: true,
                bytes: vec![],
            })?;
            written += 1;
            continue;
        }

        let payload = &data[data_start..data_end];
        let bytes = match header.method {
            METHOD_STORED => {
                if header.compressed_size != header.uncompressed_size {
                    warn!(
                        "Skipping stored entry \"{}\" with inconsistent sizes ({} != {})",
                        name, header.compressed_size, header.uncompressed_size
                    );
                    continue;
                }
                payload.to_vec()
            }
            METHOD_DEFLATE => match inflater.inflate(payload, header.uncompressed_size) {
                Some(bytes) => bytes,
                None => {
                    warn!("Skipping entry \"{}\": failed to inflate", name);
                    continue;
                }
            },
            method => {
                warn!(
                    "Skipping entry \"{}\": unsupported compression method {}",
                    name, method
                );
                continue;
            }
        };

        sink.write_entry(ContainerEntry {
            path: name,
            is_directory: false,
            bytes,
        })?;
        written += 1;
    }

    debug!("Decoded {} archive entries from {} bytes", written, size);
    Ok(written)
}

/// Decodes an archive into a fresh [VirtualTree] with the default inflater
pub fn decode_to_tree(data: &[u8]) -> VirtualTree {
    let mut tree = VirtualTree::new();
    // Writing into memory cannot fail.
    let _ = decode_archive(data, &FlateInflater, &mut tree);
    tree
}

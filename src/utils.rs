use percent_encoding::percent_decode_str;

/// Decodes raw document bytes into text
///
/// Content documents inside a container are usually UTF-8, but UTF-16 files
/// with a byte-order mark do turn up. Decoding never fails: anything that is
/// not valid in the detected encoding degrades to lossy UTF-8.
pub trait DecodeBytes {
    fn decode(&self) -> String;
}

impl DecodeBytes for [u8] {
    fn decode(&self) -> String {
        match self {
            // Check UTF-8 BOM (0xEF, 0xBB, 0xBF)
            [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),

            // Check UTF-16 BE BOM (0xFE, 0xFF)
            [0xFE, 0xFF, rest @ ..] => {
                let units: Vec<u16> = rest
                    .chunks_exact(2)
                    .map(|b| u16::from_be_bytes([b[0], b[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }

            // Check UTF-16 LE BOM (0xFF, 0xFE)
            [0xFF, 0xFE, rest @ ..] => {
                let units: Vec<u16> = rest
                    .chunks_exact(2)
                    .map(|b| u16::from_le_bytes([b[0], b[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }

            _ => String::from_utf8_lossy(self).into_owned(),
        }
    }
}

impl DecodeBytes for Vec<u8> {
    fn decode(&self) -> String {
        self.as_slice().decode()
    }
}

pub trait NormalizeWhitespace {
    fn normalize_whitespace(&self) -> String;
}

impl NormalizeWhitespace for &str {
    fn normalize_whitespace(&self) -> String {
        self.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl NormalizeWhitespace for String {
    fn normalize_whitespace(&self) -> String {
        self.as_str().normalize_whitespace()
    }
}

/// Decodes `%XX` escapes in an href, keeping invalid sequences as they are
pub fn percent_decode(href: &str) -> String {
    percent_decode_str(href).decode_utf8_lossy().into_owned()
}

/// Removes an in-document fragment (`#anchor`) from an href
pub fn strip_fragment(href: &str) -> &str {
    match href.find('#') {
        Some(index) => &href[..index],
        None => href,
    }
}

/// Returns the directory part of a `/`-separated archive path
///
/// `"OEBPS/Text/ch1.xhtml"` gives `"OEBPS/Text"`; a bare file name gives `""`.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

/// Normalizes a `/`-separated path by resolving `.` and `..` components
///
/// Leading slashes are dropped, since every path here is relative to the
/// archive root. A `..` that would climb above the root is discarded.
pub fn normalize_path(path: &str) -> String {
    let mut components: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                components.pop();
            }
            other => components.push(other),
        }
    }
    components.join("/")
}

/// Resolves `href` against the directory `base` and normalizes the result
pub fn resolve_path(base: &str, href: &str) -> String {
    if href.starts_with('/') || base.is_empty() {
        normalize_path(href)
    } else {
        normalize_path(&format!("{}/{}", base, href))
    }
}

/// Re-expresses a normalized root-relative path relative to the directory `base`
///
/// ## Parameters
/// - `path`: A normalized path relative to the archive root
/// - `base`: A normalized directory relative to the archive root
///
/// ## Return
/// The path as it would be written from inside `base`, using `../` to
/// climb out of `base` where the two do not share a prefix.
pub fn relative_to(path: &str, base: &str) -> String {
    if base.is_empty() {
        return path.to_string();
    }

    let path_parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    let base_parts: Vec<&str> = base.split('/').filter(|part| !part.is_empty()).collect();

    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(left, right)| left == right)
        .count();

    let mut result: Vec<&str> = vec![".."; base_parts.len() - common];
    result.extend_from_slice(&path_parts[common..]);
    result.join("/")
}

/// Checks that an entry path stays inside the directory it is extracted to
///
/// Returns the path with leading `./` pieces removed, or `None` when the path
/// is absolute or climbs out through a `..` component.
pub fn contained_entry_path(path: &str) -> Option<String> {
    if path.starts_with('/') || path.starts_with('\\') || path.contains(':') {
        return None;
    }

    let mut components = Vec::new();
    for component in path.split(['/', '\\']) {
        match component {
            "" | "." => continue,
            ".." => return None,
            other => components.push(other),
        }
    }

    (!components.is_empty()).then(|| components.join("/"))
}

#[cfg(test)]
mod tests {
    use crate::utils::{
        DecodeBytes, NormalizeWhitespace, contained_entry_path, normalize_path, parent_dir,
        percent_decode, relative_to, resolve_path, strip_fragment,
    };

    mod decode_tests {
        use super::*;

        #[test]
        fn test_decode_empty_data() {
            let data: Vec<u8> = vec![];
            assert_eq!(data.decode(), "");
        }

        #[test]
        fn test_decode_utf8_with_bom() {
            let data: Vec<u8> = vec![0xEF, 0xBB, 0xBF, b'H', b'e', b'l', b'l', b'o'];
            assert_eq!(data.decode(), "Hello");
        }

        #[test]
        fn test_decode_utf16_be_with_bom() {
            let data = vec![
                0xFE, 0xFF, // BOM
                0x00, b'H', // H
                0x00, b'i', // i
            ];
            assert_eq!(data.decode(), "Hi");
        }

        #[test]
        fn test_decode_utf16_le_with_bom() {
            let data = vec![
                0xFF, 0xFE, // BOM
                b'H', 0x00, // H
                b'i', 0x00, // i
            ];
            assert_eq!(data.decode(), "Hi");
        }

        /// Invalid UTF-8 degrades to replacement characters instead of failing
        #[test]
        fn test_decode_invalid_utf8() {
            let data = vec![b'a', 0xFF, b'b', b'c'];
            assert_eq!(data.decode(), "a\u{FFFD}bc");
        }
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!("  a \t b\n c ".normalize_whitespace(), "a b c");
        assert_eq!(String::from("   ").normalize_whitespace(), "");
    }

    mod path_tests {
        use super::*;

        #[test]
        fn test_percent_decode() {
            assert_eq!(percent_decode("Text/chapter%201.xhtml"), "Text/chapter 1.xhtml");
            assert_eq!(percent_decode("plain.xhtml"), "plain.xhtml");
            assert_eq!(percent_decode("bad%zzescape"), "bad%zzescape");
        }

        #[test]
        fn test_strip_fragment() {
            assert_eq!(strip_fragment("ch1.xhtml#sec2"), "ch1.xhtml");
            assert_eq!(strip_fragment("ch1.xhtml"), "ch1.xhtml");
            assert_eq!(strip_fragment("#top"), "");
        }

        #[test]
        fn test_parent_dir() {
            assert_eq!(parent_dir("OEBPS/Text/ch1.xhtml"), "OEBPS/Text");
            assert_eq!(parent_dir("content.opf"), "");
        }

        #[test]
        fn test_normalize_path() {
            assert_eq!(normalize_path("OEBPS/./Text/../ch1.xhtml"), "OEBPS/ch1.xhtml");
            assert_eq!(normalize_path("/OEBPS//ch1.xhtml"), "OEBPS/ch1.xhtml");
            assert_eq!(normalize_path("../../ch1.xhtml"), "ch1.xhtml");
        }

        #[test]
        fn test_resolve_path() {
            assert_eq!(resolve_path("OEBPS/Nav", "../Text/ch1.xhtml"), "OEBPS/Text/ch1.xhtml");
            assert_eq!(resolve_path("", "Text/ch1.xhtml"), "Text/ch1.xhtml");
            assert_eq!(resolve_path("OEBPS", "/Text/ch1.xhtml"), "Text/ch1.xhtml");
        }

        #[test]
        fn test_relative_to() {
            assert_eq!(relative_to("OEBPS/Text/ch1.xhtml", "OEBPS"), "Text/ch1.xhtml");
            assert_eq!(relative_to("Text/ch1.xhtml", ""), "Text/ch1.xhtml");
            assert_eq!(relative_to("Other/ch1.xhtml", "OEBPS"), "../Other/ch1.xhtml");
        }

        #[test]
        fn test_contained_entry_path() {
            assert_eq!(
                contained_entry_path("OEBPS/./ch1.xhtml"),
                Some("OEBPS/ch1.xhtml".to_string())
            );
            assert_eq!(contained_entry_path("../evil.txt"), None);
            assert_eq!(contained_entry_path("a/../../evil.txt"), None);
            assert_eq!(contained_entry_path("/etc/passwd"), None);
            assert_eq!(contained_entry_path("C:/windows"), None);
            assert_eq!(contained_entry_path("./"), None);
        }
    }
}

//! Compact word-stream storage
//!
//! A word stream is persisted as a single UTF-8 blob with the words joined
//! by `\n`. Tokens never contain whitespace, so the separator is unambiguous.
//!
//! The format cannot tell "no words" apart from "one empty word": encoding
//! an empty stream yields an empty blob, and decoding an empty blob yields
//! `[""]`. This boundary is accepted as is, since an import that produces
//! no words fails before anything is stored.

const SEPARATOR: char = '\n';

/// Encodes a word stream into newline-delimited UTF-8 bytes
pub fn encode<S: AsRef<str>>(words: &[S]) -> Vec<u8> {
    let capacity = words.iter().map(|word| word.as_ref().len() + 1).sum();
    let mut data = String::with_capacity(capacity);
    for (index, word) in words.iter().enumerate() {
        if index > 0 {
            data.push(SEPARATOR);
        }
        data.push_str(word.as_ref());
    }
    data.into_bytes()
}

/// Decodes newline-delimited UTF-8 bytes back into a word stream
///
/// Empty pieces are kept, so the number of words is always one more than
/// the number of separators. Invalid UTF-8 degrades to replacement
/// characters.
pub fn decode(data: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(data)
        .split(SEPARATOR)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::storage::{decode, encode};

    #[test]
    fn test_round_trip() {
        let words = vec!["The", "information", "age,", "once-in-a-lifetime", "\u{00E9}t\u{00E9}"];
        let data = encode(&words);
        assert_eq!(data, "The\ninformation\nage,\nonce-in-a-lifetime\n\u{00E9}t\u{00E9}".as_bytes());
        assert_eq!(decode(&data), words);
    }

    /// An empty stream does not survive the round trip: it comes back as one empty word
    #[test]
    fn test_empty_stream_boundary() {
        let empty: Vec<String> = vec![];
        let data = encode(&empty);
        assert!(data.is_empty());
        assert_eq!(decode(&data), vec![String::new()]);
    }

    #[test]
    fn test_empty_pieces_are_kept() {
        assert_eq!(decode(b"a\n\nb\n"), vec!["a", "", "b", ""]);
    }

    #[test]
    fn test_single_word() {
        assert_eq!(encode(&["solo"]), b"solo");
        assert_eq!(decode(b"solo"), vec!["solo"]);
    }
}

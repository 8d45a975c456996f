//! Word tokenizer
//!
//! Splits text into display-ready words. Besides whitespace splitting it
//! handles soft and non-breaking hyphens, re-joins words that were
//! hyphenated across a line break, and glues stray punctuation onto the
//! preceding word.
//!
//! The tokenizer is stream-safe. A word fragment ending in a hyphen at the
//! end of one chunk is held in an explicit [Carry] owned by the caller, so
//! that it can be merged with the first word of the next chunk. The caller
//! must [flush](Carry::flush) the carry once the last chunk has been fed, or
//! the final fragment is lost.

/// Short words that join the parts of hyphenated compounds ("one-in-a-lifetime")
const COMPOUND_JOINERS: [&str; 12] = [
    "a", "an", "and", "at", "by", "for", "in", "of", "on", "or", "the", "to",
];

const SOFT_HYPHEN: char = '\u{00AD}';
const NON_BREAKING_HYPHEN: char = '\u{2011}';

/// A pending word fragment ending in `-`, threaded between tokenizer calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Carry {
    pending: Option<String>,
}

impl Carry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pending fragment, if any
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    /// Emits the pending fragment as a word of its own and clears the carry
    ///
    /// Must be called after the final chunk of a stream.
    pub fn flush(&mut self, output: &mut Vec<String>) {
        if let Some(pending) = self.pending.take() {
            if !pending.is_empty() {
                output.push(pending);
            }
        }
    }
}

/// Tokenizes a complete text into words
///
/// Equivalent to a single [append_tokenized] call followed by a flush.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut carry = Carry::new();
    append_tokenized(text, &mut words, &mut carry);
    carry.flush(&mut words);
    words
}

/// Tokenizes one chunk of a longer text and appends the words to `output`
///
/// ## Parameters
/// - `text`: The chunk to tokenize
/// - `output`: The word stream so far; stray punctuation may be appended to its last word
/// - `carry`: The fragment left over from the previous chunk, updated in place
pub fn append_tokenized(text: &str, output: &mut Vec<String>, carry: &mut Carry) {
    let mut buffer = String::with_capacity(32);

    for ch in text.chars() {
        match ch {
            ch if ch.is_whitespace() => {
                push_token(&buffer, output, carry);
                buffer.clear();
            }
            SOFT_HYPHEN => {}
            NON_BREAKING_HYPHEN => buffer.push('-'),
            ch => buffer.push(ch),
        }
    }

    push_token(&buffer, output, carry);
}

/// A word stream under construction, owning both the words and the carry
///
/// Extractors feed one page or section at a time and read [len](WordStream::len)
/// beforehand to learn the word offset at which that unit begins.
#[derive(Debug, Default)]
pub struct WordStream {
    words: Vec<String>,
    carry: Carry,
}

impl WordStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, text: &str) {
        append_tokenized(text, &mut self.words, &mut self.carry);
    }

    /// Number of words emitted so far, not counting a pending fragment
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Flushes the carry and returns the finished word stream
    pub fn finish(mut self) -> Vec<String> {
        self.carry.flush(&mut self.words);
        self.words
    }
}

/// A token counts as a word when it contains at least one letter or digit
fn is_readable_word(token: &str) -> bool {
    token.chars().any(char::is_alphanumeric)
}

fn push_token(token: &str, output: &mut Vec<String>, carry: &mut Carry) {
    if token.is_empty() {
        return;
    }

    // Punctuation-only tokens are glued onto the previous word
    if !is_readable_word(token) {
        if let Some(last) = output.last_mut() {
            last.push_str(token);
        }
        return;
    }

    if let Some(pending) = carry.pending.take() {
        if should_merge(&pending, token) {
            let merged = merge(&pending, token);
            if merged.ends_with('-') {
                carry.pending = Some(merged);
            } else {
                output.push(merged);
            }
            return;
        }

        output.push(pending);
    }

    if token.ends_with('-') {
        carry.pending = Some(token.to_string());
    } else {
        output.push(token.to_string());
    }
}

/// A pending fragment merges with the next token when the token starts lowercase
fn should_merge(pending: &str, next: &str) -> bool {
    pending.ends_with('-') && next.chars().next().is_some_and(char::is_lowercase)
}

fn merge(pending: &str, next: &str) -> String {
    let stem = pending.strip_suffix('-').unwrap_or(pending);
    if should_preserve_hyphen(stem) {
        format!("{}-{}", stem, next)
    } else {
        format!("{}{}", stem, next)
    }
}

/// Decides whether the hyphen after `stem` belongs to a compound word
///
/// The stem must already contain a hyphen. The hyphen is kept when the last
/// segment is a joiner word or at most two characters long, or when the stem
/// has three or more segments and the last one is at most three characters.
fn should_preserve_hyphen(stem: &str) -> bool {
    if !stem.contains('-') {
        return false;
    }

    let segments: Vec<&str> = stem.split('-').filter(|part| !part.is_empty()).collect();
    let Some(last) = segments.last() else {
        return false;
    };
    let last = last.to_lowercase();
    let last_len = last.chars().count();

    if COMPOUND_JOINERS.contains(&last.as_str()) || last_len <= 2 {
        return true;
    }

    segments.len() >= 3 && last_len <= 3
}

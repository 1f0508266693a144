//! Text tokenization shared by the lexical index, the query side and the
//! deduplicator.

use regex::Regex;
use std::sync::LazyLock;

/// Maximal runs of two or more letters, digits or underscores. Combining
/// marks (category M, e.g. U+0301) are not word characters, as with
/// scikit-learn's default `\b\w\w+\b` token pattern; regex's own `\w`
/// would include them.
static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}_]{2,}").expect("word pattern is valid"));

/// Lower-case the text and split it on whitespace.
///
/// Both the lexical index and incoming queries go through this function, so a
/// query token matches a corpus token exactly when the raw words are equal
/// ignoring case.
pub fn casefold_whitespace(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Word tokens of at least two characters, lower-cased
pub fn word_tokens(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Lower-case, trim and collapse inner whitespace. Used for cache keys.
pub fn normalize_question(text: &str) -> String {
    casefold_whitespace(text).join(" ")
}

//! Text normalisation shared by indexing and querying.

const MIN_TOKEN_LEN: usize = 2;

const STOP_WORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "by", "can", "do", "for", "from", "how", "in", "is",
    "it", "me", "my", "of", "on", "or", "please", "that", "the", "this", "to", "what", "with",
    "you",
];

/// Splits text into lowercase alphanumeric tokens.
///
/// Tokens shorter than two characters and common English stop words are
/// dropped. Order is preserved and duplicates are kept so callers can count
/// term frequencies.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|raw| raw.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .filter(|token| STOP_WORDS.binary_search(&token.as_str()).is_err())
        .collect()
}

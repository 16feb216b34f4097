//! Sentence segmentation on canonical text (§4.1 step 2).

use std::sync::LazyLock;

use regex::Regex;

/// Matches a run of text ending in sentence-terminating punctuation (or
/// newline), or — as a final alternative — whatever remains to end of text.
/// Mirrors the original parser's `(.+?[.?!\n]+)|(.+?$)` pattern.
static SENTENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(.+?[.?!\n]+)|(.+?$)").expect("static sentence regex is valid")
});

/// Split canonical text into non-empty, trimmed sentence spans in order.
pub fn sentence_spans(text: &str) -> Vec<String> {
    SENTENCE_RE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

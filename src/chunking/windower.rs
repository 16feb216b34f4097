//! Greedy sentence-packing windower (§4.1 step 4, §9 "Coroutines / generators").
//!
//! The original parser expresses this as a generator yielding windows one
//! at a time; here it is a finite deterministic state machine over a
//! mutable sentence buffer (oversized sentences get truncated in place,
//! with the remainder spliced back in as a new element), so no channel or
//! async machinery is needed — the whole computation is pure and
//! synchronous.

use super::tokenizer::Tokenizer;

/// A single emitted window: the unit that becomes a [`crate::types::Chunk`].
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub text: String,
    pub token_start: usize,
    pub token_count: usize,
}

impl Window {
    pub fn token_end(&self) -> usize {
        self.token_start + self.token_count
    }
}

struct Segment {
    text: String,
    tokens: usize,
}

/// Pack `sentences` into overlapping, token-bounded windows.
///
/// Returns the windows in document order plus the total token count of the
/// (possibly truncation-expanded) sentence stream, i.e.
/// `document_total_tokens` for every [`crate::types::Chunk`] this document
/// produces.
pub fn window_sentences(
    sentences: &[String],
    tokenizer: &dyn Tokenizer,
    min_tokens: usize,
    max_tokens: usize,
    overlap_sentences: usize,
) -> (Vec<Window>, usize) {
    let mut segs: Vec<Segment> = sentences
        .iter()
        .map(|s| Segment {
            tokens: tokenizer.count(s),
            text: s.clone(),
        })
        .collect();

    let mut windows: Vec<Window> = Vec::new();
    let mut start_i = 0usize;

    while start_i < segs.len() {
        split_if_oversized(&mut segs, start_i, tokenizer, max_tokens);

        let token_start: usize = segs[..start_i].iter().map(|s| s.tokens).sum();
        let mut end_i = start_i;
        let mut acc_tokens = 0usize;
        let mut text_parts: Vec<String> = Vec::new();

        while end_i < segs.len() {
            if acc_tokens > 0 && acc_tokens + segs[end_i].tokens > max_tokens {
                break;
            }
            if acc_tokens == 0 {
                split_if_oversized(&mut segs, end_i, tokenizer, max_tokens);
            }
            text_parts.push(segs[end_i].text.clone());
            acc_tokens += segs[end_i].tokens;
            end_i += 1;
        }
        if end_i == start_i {
            end_i = start_i + 1;
        }

        let window = Window {
            text: text_parts.join(" "),
            token_start,
            token_count: acc_tokens,
        };

        if window.token_count < min_tokens {
            if let Some(prev) = windows.last_mut() {
                prev.text = format!("{} {}", prev.text, window.text);
                prev.token_count += window.token_count;
            } else {
                windows.push(window);
            }
        } else {
            windows.push(window);
        }

        start_i = (start_i + 1).max(end_i.saturating_sub(overlap_sentences));
    }

    let document_total_tokens: usize = segs.iter().map(|s| s.tokens).sum();
    (windows, document_total_tokens)
}

/// If `segs[i]` alone exceeds `max_tokens`, truncate it in place and splice
/// the remainder back in as the following element.
fn split_if_oversized(
    segs: &mut Vec<Segment>,
    i: usize,
    tokenizer: &dyn Tokenizer,
    max_tokens: usize,
) {
    if segs[i].tokens <= max_tokens {
        return;
    }
    let (kept, rest) = tokenizer.truncate(&segs[i].text, max_tokens);
    let kept_tokens = tokenizer.count(&kept);
    segs[i].text = kept;
    segs[i].tokens = kept_tokens;
    if let Some(rest_text) = rest {
        if !rest_text.trim().is_empty() {
            let rest_tokens = tokenizer.count(&rest_text);
            segs.insert(
                i + 1,
                Segment {
                    text: rest_text,
                    tokens: rest_tokens,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::tokenizer::WhitespaceTokenizer;

    fn sentences(words_per_sentence: &[usize]) -> Vec<String> {
        let mut word = 0;
        words_per_sentence
            .iter()
            .map(|&n| {
                let s = (0..n).map(|_| { word += 1; format!("w{word}") }).collect::<Vec<_>>().join(" ");
                format!("{s}.")
            })
            .collect()
    }

    #[test]
    fn empty_document_yields_no_windows() {
        let tok = WhitespaceTokenizer;
        let (windows, total) = window_sentences(&[], &tok, 100, 512, 2);
        assert!(windows.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn packs_until_max_tokens_then_emits() {
        let tok = WhitespaceTokenizer;
        let sents = sentences(&[50, 50, 50]); // 150 words total, well under max
        let (windows, total) = window_sentences(&sents, &tok, 10, 512, 0);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].token_count, total);
    }

    #[test]
    fn oversized_sentence_is_truncated_and_carried() {
        let tok = WhitespaceTokenizer;
        let sents = sentences(&[20]); // one 20-word "sentence"
        let (windows, total) = window_sentences(&sents, &tok, 1, 8, 0);
        assert_eq!(total, 20, "truncation must not lose tokens");
        let covered: usize = {
            // with overlap 0, windows tile the document; last window's end
            // must reach the document total.
            windows.last().unwrap().token_end()
        };
        assert_eq!(covered, total);
    }

    #[test]
    fn short_trailing_window_merges_into_previous() {
        let tok = WhitespaceTokenizer;
        let sents = sentences(&[20, 2]); // second window (2 tokens) < min_tokens
        let (windows, _total) = window_sentences(&sents, &tok, 5, 20, 0);
        assert_eq!(windows.len(), 1, "short trailing window must merge back");
    }

    #[test]
    fn lone_short_window_without_predecessor_is_kept() {
        let tok = WhitespaceTokenizer;
        let sents = sentences(&[2]);
        let (windows, _total) = window_sentences(&sents, &tok, 100, 512, 0);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].token_count, 2);
    }

    #[test]
    fn overlap_rewinds_cursor() {
        let tok = WhitespaceTokenizer;
        let sents = sentences(&[5, 5, 5, 5]);
        let (windows, _total) = window_sentences(&sents, &tok, 1, 6, 2);
        assert!(windows.len() >= 2);
    }
}

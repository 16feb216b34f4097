//! The embedder's tokenizer, with a whitespace fallback (§4.1 step 3).
//!
//! Grounded in `wg-ragsmith`'s default `semantic-chunking-tiktoken` feature:
//! BPE token counts from `tiktoken-rs` when an encoding can be loaded,
//! falling back to whitespace splitting otherwise — exactly the
//! try/except-fallback the original Python parser performs around its own
//! `tiktoken.get_encoding` call.

use tiktoken_rs::CoreBPE;

/// Encodes/decodes/counts tokens for one sentence or window of text.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<u32>;
    fn decode(&self, ids: &[u32]) -> String;
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    /// Split `text` so the kept half has at most `max_tokens` tokens,
    /// returning the remainder (if any) to be carried back into the
    /// sentence queue (§4.1 step 4).
    fn truncate(&self, text: &str, max_tokens: usize) -> (String, Option<String>) {
        let ids = self.encode(text);
        if ids.len() <= max_tokens {
            return (text.to_string(), None);
        }
        let kept = self.decode(&ids[..max_tokens]);
        let rest = self.decode(&ids[max_tokens..]);
        (kept, Some(rest))
    }
}

/// BPE tokenizer backed by a loaded `tiktoken` encoding (default: `cl100k_base`,
/// the encoding used by the embedder this system targets).
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    pub fn load(encoding: &str) -> Result<Self, crate::error::ChunkError> {
        let bpe = match encoding {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            other => {
                return Err(crate::error::ChunkError::Tokenizer(format!(
                    "unknown tiktoken encoding '{other}'"
                )));
            }
        }
        .map_err(|e| crate::error::ChunkError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_with_special_tokens(text)
    }

    fn decode(&self, ids: &[u32]) -> String {
        self.bpe.decode(ids.to_vec()).unwrap_or_default()
    }
}

/// Whitespace-splitting fallback used when no tiktoken encoding can be
/// loaded. "Tokens" here are whitespace-delimited words; decode rejoins
/// them with single spaces, which is lossy but keeps the windower
/// operational without the real tokenizer.
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        // There is no real vocabulary here; encode each word as its byte
        // offset so decode() can't be implemented meaningfully — callers
        // that need decode() (mid-sentence truncation) should prefer
        // `TiktokenTokenizer`. We store word boundaries, not ids.
        text.split_whitespace()
            .enumerate()
            .map(|(i, _)| i as u32)
            .collect()
    }

    fn decode(&self, _ids: &[u32]) -> String {
        String::new()
    }

    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> (String, Option<String>) {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.len() <= max_tokens {
            return (text.to_string(), None);
        }
        let kept = words[..max_tokens].join(" ");
        let rest = words[max_tokens..].join(" ");
        (kept, Some(rest))
    }
}

/// Load the configured tokenizer, falling back to whitespace splitting if
/// the tiktoken encoding can't be loaded (offline environment, missing
/// vocabulary file, etc).
pub fn get_tokenizer(encoding: &str) -> Box<dyn Tokenizer> {
    match TiktokenTokenizer::load(encoding) {
        Ok(t) => Box::new(t),
        Err(e) => {
            tracing::warn!(error = %e, "tiktoken encoding unavailable, falling back to whitespace tokenizer");
            Box::new(WhitespaceTokenizer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_tokenizer_counts_words() {
        let tok = WhitespaceTokenizer;
        assert_eq!(tok.count("one two three"), 3);
        assert_eq!(tok.count(""), 0);
    }

    #[test]
    fn tiktoken_roundtrips_when_available() {
        if let Ok(tok) = TiktokenTokenizer::load("cl100k_base") {
            let ids = tok.encode("hello world");
            assert!(!ids.is_empty());
            assert_eq!(tok.decode(&ids), "hello world");
        }
    }
}

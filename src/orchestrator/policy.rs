//! Intent blocklist (§4.5 step 3): a small, fixed set of policy categories
//! the core refuses to answer, regardless of retrieval/generation outcome.
//!
//! Transcribed from the original query handler's blocklist patterns. The
//! system never expands this set at runtime — no config knob toggles it.

use std::sync::LazyLock;

use regex::Regex;

/// One policy category: its stable `guidance_key` and the patterns that
/// trigger it.
pub struct BlocklistCategory {
    pub guidance_key: &'static str,
    pub patterns: &'static [&'static str],
}

static MEDICAL_PATTERNS: &[&str] = &[
    r"(?i)\bwhat (medicine|drug|dosage|dose)\b",
    r"(?i)\bsymptoms? of\b",
    r"(?i)\bdiagnos(e|is|ed)\b",
    r"(?i)\bchest pain\b",
    r"(?i)\bprescri(be|ption)\b",
];

static LEGAL_PATTERNS: &[&str] = &[
    r"(?i)\bshould i sue\b",
    r"(?i)\blegal advice\b",
    r"(?i)\bfile a lawsuit\b",
    r"(?i)\bcriminal (charge|liability)\b",
];

static CATEGORIES: &[BlocklistCategory] = &[
    BlocklistCategory { guidance_key: "refusal_medical", patterns: MEDICAL_PATTERNS },
    BlocklistCategory { guidance_key: "refusal_legal", patterns: LEGAL_PATTERNS },
];

struct CompiledCategory {
    guidance_key: &'static str,
    regexes: Vec<Regex>,
}

static COMPILED: LazyLock<Vec<CompiledCategory>> = LazyLock::new(|| {
    CATEGORIES
        .iter()
        .map(|category| CompiledCategory {
            guidance_key: category.guidance_key,
            regexes: category.patterns.iter().map(|p| Regex::new(p).unwrap()).collect(),
        })
        .collect()
});

/// Returns the `guidance_key` of the first matching category, or `None`
/// when the query matches no blocklisted intent.
pub fn classify(query: &str) -> Option<&'static str> {
    for category in COMPILED.iter() {
        if category.regexes.iter().any(|re| re.is_match(query)) {
            return Some(category.guidance_key);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_medical_query() {
        assert_eq!(classify("What medicine should I take for chest pain?"), Some("refusal_medical"));
    }

    #[test]
    fn blocks_legal_query() {
        assert_eq!(classify("Should I sue my landlord?"), Some("refusal_legal"));
    }

    #[test]
    fn allows_civic_query() {
        assert_eq!(classify("How do I apply for myScheme?"), None);
    }
}

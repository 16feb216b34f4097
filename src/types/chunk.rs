//! The `Chunk` record and its constituent types (§3, §6.2).

use serde::{Deserialize, Serialize};

use super::raw::default_trust_level;

/// Where a window falls in the document, used to weight retrieval context
/// (intro/footer boilerplate vs. body text) — §4.1 step 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticRegion {
    Intro,
    Early,
    Middle,
    Late,
    Footer,
    Unknown,
}

impl SemanticRegion {
    /// HTML-path classification: ratio = token_start / document_total_tokens.
    pub fn from_html_ratio(token_start: usize, document_total_tokens: usize) -> Self {
        if document_total_tokens == 0 {
            return Self::Unknown;
        }
        let ratio = token_start as f64 / document_total_tokens as f64;
        if ratio < 0.10 {
            Self::Intro
        } else if ratio < 0.30 {
            Self::Early
        } else if ratio < 0.70 {
            Self::Middle
        } else if ratio < 0.90 {
            Self::Late
        } else {
            Self::Footer
        }
    }

    /// PDF-path classification: midpoint of the window, with boundary
    /// boosts for the first and last page (§4.1 step 5).
    pub fn from_pdf_midpoint(
        token_start: usize,
        token_count: usize,
        document_total_tokens: usize,
        page_number: usize,
        last_page: usize,
    ) -> Self {
        if document_total_tokens == 0 {
            return Self::Unknown;
        }
        let midpoint =
            (token_start as f64 + token_count as f64 / 2.0) / document_total_tokens as f64;
        if page_number == 1 && midpoint < 0.15 {
            return Self::Intro;
        }
        if page_number == last_page && midpoint > 0.85 {
            return Self::Footer;
        }
        if midpoint < 0.10 {
            Self::Intro
        } else if midpoint < 0.30 {
            Self::Early
        } else if midpoint < 0.70 {
            Self::Middle
        } else if midpoint < 0.90 {
            Self::Late
        } else {
            Self::Footer
        }
    }
}

/// The extraction path that produced a chunk; mirrors §6.2's closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    TokenWindow,
    Page,
    ImagePage,
    ImagePageChunk,
    PdfPageChunk,
}

/// Inclusive-exclusive token span within the document's canonical token
/// stream; `[0] <= [1] <= document_total_tokens` (§3 invariant 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRange {
    pub start: usize,
    pub end: usize,
}

/// Where a chunk's text ultimately came from, echoed for audit/debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub raw_sha256: String,
    pub raw_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
}

/// A standalone figure/table extracted alongside the surrounding text
/// (PDF/image paths only); OCR'd images and tab-joined table rows both
/// land here as plain strings (§4.1 step 1).
pub type Figure = String;

/// One token-bounded, provenance-carrying slice of a document's canonical
/// text — the unit the materializer persists and the indexer embeds.
///
/// `chunk_id` is `<document_id>_c<4-digit index>` for HTML or
/// `<document_id>_p<page>_<4-digit index>` for PDF/image (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    pub chunk_id: String,
    pub chunk_index: u32,
    pub chunk_type: ChunkType,
    pub text: String,
    pub token_count: usize,
    pub token_range: TokenRange,
    pub document_total_tokens: usize,
    pub semantic_region: SemanticRegion,
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(default)]
    pub heading_path: Vec<String>,
    #[serde(default)]
    pub layout_tags: Vec<String>,
    #[serde(default)]
    pub figures: Vec<Figure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub topic_tags: Vec<String>,
    #[serde(default = "default_trust_level")]
    pub trust_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    pub ingest_time: String,
    pub parser_version: String,
    pub used_ocr: bool,
    pub original_manifest: serde_json::Value,
    pub provenance: Provenance,
    /// Populated by the indexer downstream; always `null` as written by MAT.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// `<document_id>_c<4-digit index>` — HTML chunk ids.
    pub fn html_chunk_id(document_id: &str, chunk_index: u32) -> String {
        format!("{document_id}_c{chunk_index:04}")
    }

    /// `<document_id>_p<page>_<4-digit index>` — PDF/image chunk ids.
    pub fn paged_chunk_id(document_id: &str, page: u32, chunk_index: u32) -> String {
        format!("{document_id}_p{page}_{chunk_index:04}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_region_boundaries() {
        assert_eq!(SemanticRegion::from_html_ratio(0, 1000), SemanticRegion::Intro);
        assert_eq!(SemanticRegion::from_html_ratio(99, 1000), SemanticRegion::Intro);
        assert_eq!(SemanticRegion::from_html_ratio(100, 1000), SemanticRegion::Early);
        assert_eq!(SemanticRegion::from_html_ratio(300, 1000), SemanticRegion::Middle);
        assert_eq!(SemanticRegion::from_html_ratio(700, 1000), SemanticRegion::Late);
        assert_eq!(SemanticRegion::from_html_ratio(900, 1000), SemanticRegion::Footer);
        assert_eq!(SemanticRegion::from_html_ratio(5, 0), SemanticRegion::Unknown);
    }

    #[test]
    fn pdf_region_boundary_boosts() {
        assert_eq!(
            SemanticRegion::from_pdf_midpoint(0, 100, 1000, 1, 10),
            SemanticRegion::Intro
        );
        assert_eq!(
            SemanticRegion::from_pdf_midpoint(900, 100, 1000, 10, 10),
            SemanticRegion::Footer
        );
    }

    #[test]
    fn chunk_id_formats() {
        assert_eq!(Chunk::html_chunk_id("doc1", 1), "doc1_c0001");
        assert_eq!(Chunk::paged_chunk_id("doc1", 3, 12), "doc1_p3_0012");
    }
}

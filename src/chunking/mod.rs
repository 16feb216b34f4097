//! Chunker (CHK): per-format extraction followed by a shared windower
//! (§4.1).
//!
//! Format dispatch is the small closed interface §9 calls for: three
//! variants implement [`FormatExtractor::canonicalize`], and everything
//! downstream of it (sentence segmentation, windowing, region labeling,
//! `Chunk` assembly) is format-agnostic.

pub mod html;
pub mod image;
pub mod pdf;
pub mod sentence;
pub mod tokenizer;
pub mod windower;

use crate::error::ChunkError;
use crate::types::chunk::{ChunkType, Provenance, SemanticRegion, TokenRange};
use crate::types::{Chunk, RawManifest};

use self::tokenizer::Tokenizer;
use self::windower::window_sentences;

/// One page/frame worth of canonical text plus whatever structural
/// metadata that format's extractor could recover (§4.1 step 1).
#[derive(Debug, Clone, Default)]
pub struct PageText {
    /// 1-based page number; `None` for formats without pagination (HTML).
    pub page_number: Option<u32>,
    pub text: String,
    pub headings: Vec<String>,
    pub heading_path: Vec<String>,
    pub layout_tags: Vec<String>,
    /// OCR'd images and tab-joined table rows collected alongside the text.
    pub figures: Vec<String>,
    pub used_ocr: bool,
}

/// The result of canonicalizing one raw document, before sentence
/// segmentation and windowing.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub pages: Vec<PageText>,
    pub language: Option<String>,
}

/// Format-specific canonicalization step (§9 "Dynamic dispatch").
pub trait FormatExtractor: Send + Sync {
    fn canonicalize(&self, bytes: &[u8], manifest: &RawManifest) -> Result<Extraction, ChunkError>;
}

/// Which format produced an [`Extraction`], determining chunk id scheme and
/// `chunk_type` (§3, §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Html,
    Pdf,
    Image,
}

/// Tunable windowing parameters, sourced from [`crate::config::Config`].
pub struct ChunkingParams<'a> {
    pub min_tokens: usize,
    pub max_tokens: usize,
    pub overlap_sentences: usize,
    pub tokenizer: &'a dyn Tokenizer,
    pub parser_version: String,
    pub ingest_time: String,
}

/// Window every page of an extraction and assemble the resulting `Chunk`
/// records with full provenance (§4.1 steps 2-6).
///
/// Failure semantics (§4.1 "Failure semantics"): an unreadable document
/// (zero pages) yields zero chunks; a page whose OCR/extraction produced no
/// text still contributes one empty chunk preserving page provenance.
pub fn chunk_document(
    document_id: &str,
    extraction: &Extraction,
    kind: ChunkKind,
    manifest: &RawManifest,
    raw_sha256: &str,
    raw_key: &str,
    params: &ChunkingParams<'_>,
) -> Vec<Chunk> {
    if extraction.pages.is_empty() {
        return Vec::new();
    }

    struct PageWindows<'p> {
        page: &'p PageText,
        windows: Vec<windower::Window>,
        page_total_tokens: usize,
    }

    let per_page: Vec<PageWindows<'_>> = extraction
        .pages
        .iter()
        .map(|page| {
            let sentences = sentence::sentence_spans(&page.text);
            let (windows, page_total_tokens) = window_sentences(
                &sentences,
                params.tokenizer,
                params.min_tokens,
                params.max_tokens,
                params.overlap_sentences,
            );
            PageWindows {
                page,
                windows,
                page_total_tokens,
            }
        })
        .collect();

    let document_total_tokens: usize = per_page.iter().map(|p| p.page_total_tokens).sum();
    let last_page_number = extraction
        .pages
        .iter()
        .filter_map(|p| p.page_number)
        .max()
        .unwrap_or(1);

    let provenance = Provenance {
        raw_sha256: raw_sha256.to_string(),
        raw_key: raw_key.to_string(),
        original_url: manifest.original_url.clone(),
    };

    let original_manifest = serde_json::to_value(manifest).unwrap_or(serde_json::Value::Null);

    let mut chunks = Vec::new();
    let mut chunk_index: u32 = 0;
    let mut global_offset = 0usize;

    for pw in &per_page {
        let page_number = pw.page.page_number.unwrap_or(1);

        if pw.windows.is_empty() {
            chunk_index += 1;
            let chunk_type = match kind {
                ChunkKind::Html => ChunkType::TokenWindow,
                ChunkKind::Pdf => ChunkType::Page,
                ChunkKind::Image => ChunkType::ImagePage,
            };
            let chunk_id = match kind {
                ChunkKind::Html => Chunk::html_chunk_id(document_id, chunk_index),
                ChunkKind::Pdf | ChunkKind::Image => {
                    Chunk::paged_chunk_id(document_id, page_number, chunk_index)
                }
            };
            chunks.push(Chunk {
                document_id: document_id.to_string(),
                chunk_id,
                chunk_index,
                chunk_type,
                text: String::new(),
                token_count: 0,
                token_range: TokenRange {
                    start: global_offset,
                    end: global_offset,
                },
                document_total_tokens,
                semantic_region: SemanticRegion::Unknown,
                headings: pw.page.headings.clone(),
                heading_path: pw.page.heading_path.clone(),
                layout_tags: pw.page.layout_tags.clone(),
                figures: pw.page.figures.clone(),
                source_url: manifest.original_url.clone(),
                source_domain: None,
                s3_url: None,
                local_path: None,
                page_number: matches!(kind, ChunkKind::Pdf | ChunkKind::Image).then_some(page_number),
                language: extraction.language.clone(),
                region: None,
                topic_tags: Vec::new(),
                trust_level: manifest.trust_level.clone(),
                last_updated: manifest.last_updated.clone(),
                ingest_time: params.ingest_time.clone(),
                parser_version: params.parser_version.clone(),
                used_ocr: pw.page.used_ocr,
                original_manifest: original_manifest.clone(),
                provenance: provenance.clone(),
                embedding: None,
            });
            global_offset += pw.page_total_tokens;
            continue;
        }

        for window in &pw.windows {
            chunk_index += 1;
            let token_start = global_offset + window.token_start;

            let semantic_region = match kind {
                ChunkKind::Pdf => SemanticRegion::from_pdf_midpoint(
                    token_start,
                    window.token_count,
                    document_total_tokens,
                    page_number as usize,
                    last_page_number as usize,
                ),
                ChunkKind::Html | ChunkKind::Image => {
                    SemanticRegion::from_html_ratio(token_start, document_total_tokens)
                }
            };

            let chunk_type = match kind {
                ChunkKind::Html => ChunkType::TokenWindow,
                ChunkKind::Pdf => ChunkType::PdfPageChunk,
                ChunkKind::Image => ChunkType::ImagePageChunk,
            };
            let chunk_id = match kind {
                ChunkKind::Html => Chunk::html_chunk_id(document_id, chunk_index),
                ChunkKind::Pdf | ChunkKind::Image => {
                    Chunk::paged_chunk_id(document_id, page_number, chunk_index)
                }
            };

            chunks.push(Chunk {
                document_id: document_id.to_string(),
                chunk_id,
                chunk_index,
                chunk_type,
                text: window.text.clone(),
                token_count: window.token_count,
                token_range: TokenRange {
                    start: token_start,
                    end: token_start + window.token_count,
                },
                document_total_tokens,
                semantic_region,
                headings: pw.page.headings.clone(),
                heading_path: pw.page.heading_path.clone(),
                layout_tags: pw.page.layout_tags.clone(),
                figures: pw.page.figures.clone(),
                source_url: manifest.original_url.clone(),
                source_domain: None,
                s3_url: None,
                local_path: None,
                page_number: matches!(kind, ChunkKind::Pdf | ChunkKind::Image).then_some(page_number),
                language: extraction.language.clone(),
                region: None,
                topic_tags: Vec::new(),
                trust_level: manifest.trust_level.clone(),
                last_updated: manifest.last_updated.clone(),
                ingest_time: params.ingest_time.clone(),
                parser_version: params.parser_version.clone(),
                used_ocr: pw.page.used_ocr,
                original_manifest: original_manifest.clone(),
                provenance: provenance.clone(),
                embedding: None,
            });
        }

        global_offset += pw.page_total_tokens;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::tokenizer::WhitespaceTokenizer;
    use crate::types::raw::default_trust_level;

    fn manifest() -> RawManifest {
        RawManifest {
            file_hash: "abc".into(),
            timestamp: "2026-01-01T00:00:00.000Z".into(),
            original_url: Some("https://example.gov/scheme".into()),
            tags: vec![],
            trust_level: default_trust_level(),
            last_updated: None,
            language: Some("en".into()),
            chunked: None,
            saved_chunks: None,
            chunked_manifest_written_at: None,
        }
    }

    #[test]
    fn dense_chunk_index_and_bounded_token_range() {
        let manifest = manifest();
        let extraction = Extraction {
            pages: vec![PageText {
                page_number: None,
                text: "myScheme is a national platform. Apply online at the official portal."
                    .into(),
                ..Default::default()
            }],
            language: Some("en".into()),
        };
        let tok = WhitespaceTokenizer;
        let params = ChunkingParams {
            min_tokens: 1,
            max_tokens: 512,
            overlap_sentences: 2,
            tokenizer: &tok,
            parser_version: "test-1".into(),
            ingest_time: "2026-01-01T00:00:00.000Z".into(),
        };
        let chunks = chunk_document("doc1", &extraction, ChunkKind::Html, &manifest, "sha", "raw/doc1", &params);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_id, "doc1_c0001");
        assert_eq!(chunks[0].chunk_index, 1);
        assert!(chunks[0].token_range.start <= chunks[0].token_range.end);
        assert!(chunks[0].token_range.end <= chunks[0].document_total_tokens);
    }

    #[test]
    fn empty_extraction_yields_zero_chunks() {
        let manifest = manifest();
        let extraction = Extraction::default();
        let tok = WhitespaceTokenizer;
        let params = ChunkingParams {
            min_tokens: 100,
            max_tokens: 512,
            overlap_sentences: 2,
            tokenizer: &tok,
            parser_version: "test-1".into(),
            ingest_time: "2026-01-01T00:00:00.000Z".into(),
        };
        let chunks = chunk_document("doc1", &extraction, ChunkKind::Html, &manifest, "sha", "raw/doc1", &params);
        assert!(chunks.is_empty());
    }
}

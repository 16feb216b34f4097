//! Image canonicalization: OCR per frame/page (§4.1 step 1).
//!
//! Grounded in the original parser's Tesseract invocation
//! (`TESSERACT_CONFIG = "--oem 3 --psm 6"`); gated behind the `ocr` feature
//! so the indexer builds without a system Tesseract install when OCR isn't
//! needed. With the feature disabled, every image yields the empty-chunk
//! fallback the spec already requires for OCR producing no text.

use super::{Extraction, FormatExtractor, PageText};
use crate::error::ChunkError;
use crate::types::RawManifest;

pub struct ImageExtractor;

impl FormatExtractor for ImageExtractor {
    fn canonicalize(&self, bytes: &[u8], _manifest: &RawManifest) -> Result<Extraction, ChunkError> {
        let text = ocr_bytes(bytes)?;

        Ok(Extraction {
            pages: vec![PageText {
                page_number: Some(1),
                text: super::html::canonicalize_text(&text),
                headings: Vec::new(),
                heading_path: Vec::new(),
                layout_tags: Vec::new(),
                figures: Vec::new(),
                used_ocr: true,
            }],
            language: None,
        })
    }
}

#[cfg(feature = "ocr")]
fn ocr_bytes(bytes: &[u8]) -> Result<String, ChunkError> {
    use std::io::Write;

    let mut tmp = tempfile::NamedTempFile::new().map_err(|e| ChunkError::Image(e.to_string()))?;
    tmp.write_all(bytes).map_err(|e| ChunkError::Image(e.to_string()))?;

    let lang = std::env::var("IMAGE_TESSERACT_LANG").unwrap_or_else(|_| "eng".to_string());
    let args = rusty_tesseract::Args {
        lang,
        config_variables: std::collections::HashMap::from([
            ("tessedit_pageseg_mode".to_string(), "6".to_string()),
            ("tessedit_ocr_engine_mode".to_string(), "3".to_string()),
        ]),
        dpi: None,
        psm: Some(6),
        oem: Some(3),
    };

    let image = rusty_tesseract::Image::from_path(tmp.path())
        .map_err(|e| ChunkError::Image(e.to_string()))?;
    rusty_tesseract::image_to_string(&image, &args).map_err(|e| ChunkError::Image(e.to_string()))
}

#[cfg(not(feature = "ocr"))]
fn ocr_bytes(_bytes: &[u8]) -> Result<String, ChunkError> {
    tracing::warn!("ocr feature disabled; emitting empty chunk for image document");
    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::raw::default_trust_level;

    fn manifest() -> RawManifest {
        RawManifest {
            file_hash: "h".into(),
            timestamp: "t".into(),
            original_url: None,
            tags: vec![],
            trust_level: default_trust_level(),
            last_updated: None,
            language: None,
            chunked: None,
            saved_chunks: None,
            chunked_manifest_written_at: None,
        }
    }

    #[test]
    #[cfg(not(feature = "ocr"))]
    fn empty_ocr_still_yields_one_page_with_provenance() {
        let extraction = ImageExtractor.canonicalize(b"not a real image", &manifest()).unwrap();
        assert_eq!(extraction.pages.len(), 1);
        assert_eq!(extraction.pages[0].page_number, Some(1));
        assert!(extraction.pages[0].text.is_empty());
        assert!(extraction.pages[0].used_ocr);
    }
}

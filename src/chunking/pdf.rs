//! PDF canonicalization (§4.1 step 1).
//!
//! Text extraction itself goes through `pdf-extract`, which — unlike the
//! original Python parser's page/bbox-level reader — only exposes a flat
//! per-document text stream, with no glyph-level bounding boxes. The
//! bbox-level column-clustering and caption/table-association algorithms
//! the original performs are kept here as standalone, independently
//! testable functions operating on an explicit `TextBlock` type so a future
//! bbox-capable extraction backend can be dropped in without touching the
//! windower or materializer; see `DESIGN.md` for this tradeoff.
//!
//! `figures[]` is populated from a real (if coarser) signal in the
//! meantime: `lopdf` walks each page's `/Resources /XObject` dictionary
//! directly and reports the embedded image names, so a page with figures
//! gets non-empty `figures[]` without needing full bbox reconstruction.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object};

use super::{Extraction, FormatExtractor, PageText};
use crate::error::ChunkError;
use crate::types::RawManifest;

/// One text run with its bounding box, as the original parser's
/// block-level PDF reader would hand it over. Not currently populated from
/// `pdf-extract` (see module docs); kept for the column-clustering /
/// caption-association helpers below, which operate purely on this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub x0: f32,
    pub x1: f32,
    pub y0: f32,
    pub y1: f32,
    pub page: u32,
}

impl TextBlock {
    fn x_center(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    fn overlap_fraction(&self, other: &TextBlock) -> f32 {
        let ix0 = self.x0.max(other.x0);
        let iy0 = self.y0.max(other.y0);
        let ix1 = self.x1.min(other.x1);
        let iy1 = self.y1.min(other.y1);
        if ix1 <= ix0 || iy1 <= iy0 {
            return 0.0;
        }
        let inter = (ix1 - ix0) * (iy1 - iy0);
        let area = (self.x1 - self.x0) * (self.y1 - self.y0);
        if area <= 0.0 { 0.0 } else { inter / area }
    }
}

/// Exclude text blocks whose bbox overlaps a figure/table region by ≥25% —
/// they become captions attached to that figure instead of body text
/// (§4.1 step 1).
pub fn exclude_caption_blocks(blocks: Vec<TextBlock>, figure_bboxes: &[TextBlock]) -> (Vec<TextBlock>, Vec<TextBlock>) {
    let mut body = Vec::new();
    let mut captions = Vec::new();
    for block in blocks {
        let is_caption = figure_bboxes
            .iter()
            .any(|fig| block.overlap_fraction(fig) >= 0.25);
        if is_caption {
            captions.push(block);
        } else {
            body.push(block);
        }
    }
    (body, captions)
}

/// Group blocks into columns by x-center clustering, splitting wherever the
/// gap between consecutive (sorted) x-centers exceeds 1.5x the median gap
/// (§4.1 step 1). Blocks within a column are returned sorted by y.
pub fn cluster_columns(mut blocks: Vec<TextBlock>) -> Vec<Vec<TextBlock>> {
    if blocks.is_empty() {
        return Vec::new();
    }
    blocks.sort_by(|a, b| a.x_center().partial_cmp(&b.x_center()).unwrap());

    let centers: Vec<f32> = blocks.iter().map(TextBlock::x_center).collect();
    let mut gaps: Vec<f32> = centers.windows(2).map(|w| w[1] - w[0]).collect();
    gaps.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median_gap = if gaps.is_empty() {
        0.0
    } else {
        gaps[gaps.len() / 2]
    };
    let split_threshold = median_gap * 1.5;

    let mut columns: Vec<Vec<TextBlock>> = Vec::new();
    let mut current: Vec<TextBlock> = vec![blocks.remove(0)];
    for block in blocks {
        let prev_center = current.last().unwrap().x_center();
        if median_gap > 0.0 && block.x_center() - prev_center > split_threshold {
            columns.push(std::mem::take(&mut current));
        }
        current.push(block);
    }
    if !current.is_empty() {
        columns.push(current);
    }

    for column in &mut columns {
        column.sort_by(|a, b| a.y0.partial_cmp(&b.y0).unwrap());
    }
    columns
}

/// Strip control characters, collapse single newlines (paragraph joins),
/// keep double newlines as paragraph breaks, collapse runs of spaces
/// (§4.1 step 1 "Reflow").
pub fn reflow_and_clean_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .collect();

    let paragraphs: Vec<&str> = cleaned.split("\n\n").collect();
    paragraphs
        .into_iter()
        .map(|p| {
            p.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Embedded image XObject names per 1-based page number, read directly
/// from the page object graph via `lopdf`. Any traversal failure (a
/// malformed or unusual object graph `lopdf` can't walk) degrades to no
/// figures for that page rather than failing extraction — this is an
/// enrichment on top of `pdf-extract`'s text, not a required field.
fn page_image_figures(bytes: &[u8]) -> BTreeMap<u32, Vec<String>> {
    let mut figures = BTreeMap::new();
    let Ok(doc) = Document::load_mem(bytes) else {
        return figures;
    };
    for (index, (_, page_id)) in doc.get_pages().into_iter().enumerate() {
        let names = image_xobject_names(&doc, page_id);
        if !names.is_empty() {
            figures.insert((index + 1) as u32, names);
        }
    }
    figures
}

fn image_xobject_names(doc: &Document, page_id: (u32, u16)) -> Vec<String> {
    let Ok(page_dict) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let Some(resources) = resolve_dict(doc, page_dict.get(b"Resources").ok()) else {
        return Vec::new();
    };
    let Some(xobjects) = resolve_dict(doc, resources.get(b"XObject").ok()) else {
        return Vec::new();
    };

    xobjects
        .iter()
        .filter_map(|(name, obj)| {
            let stream_dict = resolve_stream_dict(doc, obj)?;
            let subtype = stream_dict.get(b"Subtype").ok()?.as_name().ok()?;
            (subtype == b"Image").then(|| String::from_utf8_lossy(name).into_owned())
        })
        .collect()
}

fn resolve_dict<'a>(doc: &'a Document, obj: Option<&'a Object>) -> Option<&'a Dictionary> {
    match obj? {
        Object::Dictionary(d) => Some(d),
        Object::Reference(id) => doc.get_object(*id).ok().and_then(|o| o.as_dict().ok()),
        _ => None,
    }
}

fn resolve_stream_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Stream(s)) => Some(&s.dict),
            _ => None,
        },
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

pub struct PdfExtractor;

impl FormatExtractor for PdfExtractor {
    fn canonicalize(&self, bytes: &[u8], _manifest: &RawManifest) -> Result<Extraction, ChunkError> {
        let raw_text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ChunkError::Pdf(e.to_string()))?;

        // pdf-extract does not expose page boundaries; fall back to
        // splitting on form-feed characters some PDF producers embed, and
        // otherwise treat the whole document as a single page.
        let raw_pages: Vec<&str> = if raw_text.contains('\u{c}') {
            raw_text.split('\u{c}').collect()
        } else {
            vec![raw_text.as_str()]
        };

        let figures_by_page = page_image_figures(bytes);

        let pages = raw_pages
            .into_iter()
            .enumerate()
            .map(|(i, page_text)| {
                let page_number = (i + 1) as u32;
                PageText {
                    page_number: Some(page_number),
                    text: super::html::canonicalize_text(&reflow_and_clean_text(page_text)),
                    headings: Vec::new(),
                    heading_path: Vec::new(),
                    layout_tags: Vec::new(),
                    figures: figures_by_page.get(&page_number).cloned().unwrap_or_default(),
                    used_ocr: false,
                }
            })
            .collect();

        Ok(Extraction { pages, language: None })
    }
}

//! HTML canonicalization: boilerplate-aware primary extraction, falling
//! back to plain paragraph/list scraping, falling back to a raw decode
//! (§4.1 step 1, grounded in the original parser's
//! trafilatura → BeautifulSoup → raw-decode fallback chain).

use scraper::{Html, Selector};
use unicode_segmentation::UnicodeSegmentation;

use super::{Extraction, FormatExtractor, PageText};
use crate::error::ChunkError;
use crate::types::RawManifest;

/// Tags whose text never belongs in the canonical body — boilerplate that
/// a readability-style scorer should ignore outright.
const BOILERPLATE_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "noscript", "aside"];

const CONTENT_CANDIDATE_SELECTORS: &[&str] = &["article", "main", "[role=main]", "div"];

pub struct HtmlExtractor;

impl FormatExtractor for HtmlExtractor {
    fn canonicalize(&self, bytes: &[u8], _manifest: &RawManifest) -> Result<Extraction, ChunkError> {
        let raw = String::from_utf8_lossy(bytes);
        let document = Html::parse_document(&raw);

        let language = detect_lang_attr(&document);
        let headings = collect_headings(&document);

        let text = primary_extract(&document)
            .or_else(|| fallback_paragraph_extract(&document))
            .unwrap_or_else(|| raw.to_string());

        let text = canonicalize_text(&text);

        Ok(Extraction {
            pages: vec![PageText {
                page_number: None,
                text,
                headings: headings.clone(),
                heading_path: headings,
                layout_tags: Vec::new(),
                figures: Vec::new(),
                used_ocr: false,
            }],
            language,
        })
    }
}

fn detect_lang_attr(document: &Html) -> Option<String> {
    let selector = Selector::parse("html").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(|s| s.to_string())
}

fn collect_headings(document: &Html) -> Vec<String> {
    let selector = match Selector::parse("h1, h2, h3") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Boilerplate-aware primary extraction: score each candidate content
/// container by text-density (non-boilerplate text length vs. number of
/// child tags) and keep the highest scorer, mirroring a trafilatura-style
/// heuristic without depending on a native trafilatura binding.
fn primary_extract(document: &Html) -> Option<String> {
    let mut best: Option<(usize, String)> = None;

    for sel in CONTENT_CANDIDATE_SELECTORS {
        let selector = Selector::parse(sel).ok()?;
        for el in document.select(&selector) {
            if is_boilerplate_only(&el) {
                continue;
            }
            let text = el.text().collect::<Vec<_>>().join(" ");
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            let score = trimmed.unicode_words().count();
            if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                best = Some((score, trimmed.to_string()));
            }
        }
    }

    best.map(|(_, text)| text).filter(|t| !t.is_empty())
}

fn is_boilerplate_only(el: &scraper::ElementRef<'_>) -> bool {
    let tag = el.value().name();
    BOILERPLATE_TAGS.contains(&tag)
}

/// DOM paragraph/list fallback when no scoring candidate had usable text.
fn fallback_paragraph_extract(document: &Html) -> Option<String> {
    let selector = Selector::parse("p, li").ok()?;
    let parts: Vec<String> = document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// NFKC normalize, normalize line endings, collapse whitespace (§4.1 step 1).
pub fn canonicalize_text(text: &str) -> String {
    use unicode_normalization::UnicodeNormalization;

    let normalized: String = text.nfkc().collect();
    let normalized = normalized.replace("\r\n", "\n").replace('\r', "\n");

    let lines: Vec<String> = normalized
        .lines()
        .map(|line| {
            line.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|l| !l.is_empty())
        .collect();

    lines.join("\n")
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
    fn extracts_article_body_over_nav_boilerplate() {
        let html = r#"
            <html lang="en">
              <body>
                <nav>Home About Contact</nav>
                <article>
                  <h1>myScheme</h1>
                  <p>myScheme is a National Platform for welfare schemes.</p>
                  <p>Apply online at the official portal.</p>
                </article>
                <footer>Copyright 2026</footer>
              </body>
            </html>
        "#;
        let extraction = HtmlExtractor.canonicalize(html.as_bytes(), &manifest()).unwrap();
        assert_eq!(extraction.pages.len(), 1);
        assert_eq!(extraction.language.as_deref(), Some("en"));
        assert!(extraction.pages[0].text.contains("myScheme"));
        assert!(!extraction.pages[0].text.contains("Copyright"));
    }

    #[test]
    fn falls_back_to_paragraphs_without_article_container() {
        let html = "<html><body><p>Alpha beta.</p><p>Gamma delta.</p></body></html>";
        let extraction = HtmlExtractor.canonicalize(html.as_bytes(), &manifest()).unwrap();
        assert!(extraction.pages[0].text.contains("Alpha beta"));
    }

    #[test]
    fn canonicalize_collapses_whitespace() {
        let out = canonicalize_text("Hello   world\r\n\r\nSecond   line");
        assert_eq!(out, "Hello world\nSecond line");
    }
}

// src/pdf_extract.rs

use lopdf::{Document, ObjectId};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Turns PDF bytes into one plain-text string per page.
///
/// A page without a text layer comes back as an empty string.
pub trait PageTextExtractor {
    fn page_texts(&self, pdf_bytes: &[u8]) -> Result<Vec<String>>;
}

/// `lopdf` page-by-page extraction, with `pdf-extract` as a whole-document
/// fallback when lopdf finds no text on any page.
///
/// A document whose every page is image-only yields no pages at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfPages;

impl PageTextExtractor for PdfPages {
    fn page_texts(&self, pdf_bytes: &[u8]) -> Result<Vec<String>> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| Error::Pdf(format!("Failed to parse PDF: {e}")))?;

        let pages = doc.get_pages();
        let image_only: Vec<bool> = pages.values().map(|id| is_image_only(&doc, *id)).collect();
        let scanned = image_only.iter().filter(|flag| **flag).count();
        if !pages.is_empty() && scanned == pages.len() {
            info!(pages = pages.len(), "Every page is an image, no text layer");
            return Ok(Vec::new());
        }

        let mut texts = Vec::with_capacity(pages.len());
        for (page_num, skip) in pages.keys().zip(&image_only) {
            if *skip {
                debug!(page = page_num, "Image-only page skipped");
                texts.push(String::new());
                continue;
            }
            match doc.extract_text(&[*page_num]) {
                Ok(text) => texts.push(text),
                Err(e) => {
                    warn!(page = page_num, error = %e, "No text extracted from page");
                    texts.push(String::new());
                }
            }
        }

        with_document_fallback(texts, || {
            pdf_extract::extract_text_from_mem(pdf_bytes)
                .map_err(|e| Error::Pdf(format!("Failed to extract text: {e}")))
        })
    }
}

/// Keep the per-page texts when any page has text. Otherwise use the
/// whole-document text as a single page.
fn with_document_fallback<F>(texts: Vec<String>, whole_document: F) -> Result<Vec<String>>
where
    F: FnOnce() -> Result<String>,
{
    if texts.iter().any(|t| !t.trim().is_empty()) {
        info!(pages = texts.len(), "Text extracted per page");
        return Ok(texts);
    }
    let text = whole_document()?;
    if text.trim().is_empty() {
        return Ok(texts);
    }
    info!(chars = text.len(), "Pages empty, using whole-document text");
    Ok(vec![text])
}

/// A page that draws XObjects but declares no fonts cannot carry a text layer.
fn is_image_only(doc: &Document, page_id: ObjectId) -> bool {
    let resources = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Resources").ok())
        .and_then(|r| doc.dereference(r).ok())
        .and_then(|(_, r)| r.as_dict().ok());
    let Some(resources) = resources else {
        return false;
    };

    let entries = |key: &[u8]| {
        resources
            .get(key)
            .ok()
            .and_then(|v| doc.dereference(v).ok())
            .and_then(|(_, v)| v.as_dict().ok())
            .map_or(0, |d| d.len())
    };
    entries(b"Font") == 0 && entries(b"XObject") > 0
}

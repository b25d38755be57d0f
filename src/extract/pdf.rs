//! PDF text extraction using pdf-extract

use crate::extract::{ContentExtractor, Extraction, ExtractionMethod};
use crate::fetch::Body;
use anyhow::{Context, Result};

/// PDF content extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    /// Extracts text from PDF bytes
    ///
    /// The title is the last URL path segment without its `.pdf` suffix.
    pub fn extract_pdf(&self, bytes: &[u8], url: &str) -> Result<Extraction> {
        let raw = pdf_extract::extract_text_from_mem(bytes).context("Failed to extract text from PDF")?;

        let text = Self::clean_text(&raw);
        if text.is_empty() {
            anyhow::bail!("PDF contains no extractable text (may be image-only)");
        }

        Ok(Extraction::new(text, title_from_url(url), None, ExtractionMethod::Pdf))
    }

    /// Trims lines and collapses runs of blank lines into one
    fn clean_text(text: &str) -> String {
        text.lines()
            .map(|l| l.trim())
            .fold(Vec::new(), |mut acc: Vec<String>, line| {
                if line.is_empty() {
                    if acc.last().map(|l| !l.is_empty()).unwrap_or(false) {
                        acc.push(String::new());
                    }
                } else {
                    acc.push(line.to_string());
                }
                acc
            })
            .join("\n")
            .trim()
            .to_string()
    }
}

impl ContentExtractor for PdfExtractor {
    fn extract(&self, body: &Body, url: &str) -> Extraction {
        let Body::Bytes(bytes) = body else {
            tracing::debug!("PDF extractor given text body for {}", url);
            return Extraction::failed();
        };

        match self.extract_pdf(bytes, url) {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::warn!("PDF extraction failed for {}: {:#}", url, e);
                Extraction::failed()
            }
        }
    }
}

fn title_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let stem = segment
        .strip_suffix(".pdf")
        .or_else(|| segment.strip_suffix(".PDF"))
        .unwrap_or(segment);
    (!stem.is_empty()).then(|| stem.to_string())
}

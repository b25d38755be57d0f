//! Content extraction
//!
//! Turns fetched bodies into article text. HTML goes through [`HtmlExtractor`],
//! PDF bytes through [`PdfExtractor`]. Both are CPU-bound and run on the
//! blocking thread pool via [`ExtractorPool`].

mod date_filter;
mod html;
mod links;
mod pdf;

pub use date_filter::{parse_extracted_date, DateFilter, DateFilterStats};
pub use html::{clean_text, HtmlExtractor};
pub use links::{
    filter_links_same_domain, has_asset_extension, matches_skip_pattern, HtmlLinkExtractor,
    LinkExtractor, ASSET_EXTENSIONS,
};
pub use pdf::PdfExtractor;

use crate::config::ExtractConfig;
use crate::fetch::Body;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Which extraction path produced the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionMethod {
    /// Article or main-content paragraphs
    Html,
    /// Every paragraph-like block on the page
    HtmlFallback,
    Pdf,
    Failed,
}

impl ExtractionMethod {
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionMethod::Html => "html",
            ExtractionMethod::HtmlFallback => "html_fallback",
            ExtractionMethod::Pdf => "pdf",
            ExtractionMethod::Failed => "failed",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of extracting one page
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub text: String,
    pub title: Option<String>,
    /// Publication date as found on the page (not normalized)
    pub date: Option<String>,
    pub word_count: usize,
    pub method: ExtractionMethod,
}

impl Extraction {
    /// A failed extraction with no text
    pub fn failed() -> Self {
        Self {
            text: String::new(),
            title: None,
            date: None,
            word_count: 0,
            method: ExtractionMethod::Failed,
        }
    }

    /// Builds a successful extraction, counting words in `text`
    pub fn new(text: String, title: Option<String>, date: Option<String>, method: ExtractionMethod) -> Self {
        let word_count = text.split_whitespace().count();
        Self {
            text,
            title,
            date,
            word_count,
            method,
        }
    }

    /// Returns true if the page should be counted as a failed extraction
    pub fn is_failure(&self, min_word_count: usize) -> bool {
        self.method == ExtractionMethod::Failed || self.word_count == 0 || self.word_count < min_word_count
    }
}

/// Extracts article text from a fetched body
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, body: &Body, url: &str) -> Extraction;
}

/// Runs extractors on the blocking pool with bounded parallelism
#[derive(Clone)]
pub struct ExtractorPool {
    html: Arc<dyn ContentExtractor>,
    pdf: Arc<dyn ContentExtractor>,
    permits: Arc<Semaphore>,
}

impl fmt::Debug for ExtractorPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorPool")
            .field("available", &self.permits.available_permits())
            .finish()
    }
}

impl ExtractorPool {
    /// Creates a pool using the built-in HTML and PDF extractors
    pub fn from_config(config: &ExtractConfig) -> Self {
        let html = HtmlExtractor::new().with_min_word_count(config.min_word_count);
        Self::with_extractors(Arc::new(html), Arc::new(PdfExtractor), config.workers)
    }

    pub fn with_extractors(
        html: Arc<dyn ContentExtractor>,
        pdf: Arc<dyn ContentExtractor>,
        workers: usize,
    ) -> Self {
        Self {
            html,
            pdf,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Extracts a body, routing bytes to the PDF extractor and text to HTML
    ///
    /// A panicking extractor yields a failed extraction.
    pub async fn extract(&self, body: Body, url: &str) -> Extraction {
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                tracing::warn!("Extractor pool closed: {}", e);
                None
            }
        };

        let extractor = match body {
            Body::Bytes(_) => self.pdf.clone(),
            Body::Text(_) => self.html.clone(),
        };
        let owned_url = url.to_string();

        match tokio::task::spawn_blocking(move || extractor.extract(&body, &owned_url)).await {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::warn!("Extractor crashed on {}: {}", url, e);
                Extraction::failed()
            }
        }
    }
}

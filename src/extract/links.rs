//! Link discovery for crawling
//!
//! This module handles:
//! - Extracting absolute links from `<a href>` tags
//! - Dropping asset links (images, stylesheets, media, archives, installers)
//! - Restricting the next frontier level to the source site

use crate::url::{netloc, same_site, ExclusionList};
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use url::Url;

/// Path suffixes of resources that never hold article text
pub const ASSET_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".ico", ".webp", ".bmp", ".css", ".js", ".woff",
    ".woff2", ".ttf", ".eot", ".mp3", ".mp4", ".avi", ".mov", ".wmv", ".flv", ".zip", ".gz",
    ".tar", ".rar", ".7z", ".exe", ".dmg", ".msi",
];

/// Extracts candidate links from a page
pub trait LinkExtractor: Send + Sync {
    /// Returns unique absolute HTTP(S) links in document order
    fn extract_links(&self, html: &str, base_url: &str) -> Vec<String>;
}

/// `<a href>` link extractor with optional path skip patterns
#[derive(Debug, Clone, Default)]
pub struct HtmlLinkExtractor {
    skip_patterns: Vec<String>,
}

impl HtmlLinkExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also drops links whose path contains any of `patterns`
    pub fn with_skip_patterns(patterns: &[String]) -> Self {
        Self {
            skip_patterns: patterns.iter().map(|p| p.to_lowercase()).collect(),
        }
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract_links(&self, html: &str, base_url: &str) -> Vec<String> {
        let Ok(base) = Url::parse(base_url) else {
            return Vec::new();
        };
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(url) = resolve_link(href, &base) else {
                continue;
            };
            if has_asset_extension(&url) || matches_skip_pattern(&url, &self.skip_patterns) {
                continue;
            }

            let link = url.to_string();
            if seen.insert(link.clone()) {
                links.push(link);
            }
        }

        links
    }
}

/// Resolves a link href to an absolute, fragment-free URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel:, data: schemes
/// - Fragment-only links (same page anchors)
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }
    absolute.set_fragment(None);
    Some(absolute)
}

/// Returns true if the URL path ends with a known asset extension
pub fn has_asset_extension(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Returns true if the URL path contains any (lowercased) skip pattern
pub fn matches_skip_pattern(url: &Url, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let path = url.path().to_lowercase();
    patterns.iter().any(|pattern| path.contains(pattern.as_str()))
}

/// Filters discovered links down to the next frontier candidates
///
/// # Filter Order
///
/// 1. Same base domain as the source page
/// 2. Not excluded
/// 3. Not already fetched or queued for the current unit
/// 4. The link's domain is under the page cap
/// 5. No asset extension
///
/// # Arguments
///
/// * `links` - Candidate absolute URLs
/// * `source_domain` - Netloc of the page the links came from
/// * `exclusions` - Excluded domains
/// * `seen_urls` - URLs already fetched or queued for the current unit
/// * `domain_page_counts` - Pages fetched per netloc in this run
/// * `max_pages_per_domain` - The per-domain page cap
pub fn filter_links_same_domain(
    links: &[String],
    source_domain: &str,
    exclusions: &ExclusionList,
    seen_urls: &HashSet<String>,
    domain_page_counts: &HashMap<String, usize>,
    max_pages_per_domain: usize,
) -> Vec<String> {
    links
        .iter()
        .filter(|link| {
            let Ok(url) = Url::parse(link) else {
                return false;
            };
            let Some(host) = netloc(&url) else {
                return false;
            };

            same_site(&host, source_domain)
                && !exclusions.is_excluded(&host)
                && !seen_urls.contains(link.as_str())
                && domain_page_counts.get(&host).copied().unwrap_or(0) < max_pages_per_domain
                && !has_asset_extension(&url)
        })
        .cloned()
        .collect()
}

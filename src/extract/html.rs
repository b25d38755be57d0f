//! HTML article extraction

use crate::extract::{ContentExtractor, Extraction, ExtractionMethod};
use crate::fetch::Body;
use scraper::{ElementRef, Html, Selector};

/// Paragraphs inside the article body
const PRIMARY_SELECTOR: &str = "article p, main p, [itemprop='articleBody'] p";

/// Every paragraph-like block on the page
const FALLBACK_SELECTOR: &str = "p, h2, h3, blockquote, pre";

/// Page furniture whose text is never article content
const CHROME_ELEMENTS: &[&str] = &["nav", "header", "footer", "aside", "form", "script", "style", "noscript"];

const DATE_META_SELECTORS: &[&str] = &[
    "meta[property='article:published_time']",
    "meta[name='article:published_time']",
    "meta[itemprop='datePublished']",
    "meta[name='date']",
    "meta[name='pubdate']",
    "meta[name='publish-date']",
];

/// Lines shorter than this may be dropped as boilerplate
const BOILERPLATE_MAX_WORDS: usize = 40;

/// Extracts title, publication date, and body text from HTML
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    min_word_count: usize,
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlExtractor {
    pub fn new() -> Self {
        Self { min_word_count: 100 }
    }

    /// Sets the word count below which the whole-page fallback is tried
    pub fn with_min_word_count(mut self, min_word_count: usize) -> Self {
        self.min_word_count = min_word_count;
        self
    }

    /// Extracts an HTML document
    ///
    /// # Extraction Order
    ///
    /// 1. Paragraphs inside `<article>`, `<main>`, or an `articleBody`
    /// 2. If that is empty or shorter than the minimum word count, every
    ///    paragraph outside navigation chrome; used only if it is longer
    pub fn extract_html(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);
        let title = extract_title(&document);
        let date = extract_date(&document);

        let primary = clean_text(&collect_blocks(&document, PRIMARY_SELECTOR));
        let primary_words = primary.split_whitespace().count();

        let (text, method) = if primary_words >= self.min_word_count.max(1) {
            (primary, ExtractionMethod::Html)
        } else {
            let fallback = clean_text(&collect_blocks(&document, FALLBACK_SELECTOR));
            if fallback.split_whitespace().count() > primary_words {
                (fallback, ExtractionMethod::HtmlFallback)
            } else {
                (primary, ExtractionMethod::Html)
            }
        };

        if text.is_empty() {
            return Extraction {
                title,
                date,
                ..Extraction::failed()
            };
        }
        Extraction::new(text, title, date, method)
    }
}

impl ContentExtractor for HtmlExtractor {
    fn extract(&self, body: &Body, url: &str) -> Extraction {
        match body {
            Body::Text(html) => self.extract_html(html),
            Body::Bytes(_) => {
                tracing::debug!("HTML extractor given binary body for {}", url);
                Extraction::failed()
            }
        }
    }
}

fn collect_blocks(document: &Html, selector: &str) -> String {
    let Ok(selector) = Selector::parse(selector) else {
        return String::new();
    };

    document
        .select(&selector)
        .filter(|element| !inside_chrome(element))
        .map(|element| collapse_whitespace(&element.text().collect::<Vec<_>>().join(" ")))
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn inside_chrome(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| CHROME_ELEMENTS.contains(&ancestor.value().name()))
}

fn extract_title(document: &Html) -> Option<String> {
    meta_content(document, "meta[property='og:title']")
        .or_else(|| first_text(document, "title"))
        .or_else(|| first_text(document, "h1"))
}

fn extract_date(document: &Html) -> Option<String> {
    DATE_META_SELECTORS
        .iter()
        .find_map(|selector| meta_content(document, selector))
        .or_else(|| json_ld_date(document))
        .or_else(|| {
            let selector = Selector::parse("time[datetime]").ok()?;
            document
                .select(&selector)
                .find_map(|el| el.value().attr("datetime"))
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
        })
}

/// `datePublished` from JSON-LD blocks, including `@graph` arrays
fn json_ld_date(document: &Html) -> Option<String> {
    let selector = Selector::parse("script[type='application/ld+json']").ok()?;
    document.select(&selector).find_map(|script| {
        let raw = script.text().collect::<String>();
        let value: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
        find_date_published(&value)
    })
}

fn find_date_published(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Object(map) => map
            .get("datePublished")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| map.get("@graph").and_then(find_date_published)),
        serde_json::Value::Array(items) => items.iter().find_map(find_date_published),
        _ => None,
    }
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .find_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes extracted text and drops boilerplate lines
///
/// Cookie banners, newsletter prompts, copyright lines, legal links, share
/// prompts, and bare URLs are removed. Long lines are always kept.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty() && !is_boilerplate(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_boilerplate(line: &str) -> bool {
    if line.split_whitespace().count() > BOILERPLATE_MAX_WORDS {
        return false;
    }
    let lower = line.to_lowercase();

    if (lower.starts_with("http://") || lower.starts_with("https://")) && !lower.contains(' ') {
        return true;
    }
    if lower.starts_with('©') || lower.starts_with("(c) ") || lower.starts_with("copyright ") {
        return true;
    }
    if lower == "advertisement" || lower == "sponsored content" {
        return true;
    }
    if lower.contains("newsletter") && (lower.contains("subscribe") || lower.contains("sign up")) {
        return true;
    }
    if lower.starts_with("follow us") || lower.starts_with("share this") || lower.starts_with("share on") {
        return true;
    }

    [
        "cookie policy",
        "cookie consent",
        "cookie settings",
        "cookie preferences",
        "all rights reserved",
        "privacy policy",
        "terms of use",
        "terms of service",
        "terms and conditions",
    ]
    .iter()
    .any(|phrase| lower.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(words: usize) -> String {
        (0..words).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_article_paragraphs() {
        let html = format!(
            r#"<html><head><title>Page Title</title></head><body>
            <nav><p>Home News Markets</p></nav>
            <article><h1>Headline</h1><p>{}</p><p>{}</p></article>
            <footer><p>All rights reserved</p></footer></body></html>"#,
            paragraph(60),
            paragraph(60)
        );
        let extraction = HtmlExtractor::new().extract_html(&html);
        assert_eq!(extraction.method, ExtractionMethod::Html);
        assert_eq!(extraction.word_count, 120);
        assert_eq!(extraction.title.as_deref(), Some("Page Title"));
        assert!(!extraction.text.contains("Markets"));
    }

    #[test]
    fn test_fallback_when_no_article() {
        let html = format!("<html><body><div><p>{}</p></div></body></html>", paragraph(30));
        let extraction = HtmlExtractor::new().extract_html(&html);
        assert_eq!(extraction.method, ExtractionMethod::HtmlFallback);
        assert_eq!(extraction.word_count, 30);
    }

    #[test]
    fn test_short_article_prefers_longer_fallback() {
        let html = format!(
            "<html><body><article><p>{}</p></article><div><p>{}</p></div></body></html>",
            paragraph(5),
            paragraph(50)
        );
        let extraction = HtmlExtractor::new().with_min_word_count(20).extract_html(&html);
        assert_eq!(extraction.method, ExtractionMethod::HtmlFallback);
        assert_eq!(extraction.word_count, 55);
    }

    #[test]
    fn test_empty_page_fails() {
        let extraction = HtmlExtractor::new().extract_html("<html><head><title>Empty</title></head></html>");
        assert_eq!(extraction.method, ExtractionMethod::Failed);
        assert_eq!(extraction.title.as_deref(), Some("Empty"));
    }

    #[test]
    fn test_og_title_and_meta_date() {
        let html = r#"<html><head><title>Site | Story</title>
            <meta property="og:title" content="Story">
            <meta property="article:published_time" content="2024-03-15T09:30:00Z">
            </head><body><p>text</p></body></html>"#;
        let extraction = HtmlExtractor::new().extract_html(html);
        assert_eq!(extraction.title.as_deref(), Some("Story"));
        assert_eq!(extraction.date.as_deref(), Some("2024-03-15T09:30:00Z"));
    }

    #[test]
    fn test_json_ld_date() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@context":"https://schema.org","@graph":[{"@type":"WebPage"},{"@type":"NewsArticle","datePublished":"2023-11-02"}]}
            </script></head><body><p>text</p></body></html>"#;
        let extraction = HtmlExtractor::new().extract_html(html);
        assert_eq!(extraction.date.as_deref(), Some("2023-11-02"));
    }

    #[test]
    fn test_time_element_date() {
        let html = r#"<html><body><time datetime="2022-07-01">July 1</time><p>text</p></body></html>"#;
        let extraction = HtmlExtractor::new().extract_html(html);
        assert_eq!(extraction.date.as_deref(), Some("2022-07-01"));
    }

    #[test]
    fn test_clean_text_drops_boilerplate() {
        let text = "Real   content line.\nSubscribe to our newsletter today\n© 2024 Example Corp\nhttps://example.com/x\nAdvertisement\nAnother   real line.";
        assert_eq!(clean_text(text), "Real content line.\nAnother real line.");
    }

    #[test]
    fn test_clean_text_keeps_long_lines() {
        let long = format!("{} privacy policy", paragraph(50));
        assert_eq!(clean_text(&long), long);
    }

    #[test]
    fn test_binary_body_fails() {
        let extraction = HtmlExtractor::new().extract(&Body::Bytes(vec![1, 2]), "https://x.com/");
        assert_eq!(extraction.method, ExtractionMethod::Failed);
    }
}

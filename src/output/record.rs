//! Output row and provenance tag

use crate::extract::parse_extracted_date;
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters of full text kept in the snippet
const SNIPPET_CHARS: usize = 300;

/// Longest query slug kept in a source tag
const MAX_SLUG_CHARS: usize = 40;

/// One accepted page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Work unit the page was found for (query text or seed URL)
    pub company: String,
    pub title: String,
    pub link: String,
    pub snippet: String,
    /// Publication date as extracted, if any
    pub date: Option<String>,
    /// Domain the page was served from
    pub source: String,
    pub full_text: String,
    pub source_file: String,
}

impl Record {
    /// First 300 characters of `text`, with `...` appended when cut
    pub fn snippet_from(text: &str) -> String {
        match text.char_indices().nth(SNIPPET_CHARS) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.to_string(),
        }
    }
}

/// How the records of a run were discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Crawl,
    News,
    Text,
}

impl SourceMode {
    pub fn label(&self) -> &'static str {
        match self {
            SourceMode::Crawl => "crawl",
            SourceMode::News => "ddgnews",
            SourceMode::Text => "ddgtext",
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Builds the `source_file` tag, e.g. `acme_corp_earnings_ddgtext_2024Q1`
///
/// The quarter comes from the page date when it parses, else from today.
///
/// # Arguments
///
/// * `query` - Work unit text the record belongs to
/// * `date` - Extracted publication date
/// * `mode` - Discovery mode of the run
pub fn make_source_file_tag(query: &str, date: Option<&str>, mode: SourceMode) -> String {
    let day = date
        .and_then(parse_extracted_date)
        .unwrap_or_else(|| Utc::now().date_naive());
    format!("{}_{}_{}", query_slug(query), mode, quarter_tag(day))
}

/// Lowercases `query`, maps separators to `_`, and collapses the runs
pub fn query_slug(query: &str) -> String {
    let lowered = query.trim().to_lowercase();
    let joined = lowered
        .split(|c: char| " /-,.;:()[]{}_".contains(c))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    let truncated: String = joined.chars().take(MAX_SLUG_CHARS).collect();
    truncated.trim_end_matches('_').to_string()
}

/// `YYYYQn` for the quarter containing `day`
pub fn quarter_tag(day: NaiveDate) -> String {
    format!("{}Q{}", day.year(), (day.month() - 1) / 3 + 1)
}

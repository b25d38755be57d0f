//! Markdown record writer
//!
//! Each batch is appended to one combined report, grouped by work unit, and
//! every record is also written as a standalone article under a `markdown/`
//! directory next to the report.

use crate::output::{OutputResult, Record, RecordWriter};
use chrono::Local;
use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const MAX_FILE_SLUG_CHARS: usize = 40;

/// Writes a combined Markdown report plus one file per article
#[derive(Debug)]
pub struct MarkdownRecordWriter {
    path: PathBuf,
    articles_dir: PathBuf,
    counters: HashMap<String, usize>,
}

impl MarkdownRecordWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let articles_dir = path
            .parent()
            .map(|parent| parent.join("markdown"))
            .unwrap_or_else(|| PathBuf::from("markdown"));
        Self {
            path,
            articles_dir,
            counters: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn articles_dir(&self) -> &Path {
        &self.articles_dir
    }

    /// Picks the next unused `{slug}_{nnn}.md` name for a unit
    ///
    /// Existing files from earlier runs are skipped, not overwritten.
    fn next_article_path(&mut self, unit: &str) -> PathBuf {
        let slug = file_slug(unit);
        let counter = self.counters.entry(slug.clone()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = self.articles_dir.join(format!("{}_{:03}.md", slug, counter));
            if !candidate.exists() {
                return candidate;
            }
        }
    }
}

impl RecordWriter for MarkdownRecordWriter {
    fn append(&mut self, records: &[Record]) -> OutputResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut report = String::new();
        if !self.path.exists() {
            report.push_str(&format_report_header(records));
        }
        report.push_str(&format_report_sections(records));

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(report.as_bytes())?;

        std::fs::create_dir_all(&self.articles_dir)?;
        for record in records {
            let article_path = self.next_article_path(&record.company);
            std::fs::write(&article_path, format_record_md(record, true))?;
        }

        tracing::info!(
            "Wrote {} articles to {} and {}",
            records.len(),
            self.path.display(),
            self.articles_dir.display()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "markdown"
    }
}

/// Formats one record as a standalone article
///
/// # Arguments
///
/// * `record` - The record to render
/// * `include_query` - Whether to add the work unit to the metadata table
///
/// # Returns
///
/// A `# title` heading, a metadata table, and the full text
pub fn format_record_md(record: &Record, include_query: bool) -> String {
    let mut md = format!("# {}\n\n", title_or_untitled(record));
    md.push_str(&metadata_table(record, include_query));
    md.push('\n');
    if !record.full_text.is_empty() {
        md.push_str(&record.full_text);
        md.push('\n');
    }
    md
}

fn format_report_header(records: &[Record]) -> String {
    let sources: HashSet<&str> = records
        .iter()
        .map(|r| r.source.as_str())
        .filter(|s| !s.is_empty())
        .collect();

    format!(
        "# Quarry Report\n\n> {} articles · {} sources · {}\n\n",
        records.len(),
        sources.len(),
        Local::now().format("%Y-%m-%d")
    )
}

/// Renders records grouped by work unit, in first-seen order
fn format_report_sections(records: &[Record]) -> String {
    let mut groups: Vec<(&str, Vec<&Record>)> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|(unit, _)| *unit == record.company) {
            Some((_, group)) => group.push(record),
            None => groups.push((record.company.as_str(), vec![record])),
        }
    }

    let mut md = String::new();
    for (unit, group) in groups {
        md.push_str("---\n\n");
        if !unit.is_empty() {
            md.push_str(&format!("## {}\n\n", unit));
        }
        for record in group {
            md.push_str(&format!("### {}\n\n", title_or_untitled(record)));
            md.push_str(&metadata_table(record, false));
            md.push('\n');
            if !record.full_text.is_empty() {
                md.push_str(&record.full_text);
                md.push('\n');
            }
            md.push('\n');
        }
    }
    md
}

fn metadata_table(record: &Record, include_query: bool) -> String {
    let mut md = String::from("| | |\n|---|---|\n");
    if !record.source.is_empty() {
        md.push_str(&format!("| **Source** | {} |\n", record.source));
    }
    if !record.link.is_empty() {
        md.push_str(&format!("| **URL** | {} |\n", record.link));
    }
    if let Some(date) = record.date.as_deref().filter(|d| !d.is_empty()) {
        md.push_str(&format!("| **Date** | {} |\n", date));
    }
    let words = record.full_text.split_whitespace().count();
    md.push_str(&format!("| **Words** | {} |\n", group_thousands(words)));
    if include_query && !record.company.is_empty() {
        md.push_str(&format!("| **Query** | {} |\n", record.company));
    }
    md
}

fn title_or_untitled(record: &Record) -> &str {
    if record.title.is_empty() {
        "Untitled"
    } else {
        &record.title
    }
}

/// `12345` → `12,345`
fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Lowercase ASCII alphanumerics with `_` between runs, for file names
fn file_slug(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let joined = lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let truncated: String = joined.chars().take(MAX_FILE_SLUG_CHARS).collect();
    let slug = truncated.trim_end_matches('_');
    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug.to_string()
    }
}

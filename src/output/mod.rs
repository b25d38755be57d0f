//! Record output
//!
//! This module handles:
//! - The flat `Record` row written for every accepted page
//! - The `source_file` provenance tag
//! - Append-only writers (SQLite, JSON Lines, Markdown) behind `RecordWriter`

mod jsonl;
mod markdown;
mod record;
mod sqlite;

pub use jsonl::JsonlRecordWriter;
pub use markdown::{format_record_md, MarkdownRecordWriter};
pub use record::{make_source_file_tag, query_slug, quarter_tag, Record, SourceMode};
pub use sqlite::{SqliteRecordWriter, RECORDS_SCHEMA};

use thiserror::Error;

/// Errors that can occur while writing records
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Append-only sink for accepted records
pub trait RecordWriter: Send {
    /// Appends a batch; an empty batch is a no-op
    fn append(&mut self, records: &[Record]) -> OutputResult<()>;

    /// Short label used in logs
    fn name(&self) -> &str;
}

/// Writes every batch to each of its writers in order
///
/// Stops at the first writer that fails.
#[derive(Default)]
pub struct MultiWriter {
    writers: Vec<Box<dyn RecordWriter>>,
}

impl MultiWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, writer: Box<dyn RecordWriter>) {
        self.writers.push(writer);
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl RecordWriter for MultiWriter {
    fn append(&mut self, records: &[Record]) -> OutputResult<()> {
        for writer in &mut self.writers {
            writer.append(records)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "multi"
    }
}

impl std::fmt::Debug for MultiWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.writers.iter().map(|w| w.name()).collect();
        f.debug_struct("MultiWriter").field("writers", &names).finish()
    }
}

//! JSON Lines record writer

use crate::output::{OutputResult, Record, RecordWriter};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends one JSON object per record to a file
#[derive(Debug, Clone)]
pub struct JsonlRecordWriter {
    path: PathBuf,
}

impl JsonlRecordWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordWriter for JsonlRecordWriter {
    fn append(&mut self, records: &[Record]) -> OutputResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut out = BufWriter::new(file);
        for record in records {
            serde_json::to_writer(&mut out, record)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;

        tracing::info!("Appended {} records to {}", records.len(), self.path.display());
        Ok(())
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

//! SQLite record writer
//!
//! Records land in a single `records` table keyed by link. Re-appending a
//! link that is already stored is ignored, so resumed runs never duplicate
//! rows.

use crate::output::{OutputResult, Record, RecordWriter};
use rusqlite::{params, Connection};
use std::path::Path;

/// SQL schema for the records table
pub const RECORDS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company TEXT NOT NULL,
    title TEXT NOT NULL,
    link TEXT NOT NULL UNIQUE,
    snippet TEXT NOT NULL,
    date TEXT,
    source TEXT NOT NULL,
    full_text TEXT NOT NULL,
    source_file TEXT NOT NULL,
    written_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_company ON records(company);
CREATE INDEX IF NOT EXISTS idx_records_source ON records(source);
CREATE INDEX IF NOT EXISTS idx_records_source_file ON records(source_file);
"#;

/// SQLite-backed `RecordWriter`
pub struct SqliteRecordWriter {
    conn: Connection,
}

impl SqliteRecordWriter {
    /// Opens (or creates) the database and its schema
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file; missing parent
    ///   directories are created
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteRecordWriter)` - Database ready for appends
    /// * `Err(OutputError)` - Failed to open or initialize the database
    pub fn open(path: &Path) -> OutputResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.execute_batch(RECORDS_SCHEMA)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(RECORDS_SCHEMA)?;
        Ok(Self { conn })
    }

    /// Number of stored records
    pub fn count(&self) -> OutputResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Loads every stored record in insertion order
    pub fn load_all(&self) -> OutputResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT company, title, link, snippet, date, source, full_text, source_file
             FROM records ORDER BY id",
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(Record {
                    company: row.get(0)?,
                    title: row.get(1)?,
                    link: row.get(2)?,
                    snippet: row.get(3)?,
                    date: row.get(4)?,
                    source: row.get(5)?,
                    full_text: row.get(6)?,
                    source_file: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

impl RecordWriter for SqliteRecordWriter {
    fn append(&mut self, records: &[Record]) -> OutputResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO records
                 (company, title, link, snippet, date, source, full_text, source_file, written_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for record in records {
                inserted += stmt.execute(params![
                    record.company,
                    record.title,
                    record.link,
                    record.snippet,
                    record.date,
                    record.source,
                    record.full_text,
                    record.source_file,
                    now,
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!(
            "Appended {} records to SQLite ({} already stored)",
            inserted,
            records.len() - inserted
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(link: &str) -> Record {
        Record {
            company: "acme".to_string(),
            title: "Acme beats estimates".to_string(),
            link: link.to_string(),
            snippet: "Acme reported...".to_string(),
            date: Some("2024-03-15".to_string()),
            source: "example.com".to_string(),
            full_text: "Acme reported strong results".to_string(),
            source_file: "acme_ddgtext_2024Q1".to_string(),
        }
    }

    #[test]
    fn test_append_and_load() {
        let mut writer = SqliteRecordWriter::open_in_memory().unwrap();
        writer
            .append(&[record("https://example.com/a"), record("https://example.com/b")])
            .unwrap();

        let stored = writer.load_all().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], record("https://example.com/a"));
    }

    #[test]
    fn test_duplicate_links_ignored() {
        let mut writer = SqliteRecordWriter::open_in_memory().unwrap();
        writer.append(&[record("https://example.com/a")]).unwrap();
        writer
            .append(&[record("https://example.com/a"), record("https://example.com/c")])
            .unwrap();
        assert_eq!(writer.count().unwrap(), 2);
    }

    #[test]
    fn test_empty_batch() {
        let mut writer = SqliteRecordWriter::open_in_memory().unwrap();
        writer.append(&[]).unwrap();
        assert_eq!(writer.count().unwrap(), 0);
    }

    #[test]
    fn test_reopen_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("records.db");

        {
            let mut writer = SqliteRecordWriter::open(&path).unwrap();
            writer.append(&[record("https://example.com/a")]).unwrap();
        }

        let writer = SqliteRecordWriter::open(&path).unwrap();
        assert_eq!(writer.count().unwrap(), 1);
    }
}

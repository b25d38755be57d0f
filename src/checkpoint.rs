//! Crash-safe progress tracking
//!
//! The checkpoint records which work units are complete, which URLs have been
//! fetched, and how often each URL failed. It is written after every
//! completed unit by writing and syncing `<path>.tmp`, then renaming it over
//! `<path>`, so a crash or power loss leaves either the previous or the new
//! state on disk.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Run counters persisted with the checkpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointStats {
    pub total_units: u64,
    pub total_pages: u64,
    pub total_words: u64,
    pub failed_fetches: u64,
    pub failed_extractions: u64,
}

/// On-disk checkpoint document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointState {
    pub completed_units: BTreeSet<String>,
    pub fetched_urls: BTreeSet<String>,
    pub failed_urls: BTreeMap<String, u32>,
    pub stats: CheckpointStats,
}

/// Durable record of run progress
#[derive(Debug)]
pub struct Checkpoint {
    path: PathBuf,
    state: CheckpointState,
}

impl Checkpoint {
    /// Creates an empty checkpoint that will be saved to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: CheckpointState::default(),
        }
    }

    /// Loads a checkpoint from disk
    ///
    /// A missing file yields an empty checkpoint bound to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            tracing::debug!("No checkpoint at {}, starting fresh", path.display());
            return Ok(Self::new(path));
        }

        let content = std::fs::read_to_string(&path)?;
        let state: CheckpointState = serde_json::from_str(&content)?;
        tracing::debug!(
            "Loaded checkpoint {}: {} units done, {} URLs fetched",
            path.display(),
            state.completed_units.len(),
            state.fetched_urls.len()
        );
        Ok(Self { path, state })
    }

    /// Writes the checkpoint atomically
    pub fn save(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.state)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    pub fn stats(&self) -> &CheckpointStats {
        &self.state.stats
    }

    pub fn completed_units(&self) -> usize {
        self.state.completed_units.len()
    }

    pub fn is_unit_done(&self, unit: &str) -> bool {
        self.state.completed_units.contains(unit)
    }

    /// Marks a unit complete and persists the checkpoint
    ///
    /// Marking an already completed unit still persists but does not count
    /// it twice.
    pub fn mark_unit_done(&mut self, unit: &str) -> Result<()> {
        if self.state.completed_units.insert(unit.to_string()) {
            self.state.stats.total_units += 1;
        }
        self.save()
    }

    pub fn is_url_fetched(&self, url: &str) -> bool {
        self.state.fetched_urls.contains(url)
    }

    pub fn mark_url_fetched(&mut self, url: &str) {
        self.state.fetched_urls.insert(url.to_string());
    }

    /// Counts a failed fetch of `url`
    pub fn mark_url_failed(&mut self, url: &str) {
        *self.state.failed_urls.entry(url.to_string()).or_insert(0) += 1;
        self.state.stats.failed_fetches += 1;
    }

    pub fn failure_count(&self, url: &str) -> u32 {
        self.state.failed_urls.get(url).copied().unwrap_or(0)
    }

    /// Returns true while `url` has failed fewer than `max_retries` times
    pub fn should_retry(&self, url: &str, max_retries: u32) -> bool {
        self.failure_count(url) < max_retries
    }

    /// Adds an accepted page to the counters
    pub fn record_page(&mut self, words: usize) {
        self.state.stats.total_pages += 1;
        self.state.stats.total_words += words as u64;
    }

    pub fn record_failed_extraction(&mut self) {
        self.state.stats.failed_extractions += 1;
    }

    /// Clears completed units and counters, keeping URL history, and persists
    pub fn reset_units(&mut self) -> Result<()> {
        self.state.completed_units.clear();
        self.state.stats = CheckpointStats::default();
        self.save()
    }
}

/// Serializes `value` to `path` through a temporary file and a rename
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let json = serde_json::to_vec(value)?;
    let mut file = File::create(&tmp)?;
    file.write_all(&json)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&tmp, path)?;
    Ok(())
}

//! Duplicate detection for URLs and page content
//!
//! Two tiers:
//! - Exact: SHA-256 of the URL identity and of the first 2000 characters of text
//! - Approximate: a [`NearDuplicateIndex`] (MinHash + LSH unless fuzzy matching is off)

mod lsh;
mod minhash;

pub use lsh::{ExactOnly, MinHashLsh, NearDuplicateIndex};
pub use minhash::{estimate_jaccard, MinHasher};

use crate::checkpoint::write_json_atomic;
use crate::config::DedupConfig;
use crate::url::url_identity;
use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Characters of text covered by the exact content hash
const CONTENT_PREFIX_CHARS: usize = 2000;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct DedupSnapshot {
    urls: Vec<String>,
    content: Vec<String>,
    signatures: Vec<Vec<u64>>,
}

/// URL and content deduplicator
#[derive(Debug)]
pub struct Deduplicator {
    seen_urls: HashSet<String>,
    seen_content: HashSet<String>,
    near: Box<dyn NearDuplicateIndex>,
}

impl Deduplicator {
    /// Creates an empty deduplicator; fuzzy matching follows `config.fuzzy`
    pub fn new(config: &DedupConfig) -> Self {
        let near: Box<dyn NearDuplicateIndex> = if config.fuzzy {
            Box::new(MinHashLsh::new(
                config.num_perm,
                config.bands,
                config.shingle_size,
                config.threshold,
            ))
        } else {
            Box::new(ExactOnly)
        };
        Self::with_index(near)
    }

    /// Creates an empty deduplicator over a specific near-duplicate index
    pub fn with_index(near: Box<dyn NearDuplicateIndex>) -> Self {
        Self {
            seen_urls: HashSet::new(),
            seen_content: HashSet::new(),
            near,
        }
    }

    /// Hex SHA-256 of a URL's identity
    pub fn url_hash(url: &str) -> String {
        hex::encode(Sha256::digest(url_identity(url).as_bytes()))
    }

    /// Hex SHA-256 of the first 2000 characters of `text`
    pub fn content_hash(text: &str) -> String {
        let prefix: String = text.chars().take(CONTENT_PREFIX_CHARS).collect();
        hex::encode(Sha256::digest(prefix.as_bytes()))
    }

    pub fn is_duplicate_url(&self, url: &str) -> bool {
        self.seen_urls.contains(&Self::url_hash(url))
    }

    /// Checks text against exact and near-duplicate indexes
    ///
    /// Empty text is never a duplicate.
    pub fn is_duplicate_content(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.seen_content.contains(&Self::content_hash(text)) || self.near.is_near_duplicate(text)
    }

    /// Records a URL and its text in every index
    pub fn mark_seen(&mut self, url: &str, text: &str) {
        self.seen_urls.insert(Self::url_hash(url));
        if !text.trim().is_empty() {
            self.seen_content.insert(Self::content_hash(text));
            self.near.insert(text);
        }
    }

    pub fn url_count(&self) -> usize {
        self.seen_urls.len()
    }

    pub fn content_count(&self) -> usize {
        self.seen_content.len()
    }

    /// Name of the near-duplicate strategy in use
    pub fn strategy(&self) -> &'static str {
        self.near.name()
    }

    /// Writes all indexes as one JSON document
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = DedupSnapshot {
            urls: self.seen_urls.iter().cloned().collect(),
            content: self.seen_content.iter().cloned().collect(),
            signatures: self.near.signatures().to_vec(),
        };
        write_json_atomic(path, &snapshot)?;
        tracing::debug!(
            "Saved dedup index to {} ({} urls, {} signatures)",
            path.display(),
            snapshot.urls.len(),
            snapshot.signatures.len()
        );
        Ok(())
    }

    /// Merges a saved index into this deduplicator
    ///
    /// A missing file is not an error. Signatures are ignored by an
    /// exact-only deduplicator.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path)?;
        let snapshot: DedupSnapshot = serde_json::from_str(&content)?;
        tracing::debug!(
            "Loaded dedup index from {} ({} urls, {} signatures)",
            path.display(),
            snapshot.urls.len(),
            snapshot.signatures.len()
        );

        self.seen_urls.extend(snapshot.urls);
        self.seen_content.extend(snapshot.content);
        self.near.restore(snapshot.signatures);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VOCAB: &[&str] = &[
        "revenue", "growth", "quarter", "margin", "guidance", "analysts", "shares", "market",
        "demand", "supply", "capital", "outlook", "profit", "costs", "segment", "customers",
        "pricing", "inventory", "dividend", "earnings", "forecast", "investors", "strategy",
        "expansion", "regulators", "contract", "operations", "cash",
    ];

    /// About 300 words of deterministic article-like text
    fn article(seed: usize) -> Vec<String> {
        (0..300)
            .map(|i| format!("{}{}", VOCAB[(i * 5 + seed) % VOCAB.len()], (i + seed) / VOCAB.len()))
            .collect()
    }

    fn fuzzy() -> DedupConfig {
        DedupConfig::default()
    }

    fn exact() -> DedupConfig {
        DedupConfig {
            fuzzy: false,
            ..DedupConfig::default()
        }
    }

    #[test]
    fn test_url_identity_variants() {
        let mut dedup = Deduplicator::new(&exact());
        dedup.mark_seen("https://x.com/a/", "");

        assert!(dedup.is_duplicate_url("https://X.com/a/"));
        assert!(dedup.is_duplicate_url("https://x.com/a"));
        assert!(dedup.is_duplicate_url("https://x.com/a#frag"));
        assert!(!dedup.is_duplicate_url("https://x.com/b"));
    }

    #[test]
    fn test_content_exactness() {
        let mut dedup = Deduplicator::new(&exact());
        let base = "a".repeat(2000);
        dedup.mark_seen("https://x.com/1", &format!("{}tail one", base));

        assert!(dedup.is_duplicate_content(&format!("{}a different tail", base)));

        let mut changed = base.clone();
        changed.replace_range(10..11, "b");
        assert!(!dedup.is_duplicate_content(&changed));
    }

    #[test]
    fn test_empty_text_never_duplicate() {
        let mut dedup = Deduplicator::new(&fuzzy());
        dedup.mark_seen("https://x.com/1", "");
        assert!(!dedup.is_duplicate_content(""));
        assert_eq!(dedup.content_count(), 0);
        assert_eq!(dedup.url_count(), 1);
    }

    #[test]
    fn test_fuzzy_near_duplicate() {
        let mut dedup = Deduplicator::new(&fuzzy());
        let original = article(0);
        dedup.mark_seen("https://x.com/story", &original.join(" "));

        let mut edited = original.clone();
        edited[20] = "amended".to_string();
        edited[150] = "revised".to_string();
        edited[280] = "updated".to_string();
        let edited = edited.join(" ");

        assert!(!dedup.seen_content.contains(&Deduplicator::content_hash(&edited)));
        assert!(dedup.is_duplicate_content(&edited));

        let unrelated: String = (0..300)
            .map(|i| format!("unrelated{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        assert!(!dedup.is_duplicate_content(&unrelated));
    }

    #[test]
    fn test_exact_only_ignores_near_duplicates() {
        let mut dedup = Deduplicator::new(&exact());
        let original = article(0);
        dedup.mark_seen("https://x.com/story", &original.join(" "));

        let mut edited = original;
        edited[0] = "amended".to_string();
        assert!(!dedup.is_duplicate_content(&edited.join(" ")));
        assert_eq!(dedup.strategy(), "exact-only");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dedup.json");
        let text = article(3).join(" ");

        let mut dedup = Deduplicator::new(&fuzzy());
        dedup.mark_seen("https://x.com/a", &text);
        dedup.save(&path).unwrap();

        let mut loaded = Deduplicator::new(&fuzzy());
        loaded.load(&path).unwrap();
        assert!(loaded.is_duplicate_url("https://x.com/a"));
        assert!(loaded.is_duplicate_content(&text));
        assert_eq!(loaded.near.len(), 1);

        let mut exact_loaded = Deduplicator::new(&exact());
        exact_loaded.load(&path).unwrap();
        assert!(exact_loaded.is_duplicate_content(&text));
        assert!(exact_loaded.near.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut dedup = Deduplicator::new(&fuzzy());
        dedup.load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(dedup.url_count(), 0);
    }
}

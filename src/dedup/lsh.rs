//! Near-duplicate indexes
//!
//! `MinHashLsh` buckets signatures by band so a lookup only compares against
//! candidates sharing at least one band. `ExactOnly` is used when fuzzy
//! matching is disabled.

use crate::dedup::minhash::{estimate_jaccard, MinHasher};
use std::collections::HashMap;
use std::fmt::Debug;

/// Approximate content matching capability
pub trait NearDuplicateIndex: Debug + Send + Sync {
    /// Returns true if indexed text is at least threshold-similar to `text`
    fn is_near_duplicate(&self, text: &str) -> bool;

    /// Adds `text` to the index
    fn insert(&mut self, text: &str);

    /// Stored signatures, for persistence
    fn signatures(&self) -> &[Vec<u64>];

    /// Re-adds persisted signatures; signatures of the wrong width are dropped
    fn restore(&mut self, signatures: Vec<Vec<u64>>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn name(&self) -> &'static str;
}

/// MinHash signatures with banded locality-sensitive hashing
#[derive(Debug)]
pub struct MinHashLsh {
    hasher: MinHasher,
    bands: usize,
    rows: usize,
    threshold: f64,
    signatures: Vec<Vec<u64>>,
    /// One map per band from the band's rows to signature indices
    buckets: Vec<HashMap<Vec<u64>, Vec<usize>>>,
}

impl MinHashLsh {
    /// Creates an empty index
    ///
    /// # Arguments
    ///
    /// * `num_perm` - Signature width; must be a multiple of `bands`
    /// * `bands` - Number of LSH bands
    /// * `shingle_size` - Words per shingle
    /// * `threshold` - Estimated Jaccard similarity that counts as a duplicate
    pub fn new(num_perm: usize, bands: usize, shingle_size: usize, threshold: f64) -> Self {
        let bands = bands.max(1);
        Self {
            hasher: MinHasher::new(num_perm, shingle_size),
            bands,
            rows: num_perm / bands,
            threshold,
            signatures: Vec::new(),
            buckets: vec![HashMap::new(); bands],
        }
    }

    fn band<'a>(&self, signature: &'a [u64], band: usize) -> &'a [u64] {
        &signature[band * self.rows..(band + 1) * self.rows]
    }

    fn add_signature(&mut self, signature: Vec<u64>) {
        let index = self.signatures.len();
        for band in 0..self.bands {
            let key = self.band(&signature, band).to_vec();
            self.buckets[band].entry(key).or_default().push(index);
        }
        self.signatures.push(signature);
    }

    fn best_match(&self, signature: &[u64]) -> Option<f64> {
        let mut best: Option<f64> = None;
        for band in 0..self.bands {
            let Some(candidates) = self.buckets[band].get(self.band(signature, band)) else {
                continue;
            };
            for &candidate in candidates {
                let similarity = estimate_jaccard(signature, &self.signatures[candidate]);
                if best.map_or(true, |b| similarity > b) {
                    best = Some(similarity);
                }
            }
        }
        best
    }
}

impl NearDuplicateIndex for MinHashLsh {
    fn is_near_duplicate(&self, text: &str) -> bool {
        if self.signatures.is_empty() || text.trim().is_empty() {
            return false;
        }
        let signature = self.hasher.signature(text);
        match self.best_match(&signature) {
            Some(similarity) if similarity >= self.threshold => {
                tracing::trace!("Near duplicate with estimated similarity {:.2}", similarity);
                true
            }
            _ => false,
        }
    }

    fn insert(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let signature = self.hasher.signature(text);
        self.add_signature(signature);
    }

    fn signatures(&self) -> &[Vec<u64>] {
        &self.signatures
    }

    fn restore(&mut self, signatures: Vec<Vec<u64>>) {
        let width = self.hasher.num_perm();
        let mut dropped = 0;
        for signature in signatures {
            if signature.len() == width {
                self.add_signature(signature);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::warn!(
                "Dropped {} stored signatures not matching num-perm {}",
                dropped,
                width
            );
        }
    }

    fn len(&self) -> usize {
        self.signatures.len()
    }

    fn name(&self) -> &'static str {
        "minhash-lsh"
    }
}

/// Index that never reports near duplicates
#[derive(Debug, Default)]
pub struct ExactOnly;

impl NearDuplicateIndex for ExactOnly {
    fn is_near_duplicate(&self, _text: &str) -> bool {
        false
    }

    fn insert(&mut self, _text: &str) {}

    fn signatures(&self) -> &[Vec<u64>] {
        &[]
    }

    fn restore(&mut self, _signatures: Vec<Vec<u64>>) {}

    fn len(&self) -> usize {
        0
    }

    fn name(&self) -> &'static str {
        "exact-only"
    }
}

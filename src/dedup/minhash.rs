//! MinHash signatures over word shingles

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// 2^61 - 1
const MERSENNE_PRIME: u64 = (1 << 61) - 1;

/// Fixed so signatures persisted by one process compare with another's
const PERMUTATION_SEED: u64 = 1;

/// Computes MinHash signatures with `num_perm` universal-hash permutations
#[derive(Debug, Clone)]
pub struct MinHasher {
    permutations: Vec<(u64, u64)>,
    shingle_size: usize,
}

impl MinHasher {
    pub fn new(num_perm: usize, shingle_size: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(PERMUTATION_SEED);
        let permutations = (0..num_perm)
            .map(|_| (rng.gen_range(1..MERSENNE_PRIME), rng.gen_range(0..MERSENNE_PRIME)))
            .collect();

        Self {
            permutations,
            shingle_size: shingle_size.max(1),
        }
    }

    pub fn num_perm(&self) -> usize {
        self.permutations.len()
    }

    /// Overlapping lowercase word windows of `shingle_size` words
    ///
    /// Text shorter than one window becomes a single shingle.
    pub fn shingles(&self, text: &str) -> HashSet<String> {
        let words: Vec<String> = text.split_whitespace().map(|w| w.to_lowercase()).collect();
        if words.is_empty() {
            return HashSet::new();
        }
        if words.len() < self.shingle_size {
            return std::iter::once(words.join(" ")).collect();
        }
        words.windows(self.shingle_size).map(|w| w.join(" ")).collect()
    }

    /// Minimum of each permutation over the text's shingle hashes
    pub fn signature(&self, text: &str) -> Vec<u64> {
        let mut signature = vec![u64::MAX; self.permutations.len()];
        for shingle in self.shingles(text) {
            let x = shingle_hash(&shingle);
            for (slot, &(a, b)) in signature.iter_mut().zip(&self.permutations) {
                let h = permute(x, a, b);
                if h < *slot {
                    *slot = h;
                }
            }
        }
        signature
    }
}

/// Fraction of positions where two signatures agree
pub fn estimate_jaccard(a: &[u64], b: &[u64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let equal = a.iter().zip(b).filter(|(x, y)| x == y).count();
    equal as f64 / a.len() as f64
}

fn shingle_hash(shingle: &str) -> u64 {
    let digest = Sha256::digest(shingle.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes) & MERSENNE_PRIME
}

fn permute(x: u64, a: u64, b: u64) -> u64 {
    ((a as u128 * x as u128 + b as u128) % MERSENNE_PRIME as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shingles() {
        let hasher = MinHasher::new(16, 3);
        let shingles = hasher.shingles("The quick brown fox jumps");
        assert_eq!(shingles.len(), 3);
        assert!(shingles.contains("the quick brown"));
        assert!(shingles.contains("brown fox jumps"));
    }

    #[test]
    fn test_short_text_is_one_shingle() {
        let hasher = MinHasher::new(16, 3);
        let shingles = hasher.shingles("two words");
        assert_eq!(shingles.len(), 1);
        assert!(shingles.contains("two words"));
        assert!(hasher.shingles("   ").is_empty());
    }

    #[test]
    fn test_signature_is_deterministic() {
        let a = MinHasher::new(64, 3);
        let b = MinHasher::new(64, 3);
        let text = "revenue grew eleven percent in the third quarter";
        assert_eq!(a.signature(text), b.signature(text));
        assert_eq!(a.signature(text).len(), 64);
    }

    #[test]
    fn test_identical_text_estimates_one() {
        let hasher = MinHasher::new(128, 3);
        let sig = hasher.signature("margins expanded on lower input costs this year");
        assert_eq!(estimate_jaccard(&sig, &sig), 1.0);
    }

    #[test]
    fn test_disjoint_text_estimates_low() {
        let hasher = MinHasher::new(128, 3);
        let a: String = (0..200).map(|i| format!("alpha{} ", i)).collect();
        let b: String = (0..200).map(|i| format!("omega{} ", i)).collect();
        assert!(estimate_jaccard(&hasher.signature(&a), &hasher.signature(&b)) < 0.1);
    }

    #[test]
    fn test_mismatched_lengths() {
        assert_eq!(estimate_jaccard(&[1, 2], &[1]), 0.0);
        assert_eq!(estimate_jaccard(&[], &[]), 0.0);
    }
}

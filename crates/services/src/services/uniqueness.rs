//! Duplicate detection for generated review text.
//!
//! Two levels: a whole-string hash over normalized text catches exact
//! repeats, and word 3-gram shingle sets compared by Jaccard overlap catch
//! near-repeats. A 64-bit simhash over the tokens is persisted with every
//! review as a cheap prefilter before the shingle comparison.

use std::collections::HashSet;

use db::models::generated_review::GeneratedReview;
use sha2::{Digest, Sha256};

const NGRAM_SIZE: usize = 3;
const SIMHASH_PREFILTER_DISTANCE: u32 = 16;
const DEFAULT_JACCARD_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub enum UniquenessVerdict {
    Unique,
    ExactDuplicate,
    NearDuplicate { overlap: f64 },
}

impl UniquenessVerdict {
    pub fn is_unique(&self) -> bool {
        matches!(self, UniquenessVerdict::Unique)
    }
}

/// Lowercase and collapse whitespace so formatting differences do not
/// defeat the exact check.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Hex SHA-256 of the normalized text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(text).as_bytes());
    format!("{:x}", hasher.finalize())
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

/// Hashes of overlapping word n-grams.
fn shingles(tokens: &[String]) -> HashSet<u64> {
    if tokens.len() < NGRAM_SIZE {
        // Too short for n-grams, fall back to single-token shingles.
        return tokens.iter().map(|t| fnv1a(t.as_bytes())).collect();
    }
    tokens
        .windows(NGRAM_SIZE)
        .map(|w| fnv1a(w.join(" ").as_bytes()))
        .collect()
}

/// 64-bit token-level simhash fingerprint.
pub fn simhash(text: &str) -> u64 {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return 0;
    }

    let mut counts = [0i32; 64];
    for token in &tokens {
        let hash = fnv1a(token.as_bytes());
        for (bit, count) in counts.iter_mut().enumerate() {
            if hash & (1 << bit) != 0 {
                *count += 1;
            } else {
                *count -= 1;
            }
        }
    }

    let mut fingerprint = 0u64;
    for (bit, &count) in counts.iter().enumerate() {
        if count >= 0 {
            fingerprint |= 1 << bit;
        }
    }
    fingerprint
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

fn jaccard(a: &HashSet<u64>, b: &HashSet<u64>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Gate deciding whether a candidate text is fresh enough against the
/// recent reviews of one card.
#[derive(Debug, Clone)]
pub struct UniquenessGuard {
    jaccard_threshold: f64,
}

impl Default for UniquenessGuard {
    fn default() -> Self {
        Self {
            jaccard_threshold: DEFAULT_JACCARD_THRESHOLD,
        }
    }
}

impl UniquenessGuard {
    pub fn new(jaccard_threshold: f64) -> Self {
        Self { jaccard_threshold }
    }

    pub fn check(&self, candidate: &str, recent: &[GeneratedReview]) -> UniquenessVerdict {
        let hash = content_hash(candidate);
        if recent.iter().any(|r| r.content_hash == hash) {
            return UniquenessVerdict::ExactDuplicate;
        }

        let candidate_simhash = simhash(candidate);
        let candidate_shingles = shingles(&tokenize(candidate));

        for review in recent {
            // The stored fingerprint rules out clearly unrelated texts
            // before the shingle sets are built.
            if hamming_distance(candidate_simhash, review.ngram_hash as u64)
                > SIMHASH_PREFILTER_DISTANCE
            {
                continue;
            }
            let overlap = jaccard(&candidate_shingles, &shingles(&tokenize(&review.content)));
            if overlap >= self.jaccard_threshold {
                return UniquenessVerdict::NearDuplicate { overlap };
            }
        }

        UniquenessVerdict::Unique
    }
}

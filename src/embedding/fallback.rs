//! Deterministic hash-based embedder.
//!
//! Not semantic: token n-grams are hashed into bucket positions, giving
//! stable, reproducible vectors that make nearby texts with shared
//! vocabulary land near each other. Used by tests and as the last-resort
//! provider.

use super::QueryEmbedder;
use crate::error::Result;

/// Hash-based pseudo-embedder.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Creates a hash embedder with the given dimensions.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

/// FNV-1a, stable across platforms and compilations.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

impl QueryEmbedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_query(&self, prompt: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimensions];
        for token in prompt.to_lowercase().split_whitespace() {
            let hash = fnv1a(token.as_bytes());
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hash % self.dimensions as u64) as usize;
            // Sign bit from a higher hash bit decorrelates buckets.
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        // L2-normalize so distances are comparable across prompt lengths.
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }
}

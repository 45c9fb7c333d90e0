//! Vector similarity utilities.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity over dense vectors
//! - Term-frequency vectors and the cosine distance between two texts

use std::collections::{BTreeSet, HashMap};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Lowercased alphanumeric terms of `text` with their counts.
pub fn term_frequencies(text: &str) -> HashMap<String, f32> {
    let mut counts = HashMap::new();
    for term in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        *counts.entry(term.to_lowercase()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Cosine distance (`1 - similarity`) between two term-frequency maps.
///
/// 0.0 means the same term distribution, 1.0 means no shared terms.
pub fn term_distance(a: &HashMap<String, f32>, b: &HashMap<String, f32>) -> f32 {
    let vocabulary: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    let dense = |tf: &HashMap<String, f32>| -> Vec<f32> {
        vocabulary
            .iter()
            .map(|term| tf.get(*term).copied().unwrap_or(0.0))
            .collect()
    };
    1.0 - cosine_similarity(&dense(a), &dense(b))
}

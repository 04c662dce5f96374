//! Vector arithmetic and similarity measures.
//!
//! Every function here is pure: inputs are borrowed, results are freshly
//! allocated, and binary operations fail with
//! [`EmbeddingError::DimensionMismatch`] when the lengths differ.

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

fn check_dimensions(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(EmbeddingError::mismatch(a.len(), b.len()));
    }
    Ok(())
}

/// Element-wise sum of two embeddings.
pub fn add(a: &[f32], b: &[f32]) -> Result<Embedding> {
    check_dimensions(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| x + y).collect())
}

/// Element-wise difference `a - b`.
pub fn subtract(a: &[f32], b: &[f32]) -> Result<Embedding> {
    check_dimensions(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| x - y).collect())
}

/// Euclidean length of an embedding.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine of the angle between `a` and `b`, in [-1, 1].
///
/// A zero-magnitude input scores `0.0` rather than failing.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot = dot_product(a, b)?;
    let denominator = magnitude(a) * magnitude(b);
    if denominator == 0.0 {
        return Ok(0.0);
    }

    // Rounding can push identical vectors a hair past 1.0.
    Ok((dot / denominator).clamp(-1.0, 1.0))
}

/// Straight-line (L2) distance.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dimensions(a, b)?;
    let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    Ok(sum.sqrt())
}

/// Sum of absolute component differences (L1).
pub fn manhattan_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dimensions(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum())
}

pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dimensions(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

/// Return a unit-length copy of `v`, or an unchanged copy if `v` is zero.
pub fn normalize(v: &[f32]) -> Embedding {
    let length = magnitude(v);
    if length == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / length).collect()
}

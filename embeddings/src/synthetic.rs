//! Deterministic pseudo-embeddings for when no real vector is available.
//!
//! The vector is derived from SHA-256 of the normalized text in counter
//! mode, so the same input always yields the same unit-length vector across
//! processes and releases. It carries no semantic meaning.

use sha2::{Digest, Sha256};

use crate::Embedding;
use crate::cache::EmbeddingCache;
use crate::error::{EmbeddingError, Result};
use crate::similarity::normalize;

/// Build the synthetic embedding for `text`.
pub fn synthetic_embedding(text: &str, dimension: usize) -> Result<Embedding> {
    let key = EmbeddingCache::normalize_key(text);
    if key.is_empty() {
        return Err(EmbeddingError::InvalidInput(
            "cannot derive a synthetic embedding from empty text".to_string(),
        ));
    }
    if dimension == 0 {
        return Err(EmbeddingError::InvalidInput(
            "embedding dimension must be positive".to_string(),
        ));
    }

    let mut raw = Vec::with_capacity(dimension);
    let mut block: u32 = 0;
    while raw.len() < dimension {
        let digest = Sha256::new()
            .chain_update(key.as_bytes())
            .chain_update(block.to_le_bytes())
            .finalize();
        for chunk in digest.chunks_exact(4) {
            if raw.len() == dimension {
                break;
            }
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            // Map onto [-1, 1].
            raw.push((f64::from(word) / f64::from(u32::MAX) * 2.0 - 1.0) as f32);
        }
        block += 1;
    }

    Ok(normalize(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::{cosine_similarity, magnitude};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_same_text_same_vector() {
        let a = synthetic_embedding("king", 384).unwrap();
        let b = synthetic_embedding("king", 384).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalized_text_collides() {
        let a = synthetic_embedding("King ", 16).unwrap();
        let b = synthetic_embedding("king", 16).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unit_length_and_dimension() {
        for dimension in [1, 7, 8, 384] {
            let v = synthetic_embedding("queen", dimension).unwrap();
            assert_eq!(v.len(), dimension);
            assert!((magnitude(&v) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_different_texts_differ() {
        let a = synthetic_embedding("king", 384).unwrap();
        let b = synthetic_embedding("queen", 384).unwrap();
        assert!(cosine_similarity(&a, &b).unwrap() < 0.5);
    }

    #[test]
    fn test_empty_text_is_rejected() {
        assert!(matches!(
            synthetic_embedding("   ", 384),
            Err(EmbeddingError::InvalidInput(_))
        ));
        assert!(matches!(
            synthetic_embedding("king", 0),
            Err(EmbeddingError::InvalidInput(_))
        ));
    }
}

//! Exact nearest-neighbour ranking over a candidate vocabulary.
//!
//! Ranking is a linear scan: every candidate is scored against the target.
//! That is fine for vocabularies in the hundreds to low thousands and is
//! the scaling ceiling of this design.

use std::cmp::Reverse;
use std::collections::HashSet;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::cache::EmbeddingCache;
use crate::error::{EmbeddingError, Result};
use crate::language::LanguageTag;
use crate::similarity::cosine_similarity;
use crate::vocabulary::VocabularyEntry;

/// A ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub word: String,

    /// Cosine similarity to the target, in [-1, 1].
    pub similarity: f32,

    pub language: LanguageTag,
}

/// Knobs for [`rank_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct RankOptions {
    pub top_k: usize,

    /// Drop candidates scoring below this.
    pub min_similarity: Option<f32>,

    /// Only consider candidates tagged with this language.
    pub language: Option<LanguageTag>,
}

impl RankOptions {
    pub fn top_k(top_k: usize) -> Self {
        Self {
            top_k,
            min_similarity: None,
            language: None,
        }
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    pub fn with_language(mut self, language: LanguageTag) -> Self {
        self.language = Some(language);
        self
    }
}

/// Rank `candidates` by cosine similarity to `target`.
///
/// Words in `exclude_words` are skipped (case-insensitive). Ties keep the
/// candidates' input order. Every candidate must match the target's
/// dimension, including ones that are excluded or filtered out.
pub fn rank(
    target: &[f32],
    candidates: &[VocabularyEntry],
    top_k: usize,
    exclude_words: &HashSet<String>,
) -> Result<Vec<RankedResult>> {
    rank_with(target, candidates, &RankOptions::top_k(top_k), exclude_words)
}

/// [`rank`] with an optional similarity floor and language filter.
pub fn rank_with(
    target: &[f32],
    candidates: &[VocabularyEntry],
    options: &RankOptions,
    exclude_words: &HashSet<String>,
) -> Result<Vec<RankedResult>> {
    let excluded: HashSet<String> = exclude_words
        .iter()
        .map(|w| EmbeddingCache::normalize_key(w))
        .collect();

    let mut scored: Vec<(OrderedFloat<f32>, &VocabularyEntry)> = Vec::new();
    for candidate in candidates {
        if candidate.embedding.len() != target.len() {
            return Err(EmbeddingError::mismatch(target.len(), candidate.embedding.len()));
        }
        if excluded.contains(&EmbeddingCache::normalize_key(&candidate.word)) {
            continue;
        }
        if options.language.is_some_and(|l| l != candidate.language) {
            continue;
        }
        let similarity = cosine_similarity(target, &candidate.embedding)?;
        if options.min_similarity.is_some_and(|min| similarity < min) {
            continue;
        }
        scored.push((OrderedFloat(similarity), candidate));
    }

    // Stable: equal scores stay in input order.
    scored.sort_by_key(|(score, _)| Reverse(*score));

    Ok(scored
        .into_iter()
        .take(options.top_k)
        .map(|(score, entry)| RankedResult {
            word: entry.word.clone(),
            similarity: score.0,
            language: entry.language,
        })
        .collect())
}

//! Candidate vocabularies for similarity ranking.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::language::{self, LanguageTag};

/// A word eligible to appear in ranked results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawVocabularyEntry")]
pub struct VocabularyEntry {
    pub word: String,
    pub language: LanguageTag,
    pub embedding: Embedding,

    /// Optional relevance score supplied with the vocabulary.
    pub weight: Option<f32>,
}

impl VocabularyEntry {
    /// Create an entry, inferring its language from the word.
    pub fn new(word: impl Into<String>, embedding: Embedding) -> Self {
        let word = word.into();
        Self {
            language: language::detect(&word),
            word,
            embedding,
            weight: None,
        }
    }

    /// Override the detected language.
    pub fn with_language(mut self, language: LanguageTag) -> Self {
        self.language = language;
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// On-disk shape; `language` may be omitted.
#[derive(Deserialize)]
struct RawVocabularyEntry {
    word: String,
    language: Option<LanguageTag>,
    embedding: Embedding,
    weight: Option<f32>,
}

impl From<RawVocabularyEntry> for VocabularyEntry {
    fn from(raw: RawVocabularyEntry) -> Self {
        Self {
            language: raw.language.unwrap_or_else(|| language::detect(&raw.word)),
            word: raw.word,
            embedding: raw.embedding,
            weight: raw.weight,
        }
    }
}

/// Supplier of the candidate set. Refresh cadence is up to the implementor.
#[async_trait]
pub trait VocabularySource: Send + Sync {
    async fn entries(&self) -> Result<Arc<[VocabularyEntry]>>;
}

/// A fixed vocabulary held in memory.
#[derive(Debug, Clone)]
pub struct StaticVocabulary {
    entries: Arc<[VocabularyEntry]>,
}

impl StaticVocabulary {
    /// Build a vocabulary, checking every entry has a word and all
    /// embeddings share one dimension.
    pub fn new(entries: Vec<VocabularyEntry>) -> Result<Self> {
        if let Some(first) = entries.first() {
            let dimension = first.embedding.len();
            for entry in &entries {
                if entry.word.trim().is_empty() {
                    return Err(EmbeddingError::Vocabulary(
                        "vocabulary entry with empty word".to_string(),
                    ));
                }
                if entry.embedding.len() != dimension {
                    return Err(EmbeddingError::mismatch(dimension, entry.embedding.len()));
                }
            }
        }

        Ok(Self {
            entries: entries.into(),
        })
    }

    /// Parse a JSON array of entries.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: Vec<VocabularyEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    /// Load a JSON array of entries from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let vocabulary = Self::from_json_str(&content)?;
        info!(
            "Loaded {} vocabulary entries from {}",
            vocabulary.len(),
            path.display()
        );
        Ok(vocabulary)
    }

    /// Shared embedding dimension, if the vocabulary is not empty.
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl VocabularySource for StaticVocabulary {
    async fn entries(&self) -> Result<Arc<[VocabularyEntry]>> {
        Ok(self.entries.clone())
    }
}

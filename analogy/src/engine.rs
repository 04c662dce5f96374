//! Analogy engine implementation.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};
use wordcalc_embeddings::language;
use wordcalc_embeddings::{
    BudgetGuard, BudgetSnapshot, CacheStats, Clock, EmbeddingAcquirer, EmbeddingCache,
    EmbeddingProvider, RankOptions, SystemClock, VectorStore, VocabularySource, rank_with,
};

use crate::config::AnalogyConfig;
use crate::error::{AnalogyError, Result};
use crate::operation::{Operation, OperationResult, RequestPhase};

/// Computes `word1 ± word2` and ranks a vocabulary against the result.
///
/// The engine owns the cache and budget state for its lifetime; share it
/// across request handlers behind an `Arc`.
pub struct AnalogyEngine {
    config: AnalogyConfig,
    acquirer: EmbeddingAcquirer,
    vocabulary: Arc<dyn VocabularySource>,
}

impl AnalogyEngine {
    /// Create a new engine builder.
    pub fn builder() -> AnalogyEngineBuilder {
        AnalogyEngineBuilder::new()
    }

    pub fn config(&self) -> &AnalogyConfig {
        &self.config
    }

    pub fn acquirer(&self) -> &EmbeddingAcquirer {
        &self.acquirer
    }

    /// Resolve both words, combine them with `op` and rank the vocabulary.
    ///
    /// The two words are resolved concurrently. Input words are never
    /// returned as results. A synthetic fallback for either word marks the
    /// result `degraded` instead of failing.
    pub async fn compute_operation(
        &self,
        word1: &str,
        word2: &str,
        op: Operation,
    ) -> Result<OperationResult> {
        let mut phase = RequestPhase::Start;
        debug!("Computing {word1:?} {op} {word2:?}");

        // Reject malformed input before either word can reach the generator.
        phase = self.advance(phase);
        self.acquirer
            .validate(word1)
            .map_err(|e| AnalogyError::failed(phase, e))?;
        self.acquirer
            .validate(word2)
            .map_err(|e| AnalogyError::failed(phase.next(), e))?;

        let (first, second) = tokio::join!(
            self.acquirer.resolve(word1),
            self.acquirer.resolve(word2)
        );
        let first = first.map_err(|e| AnalogyError::failed(phase, e))?;

        phase = self.advance(phase);
        let second = second.map_err(|e| AnalogyError::failed(phase, e))?;

        phase = self.advance(phase);
        let combined = op
            .apply(&first.embedding, &second.embedding)
            .map_err(|e| AnalogyError::failed(phase, e))?;

        phase = self.advance(phase);
        let candidates = self
            .vocabulary
            .entries()
            .await
            .map_err(|e| AnalogyError::failed(phase, e))?;

        let ranking = &self.config.ranking;
        let mut options = RankOptions::top_k(ranking.top_k);
        if let Some(min) = ranking.min_similarity {
            options = options.with_min_similarity(min);
        }
        if ranking.same_language_only {
            options = options.with_language(language::detect(word1));
        }
        let exclude: HashSet<String> = [word1, word2].into_iter().map(str::to_string).collect();
        let results = rank_with(&combined, &candidates, &options, &exclude)
            .map_err(|e| AnalogyError::failed(phase, e))?;

        let phase = self.advance(phase);
        debug!("{word1:?} {op} {word2:?}: {} results ({phase})", results.len());
        let degraded = first.is_synthetic() || second.is_synthetic();
        let combined_vector_preview = (ranking.preview_len > 0)
            .then(|| combined.iter().take(ranking.preview_len).copied().collect());

        Ok(OperationResult {
            results,
            combined_vector_preview,
            degraded,
        })
    }

    fn advance(&self, phase: RequestPhase) -> RequestPhase {
        let next = phase.next();
        debug!("Request phase {phase} -> {next}");
        next
    }

    /// Cache size and hit rate, for health reporting.
    pub async fn cache_stats(&self) -> CacheStats {
        self.acquirer.cache().stats().await
    }

    /// Budget counters, for health reporting.
    pub async fn budget_snapshot(&self) -> BudgetSnapshot {
        self.acquirer.budget().snapshot().await
    }

    /// Drop cached embeddings. Call on shutdown.
    pub async fn shutdown(&self) {
        self.acquirer.cache().clear().await;
        info!("Analogy engine shut down");
    }
}

/// Builder for [`AnalogyEngine`].
pub struct AnalogyEngineBuilder {
    config: AnalogyConfig,
    vocabulary: Option<Arc<dyn VocabularySource>>,
    store: Option<Arc<dyn VectorStore>>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    clock: Arc<dyn Clock>,
}

impl AnalogyEngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: AnalogyConfig::default(),
            vocabulary: None,
            store: None,
            provider: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: AnalogyConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the candidate vocabulary.
    pub fn with_vocabulary(mut self, vocabulary: Arc<dyn VocabularySource>) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    /// Set the durable vector store.
    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the external embedding generator.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Drive cache expiry and budget windows from this clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<AnalogyEngine> {
        self.config.validate()?;
        let vocabulary = self
            .vocabulary
            .ok_or_else(|| AnalogyError::Config("no vocabulary configured".to_string()))?;

        let cache = Arc::new(EmbeddingCache::with_clock(
            self.config.cache.clone(),
            self.clock.clone(),
        ));
        let budget = Arc::new(BudgetGuard::with_clock(
            self.config.budget.clone(),
            self.clock,
        ));

        let mut acquirer = EmbeddingAcquirer::new(self.config.acquirer.clone(), cache, budget);
        if let Some(store) = self.store {
            acquirer = acquirer.with_store(store);
        }
        if let Some(provider) = self.provider {
            info!("Using {} embedding provider", provider.name());
            acquirer = acquirer.with_provider(provider);
        }

        info!(
            "Analogy engine ready (dimension {}, tiers {:?})",
            self.config.acquirer.dimension,
            acquirer.tiers()
        );

        Ok(AnalogyEngine {
            config: self.config,
            acquirer,
            vocabulary,
        })
    }
}

impl Default for AnalogyEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wordcalc_embeddings::{AcquirerConfig, StaticVocabulary, VocabularyEntry};

    fn vocabulary() -> Arc<dyn VocabularySource> {
        Arc::new(
            StaticVocabulary::new(vec![
                VocabularyEntry::new("alpha", vec![1.0, 0.0]),
                VocabularyEntry::new("beta", vec![0.0, 1.0]),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_build_requires_vocabulary() {
        let result = AnalogyEngine::builder().build();
        assert!(matches!(result, Err(AnalogyError::Config(_))));
    }

    #[tokio::test]
    async fn test_synthetic_only_engine_is_degraded() {
        let engine = AnalogyEngine::builder()
            .with_config(
                AnalogyConfig::default().with_acquirer(AcquirerConfig::default().with_dimension(2)),
            )
            .with_vocabulary(vocabulary())
            .build()
            .unwrap();

        let result = engine
            .compute_operation("gamma", "delta", Operation::Add)
            .await
            .unwrap();
        assert!(result.degraded);
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.combined_vector_preview.map(|p| p.len()), Some(2));
    }

    #[tokio::test]
    async fn test_invalid_first_word_resolves_nothing() {
        let engine = AnalogyEngine::builder()
            .with_config(
                AnalogyConfig::default().with_acquirer(
                    AcquirerConfig::default()
                        .with_dimension(2)
                        .with_max_text_len(8),
                ),
            )
            .with_vocabulary(vocabulary())
            .build()
            .unwrap();

        let err = engine
            .compute_operation("extraordinarily", "queen", Operation::Add)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.phase(), Some(RequestPhase::ResolvingWord1));

        let stats = engine.cache_stats().await;
        assert_eq!((stats.hits, stats.misses), (0, 0));
    }

    #[tokio::test]
    async fn test_empty_word_fails_in_its_phase() {
        let engine = AnalogyEngine::builder()
            .with_vocabulary(vocabulary())
            .build()
            .unwrap();

        let err = engine
            .compute_operation("king", "  ", Operation::Subtract)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.phase(), Some(RequestPhase::ResolvingWord2));
    }
}

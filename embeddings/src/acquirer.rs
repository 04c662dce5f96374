//! Text → embedding resolution through an ordered fallback chain.
//!
//! ```text
//!   Cache ──miss──► Store ──miss──► Generator ──fail──► Synthetic
//!     │               │                 │                   │
//!    hit             hit ─► cache    success ─► cache,     always
//!                                              store       (non-empty text)
//! ```
//!
//! Each tier either resolves the text or lets the chain continue. Tier
//! failures (store errors, provider errors, timeouts, unusable vectors) are
//! logged and absorbed; an error only reaches the caller when every tier in
//! the chain has been exhausted.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::Embedding;
use crate::budget::{BudgetDecision, BudgetGuard};
use crate::cache::EmbeddingCache;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest};
use crate::similarity::magnitude;
use crate::store::VectorStore;
use crate::synthetic::synthetic_embedding;

/// Configuration for [`EmbeddingAcquirer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquirerConfig {
    /// Dimension every resolved embedding must have.
    pub dimension: usize,

    /// Upper bound for a single store lookup or generator call.
    pub call_timeout_ms: u64,

    /// Whether the synthetic tier ends the chain.
    pub synthetic_fallback: bool,

    /// Longest accepted input, in characters.
    pub max_text_len: usize,
}

impl Default for AcquirerConfig {
    fn default() -> Self {
        Self {
            dimension: crate::DEFAULT_DIMENSION,
            call_timeout_ms: 10_000,
            synthetic_fallback: true,
            max_text_len: 100,
        }
    }
}

impl AcquirerConfig {
    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the collaborator call timeout.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout_ms = u64::try_from(call_timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enable or disable the synthetic fallback tier.
    pub fn with_synthetic_fallback(mut self, enabled: bool) -> Self {
        self.synthetic_fallback = enabled;
        self
    }

    /// Set the maximum input length.
    pub fn with_max_text_len(mut self, max_text_len: usize) -> Self {
        self.max_text_len = max_text_len;
        self
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// One step of the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Cache,
    Store,
    Generator,
    Synthetic,
}

/// Where a resolved embedding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Cache,
    Store,
    Generated,
    Synthetic,
}

/// A resolved embedding and its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub embedding: Embedding,
    pub source: ResolutionSource,
}

impl Resolution {
    /// True when the vector came from the synthetic tier and carries no meaning.
    pub fn is_synthetic(&self) -> bool {
        self.source == ResolutionSource::Synthetic
    }
}

/// Result of [`EmbeddingAcquirer::resolve_all`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResolution {
    /// One embedding per input, in input order.
    pub embeddings: Vec<Embedding>,

    /// Indices that failed and hold a zero vector.
    pub degraded: Vec<usize>,

    /// Indices served by the synthetic tier.
    pub synthetic: Vec<usize>,
}

enum TierOutcome {
    Resolved(Resolution),
    Continue,
    Fail(EmbeddingError),
}

/// What the chain learned while falling through.
#[derive(Default)]
struct ChainTrace {
    budget_block: Option<&'static str>,
    failures: Vec<String>,
}

impl ChainTrace {
    fn note(&mut self, tier: Tier, reason: impl Into<String>) {
        let reason = reason.into();
        debug!("{tier:?} tier passed: {reason}");
        self.failures.push(format!("{tier:?}: {reason}"));
    }
}

/// Resolves text to embeddings via cache, durable store, generator and
/// synthetic fallback, in that order.
pub struct EmbeddingAcquirer {
    config: AcquirerConfig,
    cache: Arc<EmbeddingCache>,
    budget: Arc<BudgetGuard>,
    store: Option<Arc<dyn VectorStore>>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    tiers: Vec<Tier>,
}

impl EmbeddingAcquirer {
    /// Create an acquirer with no store and no generator attached.
    pub fn new(
        config: AcquirerConfig,
        cache: Arc<EmbeddingCache>,
        budget: Arc<BudgetGuard>,
    ) -> Self {
        let mut tiers = vec![Tier::Cache, Tier::Store, Tier::Generator];
        if config.synthetic_fallback {
            tiers.push(Tier::Synthetic);
        }

        Self {
            config,
            cache,
            budget,
            store: None,
            provider: None,
            tiers,
        }
    }

    /// Attach a durable store.
    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach an external generator.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// The fallback chain, in the order it is tried.
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn config(&self) -> &AcquirerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    pub fn budget(&self) -> &Arc<BudgetGuard> {
        &self.budget
    }

    /// Validate `text` and return its normalized key.
    ///
    /// [`resolve`](Self::resolve) runs this first; callers resolving several
    /// texts together can run it up front to fail before spending budget.
    pub fn validate(&self, text: &str) -> Result<String> {
        let key = EmbeddingCache::normalize_key(text);
        if key.is_empty() {
            return Err(EmbeddingError::InvalidInput("text is empty".to_string()));
        }
        let length = key.chars().count();
        if length > self.config.max_text_len {
            return Err(EmbeddingError::InvalidInput(format!(
                "text is {length} characters, max {}",
                self.config.max_text_len
            )));
        }
        Ok(key)
    }

    /// Why a collaborator's vector cannot be used, if it cannot.
    fn unusable(&self, embedding: &[f32]) -> Option<String> {
        if embedding.is_empty() {
            return Some("empty vector".to_string());
        }
        if embedding.len() != self.config.dimension {
            return Some(format!(
                "dimension {} does not match configured {}",
                embedding.len(),
                self.config.dimension
            ));
        }
        if embedding.iter().any(|x| !x.is_finite()) {
            return Some("non-finite component".to_string());
        }
        if magnitude(embedding) == 0.0 {
            return Some("zero vector".to_string());
        }
        None
    }

    /// Resolve `text` to an embedding.
    pub async fn resolve(&self, text: &str) -> Result<Resolution> {
        let key = self.validate(text)?;
        let mut trace = ChainTrace::default();

        for tier in &self.tiers {
            let outcome = match tier {
                Tier::Cache => self.from_cache(&key).await,
                Tier::Store => self.from_store(&key, &mut trace).await,
                Tier::Generator => self.from_generator(&key, &mut trace).await,
                Tier::Synthetic => self.from_synthetic(&key),
            };

            match outcome {
                TierOutcome::Resolved(resolution) => {
                    debug!("Resolved {key:?} from {:?}", resolution.source);
                    return Ok(resolution);
                }
                TierOutcome::Continue => {}
                TierOutcome::Fail(err) => return Err(err),
            }
        }

        if let Some(reason) = trace.budget_block {
            return Err(EmbeddingError::BudgetExceeded(reason.to_string()));
        }
        Err(EmbeddingError::AcquisitionFailed {
            text: key,
            reason: if trace.failures.is_empty() {
                "no tier produced a vector".to_string()
            } else {
                trace.failures.join("; ")
            },
        })
    }

    /// Resolve several texts sequentially.
    ///
    /// A failed item is replaced by a zero vector and its index recorded in
    /// [`BatchResolution::degraded`]; the batch itself never fails.
    pub async fn resolve_all<S: AsRef<str>>(&self, texts: &[S]) -> BatchResolution {
        let mut batch = BatchResolution {
            embeddings: Vec::with_capacity(texts.len()),
            ..Default::default()
        };

        for (index, text) in texts.iter().enumerate() {
            match self.resolve(text.as_ref()).await {
                Ok(resolution) => {
                    if resolution.is_synthetic() {
                        batch.synthetic.push(index);
                    }
                    batch.embeddings.push(resolution.embedding);
                }
                Err(err) => {
                    warn!("Batch item {index} degraded to zero vector: {err}");
                    batch.embeddings.push(vec![0.0; self.config.dimension]);
                    batch.degraded.push(index);
                }
            }
        }

        batch
    }

    async fn from_cache(&self, key: &str) -> TierOutcome {
        match self.cache.get(key).await {
            Some(embedding) => TierOutcome::Resolved(Resolution {
                embedding,
                source: ResolutionSource::Cache,
            }),
            None => TierOutcome::Continue,
        }
    }

    async fn from_store(&self, key: &str, trace: &mut ChainTrace) -> TierOutcome {
        let Some(store) = &self.store else {
            return TierOutcome::Continue;
        };

        let embedding = match timeout(self.config.call_timeout(), store.lookup(key)).await {
            Ok(Ok(Some(embedding))) => embedding,
            Ok(Ok(None)) => return TierOutcome::Continue,
            Ok(Err(err)) => {
                warn!("Store lookup for {key:?} failed: {err}");
                trace.note(Tier::Store, err.to_string());
                return TierOutcome::Continue;
            }
            Err(_) => {
                warn!("Store lookup for {key:?} timed out");
                trace.note(Tier::Store, "lookup timed out");
                return TierOutcome::Continue;
            }
        };

        if let Some(reason) = self.unusable(&embedding) {
            warn!("Ignoring stored vector for {key:?}: {reason}");
            trace.note(Tier::Store, reason);
            return TierOutcome::Continue;
        }

        self.cache.put(key, embedding.clone()).await;
        TierOutcome::Resolved(Resolution {
            embedding,
            source: ResolutionSource::Store,
        })
    }

    async fn from_generator(&self, key: &str, trace: &mut ChainTrace) -> TierOutcome {
        let Some(provider) = &self.provider else {
            trace.note(Tier::Generator, "no generator configured");
            return TierOutcome::Continue;
        };
        if !provider.is_available() {
            trace.note(Tier::Generator, format!("{} is not configured", provider.name()));
            return TierOutcome::Continue;
        }

        match self.budget.allow(self.budget.estimate_cost(key)).await {
            BudgetDecision::Proceed => {}
            BudgetDecision::Reject => {
                trace.budget_block = Some("request rate limit reached");
                trace.note(Tier::Generator, "rate limited");
                return TierOutcome::Continue;
            }
            BudgetDecision::CacheOnly => {
                trace.budget_block = Some("daily budget exhausted");
                trace.note(Tier::Generator, "daily budget exhausted");
                return TierOutcome::Continue;
            }
        }

        let request = EmbeddingRequest::new(key).with_dimensions(self.config.dimension);
        let embedding = match timeout(self.config.call_timeout(), provider.embed(request)).await {
            Ok(Ok(response)) => response.embedding,
            Ok(Err(err)) => {
                warn!("{} failed to embed {key:?}: {err}", provider.name());
                trace.note(Tier::Generator, err.to_string());
                return TierOutcome::Continue;
            }
            Err(_) => {
                warn!("{} timed out embedding {key:?}", provider.name());
                trace.note(
                    Tier::Generator,
                    EmbeddingError::Timeout {
                        operation: "generate",
                        timeout_ms: self.config.call_timeout_ms,
                    }
                    .to_string(),
                );
                return TierOutcome::Continue;
            }
        };

        if let Some(reason) = self.unusable(&embedding) {
            warn!("{} returned unusable vector for {key:?}: {reason}", provider.name());
            trace.note(Tier::Generator, reason);
            return TierOutcome::Continue;
        }

        self.cache.put(key, embedding.clone()).await;
        if let Some(store) = &self.store {
            match timeout(self.config.call_timeout(), store.store(key, &embedding)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("Failed to persist vector for {key:?}: {err}"),
                Err(_) => warn!("Persisting vector for {key:?} timed out"),
            }
        }

        TierOutcome::Resolved(Resolution {
            embedding,
            source: ResolutionSource::Generated,
        })
    }

    fn from_synthetic(&self, key: &str) -> TierOutcome {
        match synthetic_embedding(key, self.config.dimension) {
            Ok(embedding) => {
                warn!("Serving synthetic embedding for {key:?}");
                TierOutcome::Resolved(Resolution {
                    embedding,
                    source: ResolutionSource::Synthetic,
                })
            }
            Err(err) => TierOutcome::Fail(err),
        }
    }
}

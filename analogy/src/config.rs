//! Configuration for the analogy engine.
//!
//! Every section is optional in a config file; missing sections and fields
//! take their defaults.
//!
//! ```toml
//! [cache]
//! ttl_secs = 3600
//! max_entries = 5000
//!
//! [budget]
//! max_requests = 60
//! window_secs = 60
//! daily_budget = 0.5
//!
//! [acquirer]
//! dimension = 384
//! synthetic_fallback = true
//!
//! [ranking]
//! top_k = 5
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use wordcalc_embeddings::{AcquirerConfig, BudgetConfig, CacheConfig};

use crate::error::{AnalogyError, Result};

/// Configuration for the analogy engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalogyConfig {
    /// Embedding cache settings.
    pub cache: CacheConfig,

    /// Generator rate and spend limits.
    pub budget: BudgetConfig,

    /// Fallback chain settings.
    pub acquirer: AcquirerConfig,

    /// Result ranking settings.
    pub ranking: RankingConfig,
}

impl AnalogyConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| AnalogyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&content)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.acquirer.dimension == 0 {
            return Err(AnalogyError::Config(
                "acquirer.dimension must be positive".to_string(),
            ));
        }
        if self.budget.daily_budget < 0.0 {
            return Err(AnalogyError::Config(
                "budget.daily_budget must not be negative".to_string(),
            ));
        }
        if let Some(min) = self.ranking.min_similarity {
            if !(-1.0..=1.0).contains(&min) {
                return Err(AnalogyError::Config(format!(
                    "ranking.min_similarity {min} is outside [-1, 1]"
                )));
            }
        }
        Ok(())
    }

    /// Set the cache configuration.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the budget configuration.
    pub fn with_budget(mut self, budget: BudgetConfig) -> Self {
        self.budget = budget;
        self
    }

    /// Set the acquirer configuration.
    pub fn with_acquirer(mut self, acquirer: AcquirerConfig) -> Self {
        self.acquirer = acquirer;
        self
    }

    /// Set the ranking configuration.
    pub fn with_ranking(mut self, ranking: RankingConfig) -> Self {
        self.ranking = ranking;
        self
    }
}

/// Configuration for result ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Maximum number of results to return.
    pub top_k: usize,

    /// Minimum cosine similarity for a result.
    pub min_similarity: Option<f32>,

    /// How many leading components of the combined vector to return
    /// (0 = none).
    pub preview_len: usize,

    /// Only rank candidates in the first word's detected language.
    pub same_language_only: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_similarity: None,
            preview_len: 8,
            same_language_only: false,
        }
    }
}

impl RankingConfig {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    pub fn with_preview_len(mut self, preview_len: usize) -> Self {
        self.preview_len = preview_len;
        self
    }

    pub fn with_same_language_only(mut self, enabled: bool) -> Self {
        self.same_language_only = enabled;
        self
    }
}

//! # Analogy Engine
//!
//! Word arithmetic on top of `wordcalc-embeddings`: resolve two words to
//! embeddings, add or subtract them, and rank a candidate vocabulary by
//! cosine similarity to the result.
//!
//! ## Request flow
//!
//! ```text
//! Start ─► ResolvingWord1 ─► ResolvingWord2 ─► Combining ─► Ranking ─► Done
//!               │                  │               │            │
//!               └──────────────────┴───────────────┴────────────┴─► Failed
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wordcalc_analogy::{AnalogyConfig, AnalogyEngine, Operation};
//! use wordcalc_embeddings::{OpenAIProvider, StaticVocabulary};
//!
//! let config = AnalogyConfig::load("wordcalc.toml").await?;
//! let vocabulary = StaticVocabulary::load("vocabulary.json").await?;
//!
//! let engine = AnalogyEngine::builder()
//!     .with_config(config)
//!     .with_vocabulary(Arc::new(vocabulary))
//!     .with_provider(Arc::new(OpenAIProvider::new().with_dimensions(384)))
//!     .build()?;
//!
//! let result = engine.compute_operation("king", "man", Operation::Subtract).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod operation;

pub use config::{AnalogyConfig, RankingConfig};
pub use engine::{AnalogyEngine, AnalogyEngineBuilder};
pub use error::{AnalogyError, ErrorKind, Result};
pub use operation::{Operation, OperationResult, RequestPhase};

// Re-export from dependencies for convenience
pub use wordcalc_embeddings::{CacheStats, LanguageTag, RankedResult};

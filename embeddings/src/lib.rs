//! # Embeddings
//!
//! Embedding acquisition and nearest-neighbour ranking for word arithmetic.
//!
//! ## Features
//!
//! - **Vector math**: add, subtract, normalize, cosine/euclidean/manhattan
//! - **Acquisition**: cache → durable store → generator → synthetic fallback
//! - **Budget control**: sliding-window rate limit and daily spend breaker
//! - **Ranking**: exact top-k over a small candidate vocabulary
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embedding Acquirer                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingCache ─► VectorStore ─► EmbeddingProvider ─► Synthetic│
//! │                                        │                        │
//! │                                   BudgetGuard                   │
//! └─────────────────────────────────────────────────────────────────┘
//!            │ Embedding
//!            ▼
//!   similarity::{add, subtract} ──► ranker::rank(VocabularySource)
//! ```

pub mod acquirer;
pub mod budget;
pub mod cache;
pub mod clock;
pub mod error;
pub mod language;
pub mod provider;
pub mod ranker;
pub mod similarity;
pub mod store;
pub mod synthetic;
pub mod vocabulary;

pub use acquirer::{
    AcquirerConfig, BatchResolution, EmbeddingAcquirer, Resolution, ResolutionSource, Tier,
};
pub use budget::{BudgetConfig, BudgetDecision, BudgetGuard, BudgetSnapshot};
pub use cache::{CacheConfig, CacheStats, EmbeddingCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EmbeddingError, Result};
pub use language::LanguageTag;
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider};
pub use ranker::{RankOptions, RankedResult, rank, rank_with};
pub use similarity::cosine_similarity;
pub use store::{JsonFileStore, MemoryVectorStore, VectorStore};
pub use vocabulary::{StaticVocabulary, VocabularyEntry, VocabularySource};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings (all-MiniLM-L6-v2 and shortened text-embedding-3 vectors).
pub const DEFAULT_DIMENSION: usize = 384;

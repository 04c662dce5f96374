//! Errors raised while acquiring, storing and comparing embeddings.

use thiserror::Error;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors from vector math, the acquisition chain and its collaborators.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Two vectors of unequal length were compared or combined.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Rate or spend limit reached and no fallback tier may serve the request.
    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    /// Every tier of the fallback chain was exhausted.
    #[error("acquisition failed for {text:?}: {reason}")]
    AcquisitionFailed { text: String, reason: String },

    /// Empty or oversized input text.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The generator has no credentials.
    #[error("generator has no API key")]
    ProviderNotConfigured,

    /// The generator answered with an error status.
    #[error("generator request failed: {0}")]
    ApiRequest(String),

    /// The generator answered with a body we cannot use.
    #[error("malformed generator response: {0}")]
    InvalidResponse(String),

    /// The generator itself throttled us (HTTP 429).
    #[error("generator throttled, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// A collaborator call did not finish in time.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: &'static str, timeout_ms: u64 },

    /// Durable store error.
    #[error("store error: {0}")]
    Store(String),

    /// Vocabulary could not be loaded.
    #[error("vocabulary error: {0}")]
    Vocabulary(String),

    #[error("json: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Transport failure talking to the generator.
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Shorthand for a dimension check failure.
    pub(crate) fn mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }
}

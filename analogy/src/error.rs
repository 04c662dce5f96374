//! Error types for the analogy engine.

use thiserror::Error;
use wordcalc_embeddings::EmbeddingError;

use crate::operation::RequestPhase;

/// Result type alias for analogy operations.
pub type Result<T> = std::result::Result<T, AnalogyError>;

/// Errors that can occur while computing an operation.
#[derive(Error, Debug)]
pub enum AnalogyError {
    /// Malformed request (empty word, unknown operator).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A request step failed.
    #[error("{phase} failed: {source}")]
    Request {
        phase: RequestPhase,
        #[source]
        source: EmbeddingError,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Caller-facing classification of a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DimensionMismatch,
    BudgetExceeded,
    AcquisitionFailed,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    /// HTTP status a transport layer should answer with.
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::BudgetExceeded => 429,
            Self::AcquisitionFailed => 503,
            Self::DimensionMismatch | Self::Internal => 500,
        }
    }
}

impl AnalogyError {
    pub(crate) fn failed(phase: RequestPhase, source: EmbeddingError) -> Self {
        Self::Request { phase, source }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Request { source, .. } => match source {
                EmbeddingError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
                EmbeddingError::BudgetExceeded(_) => ErrorKind::BudgetExceeded,
                EmbeddingError::AcquisitionFailed { .. } => ErrorKind::AcquisitionFailed,
                EmbeddingError::InvalidInput(_) => ErrorKind::InvalidInput,
                _ => ErrorKind::Internal,
            },
            Self::Config(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// The step a request failed in, if any.
    pub fn phase(&self) -> Option<RequestPhase> {
        match self {
            Self::Request { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// True when the caller sent a bad request.
    pub fn is_client_error(&self) -> bool {
        self.kind() == ErrorKind::InvalidInput
    }
}

use thiserror::Error;

/// Boxed cause carried by collaborator failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(#[source] BoxError),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Failed to read document '{source_id}': {cause}")]
    DocumentRead {
        source_id: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("Generation failed: {0}")]
    GenerationFailed(#[source] BoxError),

    #[error("Vector store error: {0}")]
    Store(#[source] BoxError),
}

impl Error {
    pub fn embedding<E: Into<BoxError>>(cause: E) -> Self {
        Self::EmbeddingUnavailable(cause.into())
    }

    pub fn generation<E: Into<BoxError>>(cause: E) -> Self {
        Self::GenerationFailed(cause.into())
    }

    pub fn store<E: Into<BoxError>>(cause: E) -> Self {
        Self::Store(cause.into())
    }

    /// Structural errors abort a whole batch instead of being reported per document.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_) | Self::DimensionMismatch { .. })
    }

    /// Short, stable name of the error kind for user-facing output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "InvalidConfiguration",
            Self::EmbeddingUnavailable(_) => "EmbeddingUnavailable",
            Self::DimensionMismatch { .. } => "DimensionMismatch",
            Self::DocumentRead { .. } => "DocumentReadError",
            Self::GenerationFailed(_) => "GenerationFailed",
            Self::Store(_) => "StoreError",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use core_types::ErrorKind;
use thiserror::Error;

use crate::embed::EmbeddingError;

pub type Result<T> = std::result::Result<T, SemanticError>;

/// Errors surfaced by index persistence and search.
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("no index has been saved yet")]
    NotFound,
    #[error("persisted index is corrupt: {0}")]
    Corruption(String),
    #[error("embedding dimension mismatch: index has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("index storage {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Provider(#[from] EmbeddingError),
}

impl SemanticError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            SemanticError::Validation(_) => ErrorKind::Validation,
            SemanticError::NotFound => ErrorKind::NotFound,
            SemanticError::Corruption(_) => ErrorKind::Corruption,
            SemanticError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            SemanticError::Storage { .. } => ErrorKind::Storage,
            SemanticError::Provider(_) => ErrorKind::Provider,
        }
    }

    pub(crate) fn storage(context: impl Into<String>, source: std::io::Error) -> Self {
        SemanticError::Storage {
            context: context.into(),
            source,
        }
    }
}

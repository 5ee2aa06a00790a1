//! Semantic log search: persisted embedding index plus exact cosine top-k.
//!
//! The embedding model and the durable medium are capabilities injected by
//! the host ([`EmbeddingProvider`], [`IndexStorage`]); nothing here holds
//! process-wide state.

pub mod embed;
mod engine;
mod error;
mod index;
mod similarity;
pub mod storage;
mod store;

pub use core_serialization::IndexFormat;
pub use embed::{
    EmbeddingError, EmbeddingProvider, HashingEmbedder, HttpEmbedder, HttpEmbedderConfig,
    provider_from_config,
};
pub use engine::{SearchResult, SemanticSearchEngine};
pub use error::{Result, SemanticError};
pub use index::{IndexEntry, VectorIndex};
pub use similarity::cosine_similarity;
pub use storage::{FileIndexStorage, IndexStorage, MemoryIndexStorage};
pub use store::VectorIndexStore;

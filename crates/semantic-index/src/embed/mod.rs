//! Embedding provider capability and the bundled implementations.

mod hashing;
mod http;

pub use hashing::HashingEmbedder;
pub use http::{HttpEmbedder, HttpEmbedderConfig};

use std::sync::Arc;
use std::time::Duration;

use core_types::config::{EmbeddingProviderKind, EmbeddingSection};
use thiserror::Error;

/// Errors raised by an embedding provider. Passed through search untouched.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("cannot embed empty text")]
    EmptyInput,
    #[error("embedding provider misconfigured: {0}")]
    Config(String),
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Text to fixed-length vector. One instance always yields the same dimension.
pub trait EmbeddingProvider: Send + Sync {
    /// Short label for logs and status output.
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Build the provider selected in configuration.
///
/// For the http provider the bearer token is read from the environment
/// variable named by `api_key_env`, when set.
pub fn provider_from_config(
    cfg: &EmbeddingSection,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match cfg.provider {
        EmbeddingProviderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(cfg.dimension)?)),
        EmbeddingProviderKind::Http => {
            let endpoint = cfg
                .endpoint
                .clone()
                .ok_or_else(|| EmbeddingError::Config("http provider needs an endpoint".into()))?;
            let api_key = match &cfg.api_key_env {
                Some(var) => Some(std::env::var(var).map_err(|_| {
                    EmbeddingError::Config(format!("environment variable {var} is not set"))
                })?),
                None => None,
            };
            Ok(Arc::new(HttpEmbedder::new(HttpEmbedderConfig {
                endpoint,
                model: cfg.model.clone(),
                dimension: cfg.dimension,
                api_key,
                timeout: Duration::from_millis(cfg.timeout_ms),
            })?))
        }
    }
}

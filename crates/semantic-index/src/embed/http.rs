use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{EmbeddingError, EmbeddingProvider};

const MAX_ERROR_BODY: usize = 512;

/// Settings for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct HttpEmbedderConfig {
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for HttpEmbedderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedderConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Embedding provider that calls a remote model over HTTP.
///
/// Uses the blocking reqwest client; async hosts must call it from a blocking
/// context (e.g. `tokio::task::spawn_blocking`).
#[derive(Debug)]
pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
    label: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self, EmbeddingError> {
        if config.endpoint.is_empty() {
            return Err(EmbeddingError::Config("endpoint must not be empty".into()));
        }
        if config.dimension == 0 {
            return Err(EmbeddingError::Config("dimension must be > 0".into()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        let label = format!("http:{}", config.model);
        Ok(Self {
            client,
            config,
            label,
        })
    }
}

impl EmbeddingProvider for HttpEmbedder {
    fn name(&self) -> &str {
        &self.label
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut out = self.embed_batch(&[text])?;
        out.pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        let body = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };
        let mut req = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send()?;
        let status = resp.status();
        let bytes = resp.bytes()?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes)
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(batch = texts.len(), model = %self.config.model, "embedded batch over http");
        parse_response(&bytes, texts.len(), self.config.dimension)
    }
}

/// Decode an embeddings response body, restoring request order and checking shape.
fn parse_response(
    body: &[u8],
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut parsed: EmbeddingResponse = serde_json::from_slice(body)
        .map_err(|e| EmbeddingError::InvalidResponse(format!("malformed body: {e}")))?;

    if parsed.data.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            parsed.data.len()
        )));
    }
    // Without indices the response order is the input order.
    if parsed.data.iter().any(|d| d.index.is_some()) {
        parsed.data.sort_by_key(|d| d.index);
        for (pos, d) in parsed.data.iter().enumerate() {
            if d.index != Some(pos) {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "embedding indices are not 0..{expected}: position {pos} has {:?}",
                    d.index
                )));
            }
        }
    }

    parsed
        .data
        .into_iter()
        .map(|d| {
            if d.embedding.len() == dimension {
                Ok(d.embedding)
            } else {
                Err(EmbeddingError::InvalidResponse(format!(
                    "expected {dimension} dimensions, got {}",
                    d.embedding.len()
                )))
            }
        })
        .collect()
}

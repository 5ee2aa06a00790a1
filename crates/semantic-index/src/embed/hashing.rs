use sha2::{Digest, Sha256};

use super::{EmbeddingError, EmbeddingProvider};

const BIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic local embedder based on signed feature hashing.
///
/// Lower-cased alphanumeric tokens and adjacent-token bigrams are hashed with
/// SHA-256 into `dimension` buckets (the top hash bit picks the sign), and the
/// result is L2-normalised. Lexical overlap drives similarity, which is enough
/// for offline use and tests; swap in [`super::HttpEmbedder`] for a real model.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::Config("dimension must be > 0".into()));
        }
        Ok(Self { dimension })
    }

    fn add_feature(&self, acc: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let h = u64::from_le_bytes(head);
        let bucket = (h % self.dimension as u64) as usize;
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        acc[bucket] += sign * weight;
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut acc = vec![0.0f32; self.dimension];
        let tokens = tokenize(trimmed);
        if tokens.is_empty() {
            // punctuation-only input still gets a stable vector
            self.add_feature(&mut acc, trimmed, 1.0);
        }
        for token in &tokens {
            self.add_feature(&mut acc, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut acc, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }

        let norm = acc.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            acc.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;

    #[test]
    fn deterministic_and_normalised() {
        let e = HashingEmbedder::new(64).unwrap();
        let a = e.embed("Payment request took longer than expected").unwrap();
        let b = e.embed("Payment request took longer than expected").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn case_and_punctuation_insensitive() {
        let e = HashingEmbedder::new(128).unwrap();
        let a = e.embed("Login FAILED!").unwrap();
        let b = e.embed("login failed").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shared_words_score_higher() {
        let e = HashingEmbedder::new(256).unwrap();
        let q = e.embed("user login failed").unwrap();
        let close = e.embed("login failed for user admin").unwrap();
        let far = e.embed("disk quota exceeded on volume").unwrap();
        assert!(cosine_similarity(&q, &close) > cosine_similarity(&q, &far));
    }

    #[test]
    fn rejects_empty_and_zero_dimension() {
        let e = HashingEmbedder::new(8).unwrap();
        assert!(matches!(e.embed("   "), Err(EmbeddingError::EmptyInput)));
        assert!(matches!(
            HashingEmbedder::new(0),
            Err(EmbeddingError::Config(_))
        ));
        assert_eq!(e.embed("!!!").unwrap().len(), 8);
    }
}

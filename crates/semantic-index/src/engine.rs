use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::embed::{EmbeddingError, EmbeddingProvider};
use crate::error::{Result, SemanticError};
use crate::index::VectorIndex;
use crate::similarity::cosine_similarity;

/// A ranked hit: the original log text and its cosine score in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub text: String,
    pub score: f32,
}

/// Exact top-k cosine search over an index snapshot.
///
/// Only the query is embedded; entry embeddings are used as stored.
pub struct SemanticSearchEngine {
    provider: Arc<dyn EmbeddingProvider>,
}

impl SemanticSearchEngine {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Embed `query` and return the `top_k` closest entries, best first.
    ///
    /// An empty index yields an empty result without consulting the provider.
    pub fn search(&self, query: &str, top_k: usize, index: &VectorIndex) -> Result<Vec<SearchResult>> {
        let Some(dimension) = index.dimension() else {
            return Ok(Vec::new());
        };
        if query.trim().is_empty() {
            return Err(SemanticError::Validation("query must not be empty".into()));
        }
        if top_k == 0 {
            return Err(SemanticError::Validation("top_k must be at least 1".into()));
        }

        let embedding = self.provider.embed(query)?;
        if embedding.len() != dimension {
            return Err(SemanticError::DimensionMismatch {
                expected: dimension,
                actual: embedding.len(),
            });
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::InvalidResponse(
                "query embedding contains non-finite values".into(),
            )
            .into());
        }

        Ok(rank(&embedding, top_k, index))
    }

    /// Rank against a precomputed query embedding.
    pub fn search_embedding(
        &self,
        embedding: &[f32],
        top_k: usize,
        index: &VectorIndex,
    ) -> Result<Vec<SearchResult>> {
        let Some(dimension) = index.dimension() else {
            return Ok(Vec::new());
        };
        if top_k == 0 {
            return Err(SemanticError::Validation("top_k must be at least 1".into()));
        }
        if embedding.len() != dimension {
            return Err(SemanticError::DimensionMismatch {
                expected: dimension,
                actual: embedding.len(),
            });
        }
        Ok(rank(embedding, top_k, index))
    }
}

impl std::fmt::Debug for SemanticSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticSearchEngine")
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// Score descending, then insertion order ascending: a total order, so the
/// partial selection below yields the same prefix as a stable full sort.
fn by_rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

fn rank(query: &[f32], top_k: usize, index: &VectorIndex) -> Vec<SearchResult> {
    let mut scored: Vec<(usize, f32)> = index
        .iter()
        .enumerate()
        .map(|(pos, entry)| (pos, cosine_similarity(query, entry.embedding())))
        .collect();

    let k = top_k.min(scored.len());
    if k == 0 {
        return Vec::new();
    }
    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, by_rank);
        scored.truncate(k);
    }
    scored.sort_unstable_by(by_rank);

    let entries = index.entries();
    scored
        .into_iter()
        .map(|(pos, score)| SearchResult {
            text: entries[pos].text().to_string(),
            score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashingEmbedder;
    use crate::index::IndexEntry;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    /// Provider with a fixed text -> vector table; counts calls.
    struct TableEmbedder {
        table: HashMap<String, Vec<f32>>,
        dimension: usize,
        calls: AtomicUsize,
    }

    impl TableEmbedder {
        fn new(dimension: usize, rows: &[(&str, Vec<f32>)]) -> Self {
            Self {
                table: rows
                    .iter()
                    .map(|(t, v)| ((*t).to_string(), v.clone()))
                    .collect(),
                dimension,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl EmbeddingProvider for TableEmbedder {
        fn name(&self) -> &str {
            "table"
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.table
                .get(text)
                .cloned()
                .ok_or_else(|| EmbeddingError::InvalidResponse(format!("unknown text {text:?}")))
        }
    }

    fn login_index() -> VectorIndex {
        VectorIndex::new(vec![
            IndexEntry::new("login failed", vec![1.0, 0.0]),
            IndexEntry::new("db timeout", vec![0.0, 1.0]),
            IndexEntry::new("login error", vec![0.9, 0.1]),
        ])
        .unwrap()
    }

    fn engine_with(rows: &[(&str, Vec<f32>)], dimension: usize) -> (SemanticSearchEngine, Arc<TableEmbedder>) {
        let provider = Arc::new(TableEmbedder::new(dimension, rows));
        (SemanticSearchEngine::new(provider.clone()), provider)
    }

    #[test]
    fn ranks_login_example() {
        let (engine, _) = engine_with(&[("why can't users sign in", vec![1.0, 0.0])], 2);
        let hits = engine
            .search("why can't users sign in", 2, &login_index())
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "login failed");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].text, "login error");
        assert!((hits[1].score - 0.993_883_7).abs() < 1e-5);
    }

    #[test]
    fn empty_index_returns_nothing_without_embedding() {
        let (engine, provider) = engine_with(&[], 2);
        for k in [1, 3, 100] {
            assert!(engine.search("anything", k, &VectorIndex::empty()).unwrap().is_empty());
        }
        assert_eq!(provider.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn only_the_query_is_embedded() {
        let (engine, provider) = engine_with(&[("q", vec![0.0, 1.0])], 2);
        engine.search("q", 3, &login_index()).unwrap();
        assert_eq!(provider.calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let (engine, _) = engine_with(&[("q", vec![1.0, 0.0, 0.0])], 3);
        let err = engine.search("q", 1, &login_index()).unwrap_err();
        assert!(matches!(
            err,
            SemanticError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn provider_errors_propagate() {
        let (engine, _) = engine_with(&[], 2);
        let err = engine.search("unmapped", 1, &login_index()).unwrap_err();
        assert!(matches!(
            err,
            SemanticError::Provider(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn invalid_arguments_are_validation_errors() {
        let (engine, _) = engine_with(&[("q", vec![1.0, 0.0])], 2);
        for blank in ["", "  ", "\t\n"] {
            assert!(matches!(
                engine.search(blank, 1, &login_index()),
                Err(SemanticError::Validation(_))
            ));
        }
        assert!(matches!(
            engine.search("q", 0, &login_index()),
            Err(SemanticError::Validation(_))
        ));
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = VectorIndex::new(vec![
            IndexEntry::new("first", vec![2.0, 0.0]),
            IndexEntry::new("other", vec![0.0, 1.0]),
            IndexEntry::new("second", vec![1.0, 0.0]),
            IndexEntry::new("third", vec![0.5, 0.0]),
            IndexEntry::new("zero", vec![0.0, 0.0]),
        ])
        .unwrap();
        let (engine, _) = engine_with(&[], 2);

        let hits = engine.search_embedding(&[3.0, 0.0], 3, &index).unwrap();
        let texts: Vec<_> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);

        // "other" and "zero" both score 0.0; insertion order decides.
        let all = engine.search_embedding(&[3.0, 0.0], 10, &index).unwrap();
        let tail: Vec<_> = all[3..].iter().map(|h| h.text.as_str()).collect();
        assert_eq!(tail, ["other", "zero"]);
    }

    #[test]
    fn underflowing_negative_score_ties_with_zero() {
        let index = VectorIndex::new(vec![
            IndexEntry::new("first", vec![-1e-30, 1.0, 0.0]),
            IndexEntry::new("second", vec![0.0, 1.0, 0.0]),
        ])
        .unwrap();
        let (engine, _) = engine_with(&[("q", vec![1e-30, 0.0, 1.0])], 3);

        let hits = engine.search("q", 2, &index).unwrap();
        let texts: Vec<_> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
        assert_eq!(hits[0].score.to_bits(), hits[1].score.to_bits());
    }

    #[test]
    fn hashing_provider_end_to_end() {
        let embedder = Arc::new(HashingEmbedder::new(128).unwrap());
        let logs = [
            "User authentication failed due to token timeout",
            "Payment request took longer than expected",
            "User profile updated successfully",
        ];
        let entries = logs
            .iter()
            .map(|t| IndexEntry::new(*t, embedder.embed(t).unwrap()))
            .collect();
        let index = VectorIndex::new(entries).unwrap();
        let engine = SemanticSearchEngine::new(embedder);

        let hits = engine
            .search("Payment request took longer than expected", 1, &index)
            .unwrap();
        assert_eq!(hits[0].text, logs[1]);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    fn index_strategy() -> impl Strategy<Value = (VectorIndex, Vec<f32>)> {
        (1usize..6).prop_flat_map(|dim| {
            (
                prop::collection::vec(prop::collection::vec(-10.0f32..10.0, dim), 0..40),
                prop::collection::vec(-10.0f32..10.0, dim),
            )
                .prop_map(|(rows, query)| {
                    let entries = rows
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| IndexEntry::new(format!("log {i}"), v))
                        .collect();
                    (VectorIndex::new(entries).unwrap(), query)
                })
        })
    }

    proptest! {
        #[test]
        fn results_are_bounded_and_sorted((index, query) in index_strategy(), k in 1usize..50) {
            let engine = SemanticSearchEngine::new(Arc::new(HashingEmbedder::new(1).unwrap()));
            let hits = engine.search_embedding(&query, k, &index).unwrap();
            prop_assert_eq!(hits.len(), k.min(index.len()));
            for pair in hits.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            for hit in &hits {
                prop_assert!((-1.0..=1.0).contains(&hit.score));
            }
        }

        #[test]
        fn scale_invariant(v in prop::collection::vec(-10.0f32..10.0, 3), q in prop::collection::vec(-10.0f32..10.0, 3), s in prop_oneof![0.1f32..100.0, -100.0f32..-0.1]) {
            let scaled: Vec<f32> = v.iter().map(|x| x * s).collect();
            let base = cosine_similarity(&q, &v);
            let other = cosine_similarity(&q, &scaled);
            prop_assert!((base - s.signum() * other).abs() < 1e-4);
        }

        #[test]
        fn top_k_matches_full_stable_sort((index, query) in index_strategy(), k in 1usize..50) {
            let engine = SemanticSearchEngine::new(Arc::new(HashingEmbedder::new(1).unwrap()));
            let hits = engine.search_embedding(&query, k, &index).unwrap();

            let mut expected: Vec<(usize, f32)> = index
                .iter()
                .enumerate()
                .map(|(i, e)| (i, cosine_similarity(&query, e.embedding())))
                .collect();
            expected.sort_by(|a, b| b.1.total_cmp(&a.1));
            let expected: Vec<String> = expected
                .into_iter()
                .take(k)
                .map(|(i, _)| index.entries()[i].text().to_string())
                .collect();
            let got: Vec<String> = hits.into_iter().map(|h| h.text).collect();
            prop_assert_eq!(got, expected);
        }
    }
}

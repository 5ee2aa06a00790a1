use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use ipc::{SearchHit, SearchRequest, SearchResponse};
use parking_lot::{Mutex, RwLock};
use semantic_index::{SemanticError, SemanticSearchEngine, VectorIndex, VectorIndexStore};
use tracing::{debug, info};

use crate::status::host_label;

/// Shape of the currently served snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexInfo {
    pub entries: usize,
    pub dimension: Option<usize>,
    pub provider: String,
    pub location: String,
    pub last_reload_ts: Option<i64>,
}

/// Executes search and reload requests coming in over IPC.
///
/// Implementations are called from blocking threads.
pub trait SearchHandler: Send + Sync {
    fn search(&self, req: &SearchRequest) -> Result<SearchResponse, SemanticError>;

    /// Replace the served snapshot with the latest persisted index.
    fn reload(&self) -> Result<IndexInfo, SemanticError>;

    fn info(&self) -> IndexInfo;
}

/// Serves searches from an immutable [`VectorIndex`] snapshot.
///
/// Readers clone the `Arc` under a short read lock and rank without holding
/// it, so a reload never blocks in-flight searches and a search never sees a
/// partially loaded index.
pub struct SemanticSearchHandler {
    engine: SemanticSearchEngine,
    store: VectorIndexStore,
    snapshot: RwLock<Arc<VectorIndex>>,
    last_reload_ts: RwLock<Option<i64>>,
    reload_lock: Mutex<()>,
    max_top_k: usize,
}

impl SemanticSearchHandler {
    /// Starts with an empty snapshot; call [`SearchHandler::reload`] to load.
    pub fn new(engine: SemanticSearchEngine, store: VectorIndexStore, max_top_k: usize) -> Self {
        Self {
            engine,
            store,
            snapshot: RwLock::new(Arc::new(VectorIndex::empty())),
            last_reload_ts: RwLock::new(None),
            reload_lock: Mutex::new(()),
            max_top_k: max_top_k.max(1),
        }
    }

    pub fn snapshot(&self) -> Arc<VectorIndex> {
        self.snapshot.read().clone()
    }
}

impl SearchHandler for SemanticSearchHandler {
    fn search(&self, req: &SearchRequest) -> Result<SearchResponse, SemanticError> {
        let started = Instant::now();
        let index = self.snapshot();
        let top_k = (req.top_k as usize).min(self.max_top_k);

        let results = self.engine.search(&req.query, top_k, &index)?;
        let hits = results
            .into_iter()
            .enumerate()
            .map(|(i, r)| SearchHit {
                rank: i as u32 + 1,
                text: r.text,
                score: r.score,
            })
            .collect::<Vec<_>>();

        let took_ms = started.elapsed().as_millis().min(u32::MAX as u128) as u32;
        debug!(id = %req.id, hits = hits.len(), took_ms, "search served");

        Ok(SearchResponse {
            id: req.id,
            hits,
            total: index.len() as u64,
            took_ms,
            served_by: Some(host_label()),
        })
    }

    fn reload(&self) -> Result<IndexInfo, SemanticError> {
        let _writer = self.reload_lock.lock();
        // load outside the snapshot lock; readers keep the old Arc meanwhile
        let index = self.store.load()?;
        let entries = index.len();
        *self.snapshot.write() = Arc::new(index);
        *self.last_reload_ts.write() = Some(unix_now());
        info!(entries, location = %self.store.location(), "index snapshot reloaded");
        Ok(self.info())
    }

    fn info(&self) -> IndexInfo {
        let index = self.snapshot();
        IndexInfo {
            entries: index.len(),
            dimension: index.dimension(),
            provider: self.engine.provider().name().to_string(),
            location: self.store.location(),
            last_reload_ts: *self.last_reload_ts.read(),
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use semantic_index::{EmbeddingProvider, HashingEmbedder, MemoryIndexStorage};
    use uuid::Uuid;

    fn handler_with(texts: &[&str], max_top_k: usize) -> SemanticSearchHandler {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(64).unwrap());
        let store = VectorIndexStore::new(Arc::new(MemoryIndexStorage::new()));
        if !texts.is_empty() {
            store.save_texts(texts, provider.as_ref(), 8).unwrap();
        }
        SemanticSearchHandler::new(SemanticSearchEngine::new(provider), store, max_top_k)
    }

    fn request(query: &str, top_k: u32) -> SearchRequest {
        SearchRequest {
            id: Uuid::new_v4(),
            query: query.into(),
            top_k,
            timeout_ms: None,
        }
    }

    #[test]
    fn empty_until_reloaded() {
        let handler = handler_with(&["disk quota exceeded on node-3"], 10);
        let resp = handler.search(&request("disk quota", 3)).unwrap();
        assert!(resp.hits.is_empty());
        assert_eq!(resp.total, 0);

        let info = handler.reload().unwrap();
        assert_eq!(info.entries, 1);
        assert_eq!(info.dimension, Some(64));
        assert!(info.last_reload_ts.is_some());

        let resp = handler.search(&request("disk quota", 3)).unwrap();
        assert_eq!(resp.hits.len(), 1);
        assert_eq!(resp.hits[0].rank, 1);
    }

    #[test]
    fn reload_without_index_is_not_found() {
        let handler = handler_with(&[], 10);
        assert!(matches!(handler.reload(), Err(SemanticError::NotFound)));
        assert_eq!(handler.info().entries, 0);
    }

    #[test]
    fn top_k_is_clamped() {
        let handler = handler_with(&["a one", "b two", "c three", "d four"], 2);
        handler.reload().unwrap();
        let resp = handler.search(&request("one", 50)).unwrap();
        assert_eq!(resp.hits.len(), 2);
        assert_eq!(resp.total, 4);
        assert_eq!(resp.hits[1].rank, 2);
    }

    #[test]
    fn in_flight_snapshot_survives_reload() {
        let handler = handler_with(&["payment gateway timeout"], 10);
        handler.reload().unwrap();
        let held = handler.snapshot();

        handler
            .store
            .save_texts(
                &["payment gateway timeout", "cache miss storm"],
                handler.engine.provider(),
                8,
            )
            .unwrap();
        handler.reload().unwrap();

        assert_eq!(held.len(), 1);
        assert_eq!(handler.snapshot().len(), 2);
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let handler = handler_with(&["x"], 10);
        handler.reload().unwrap();
        assert!(matches!(
            handler.search(&request("x", 0)),
            Err(SemanticError::Validation(_))
        ));
    }
}

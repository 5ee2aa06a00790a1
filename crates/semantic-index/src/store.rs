use std::path::PathBuf;
use std::sync::Arc;

use core_serialization::{self as codec, IndexFormat};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::embed::{EmbeddingError, EmbeddingProvider};
use crate::error::{Result, SemanticError};
use crate::index::{self, IndexEntry, VectorIndex};
use crate::storage::{FileIndexStorage, IndexStorage};

/// Saves and loads the whole vector index as one atomically replaced unit.
pub struct VectorIndexStore {
    storage: Arc<dyn IndexStorage>,
    format: IndexFormat,
    write_lock: Mutex<()>,
}

impl VectorIndexStore {
    pub fn new(storage: Arc<dyn IndexStorage>) -> Self {
        Self {
            storage,
            format: IndexFormat::default(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store backed by a single file at `path`.
    pub fn open_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileIndexStorage::new(path)))
    }

    #[must_use]
    pub fn with_format(mut self, format: IndexFormat) -> Self {
        self.format = format;
        self
    }

    pub fn format(&self) -> IndexFormat {
        self.format
    }

    pub fn location(&self) -> String {
        self.storage.describe()
    }

    /// Replace the persisted index with exactly `entries`.
    ///
    /// Validation happens before any byte is written; on any error the
    /// previously saved index stays intact.
    pub fn save(&self, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Err(SemanticError::Validation(
                "cannot save an empty index".into(),
            ));
        }
        let dimension = index::check_entries(entries)
            .map_err(SemanticError::Validation)?
            .unwrap_or_default();

        let file = index::to_file(entries, dimension)?;
        let bytes = codec::encode(&file, self.format)
            .map_err(|e| SemanticError::Validation(format!("encode index: {e}")))?;

        let _guard = self.write_lock.lock();
        self.storage
            .write(&bytes)
            .map_err(|e| SemanticError::storage(format!("write {}", self.location()), e))?;

        info!(
            entries = entries.len(),
            dimension,
            bytes = bytes.len(),
            location = %self.location(),
            "saved vector index"
        );
        Ok(())
    }

    /// Embed `texts` in batches with `provider`, then [`save`](Self::save) them.
    ///
    /// Returns the number of entries written. Provider failures abort before
    /// anything is persisted.
    pub fn save_texts<S: AsRef<str>>(
        &self,
        texts: &[S],
        provider: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> Result<usize> {
        if texts.is_empty() {
            return Err(SemanticError::Validation(
                "cannot index an empty corpus".into(),
            ));
        }
        if batch_size == 0 {
            return Err(SemanticError::Validation("batch size must be > 0".into()));
        }

        let mut entries = Vec::with_capacity(texts.len());
        for (n, chunk) in texts.chunks(batch_size).enumerate() {
            let batch: Vec<&str> = chunk.iter().map(AsRef::as_ref).collect();
            let vectors = provider.embed_batch(&batch)?;
            if vectors.len() != batch.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "provider returned {} embeddings for {} texts",
                    vectors.len(),
                    batch.len()
                ))
                .into());
            }
            entries.extend(
                batch
                    .iter()
                    .zip(vectors)
                    .map(|(text, vector)| IndexEntry::new(*text, vector)),
            );
            debug!(batch = n, embedded = entries.len(), total = texts.len(), "embedded batch");
        }

        self.save(&entries)?;
        Ok(entries.len())
    }

    /// Load the most recently saved index.
    pub fn load(&self) -> Result<VectorIndex> {
        let bytes = self
            .storage
            .read()
            .map_err(|e| SemanticError::storage(format!("read {}", self.location()), e))?
            .ok_or(SemanticError::NotFound)?;

        let file = codec::decode(&bytes).map_err(|e| SemanticError::Corruption(e.to_string()))?;
        let index = VectorIndex::from_file(file)?;
        debug!(
            entries = index.len(),
            dimension = ?index.dimension(),
            location = %self.location(),
            "loaded vector index"
        );
        Ok(index)
    }
}

impl std::fmt::Debug for VectorIndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndexStore")
            .field("location", &self.location())
            .field("format", &self.format)
            .finish()
    }
}

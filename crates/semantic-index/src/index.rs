use core_serialization::{IndexEntryWire, IndexFile};

use crate::error::{Result, SemanticError};

/// One indexed log message and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    text: String,
    embedding: Vec<f32>,
}

impl IndexEntry {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            embedding,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

/// Immutable, ordered snapshot of indexed entries sharing one dimensionality.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimension: Option<usize>,
}

impl VectorIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot, rejecting empty texts, empty or non-finite vectors
    /// and inconsistent dimensionality.
    pub fn new(entries: Vec<IndexEntry>) -> Result<Self> {
        let dimension = check_entries(&entries).map_err(SemanticError::Validation)?;
        Ok(Self { entries, dimension })
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared dimensionality; `None` only for an empty index.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Rebuild from decoded storage. Fails closed: any entry that disagrees with
    /// the declared dimension rejects the whole file.
    pub(crate) fn from_file(file: IndexFile) -> Result<Self> {
        let declared = file.dimension as usize;
        if let Some(pos) = file
            .entries
            .iter()
            .position(|e| e.embedding.len() != declared)
        {
            return Err(SemanticError::Corruption(format!(
                "entry {pos} has {} dimensions, index declares {declared}",
                file.entries[pos].embedding.len()
            )));
        }

        let entries = file
            .entries
            .into_iter()
            .map(|e| IndexEntry::new(e.log, e.embedding))
            .collect();
        Self::new(entries).map_err(|err| match err {
            SemanticError::Validation(msg) => SemanticError::Corruption(msg),
            other => other,
        })
    }
}

impl<'a> IntoIterator for &'a VectorIndex {
    type Item = &'a IndexEntry;
    type IntoIter = std::slice::Iter<'a, IndexEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Wire payload for `entries`; callers validate first.
pub(crate) fn to_file(entries: &[IndexEntry], dimension: usize) -> Result<IndexFile> {
    let dimension = u32::try_from(dimension).map_err(|_| {
        SemanticError::Validation(format!("dimension {dimension} exceeds the format limit"))
    })?;
    let wire = entries
        .iter()
        .map(|e| IndexEntryWire {
            log: e.text.clone(),
            embedding: e.embedding.clone(),
        })
        .collect();
    Ok(IndexFile::new(dimension, wire))
}

/// Returns the shared dimensionality (`None` for no entries) or a description
/// of the first offending entry.
pub(crate) fn check_entries(entries: &[IndexEntry]) -> std::result::Result<Option<usize>, String> {
    let Some(first) = entries.first() else {
        return Ok(None);
    };
    let dimension = first.dimension();
    if dimension == 0 {
        return Err("entry 0 has an empty embedding".into());
    }

    for (pos, entry) in entries.iter().enumerate() {
        if entry.text.trim().is_empty() {
            return Err(format!("entry {pos} has empty text"));
        }
        if entry.dimension() != dimension {
            return Err(format!(
                "entry {pos} has {} dimensions, expected {dimension}",
                entry.dimension()
            ));
        }
        if entry.embedding.iter().any(|v| !v.is_finite()) {
            return Err(format!("entry {pos} has non-finite embedding values"));
        }
    }
    Ok(Some(dimension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_reports_dimension() {
        let index = VectorIndex::new(vec![
            IndexEntry::new("a", vec![1.0, 0.0, 0.0]),
            IndexEntry::new("b", vec![0.0, 1.0, 0.0]),
        ])
        .unwrap();
        assert_eq!(index.dimension(), Some(3));
        assert_eq!(index.len(), 2);
        assert_eq!(VectorIndex::empty().dimension(), None);
    }

    #[test]
    fn new_rejects_bad_entries() {
        let mixed = VectorIndex::new(vec![
            IndexEntry::new("a", vec![1.0, 0.0, 0.0]),
            IndexEntry::new("b", vec![1.0, 0.0]),
        ]);
        assert!(matches!(mixed, Err(SemanticError::Validation(_))));

        let blank = VectorIndex::new(vec![IndexEntry::new("  ", vec![1.0])]);
        assert!(matches!(blank, Err(SemanticError::Validation(_))));

        let nan = VectorIndex::new(vec![IndexEntry::new("x", vec![f32::NAN])]);
        assert!(matches!(nan, Err(SemanticError::Validation(_))));

        let zero_dim = VectorIndex::new(vec![IndexEntry::new("x", vec![])]);
        assert!(matches!(zero_dim, Err(SemanticError::Validation(_))));
    }

    #[test]
    fn from_file_rejects_declared_dimension_drift() {
        let file = IndexFile::new(
            2,
            vec![
                IndexEntryWire {
                    log: "ok".into(),
                    embedding: vec![1.0, 0.0],
                },
                IndexEntryWire {
                    log: "short".into(),
                    embedding: vec![1.0],
                },
            ],
        );
        let err = VectorIndex::from_file(file).unwrap_err();
        assert!(matches!(err, SemanticError::Corruption(_)), "{err}");
    }

    #[test]
    fn from_file_maps_invalid_entries_to_corruption() {
        let file = IndexFile::new(
            1,
            vec![IndexEntryWire {
                log: String::new(),
                embedding: vec![1.0],
            }],
        );
        assert!(matches!(
            VectorIndex::from_file(file),
            Err(SemanticError::Corruption(_))
        ));
    }
}

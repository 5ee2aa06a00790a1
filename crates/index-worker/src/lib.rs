//! Corpus ingestion and index building for the logsight indexer.
//!
//! A corpus is a text file with one log per line. Lines that look like JSON
//! objects are parsed as [`LogEvent`]s; everything else is indexed verbatim.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use core_types::{LogEvent, Severity};
use semantic_index::{EmbeddingProvider, VectorIndexStore};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct CorpusOptions {
    /// Drop structured events below this severity. Plain lines are always kept.
    pub min_level: Option<Severity>,
}

#[derive(Debug, Default)]
pub struct Corpus {
    pub texts: Vec<String>,
    pub structured: usize,
    pub plain: usize,
    /// Blank lines and lines that start like JSON but do not parse.
    pub skipped: usize,
    /// Structured events dropped by `min_level`.
    pub filtered: usize,
    pub severity_counts: BTreeMap<Severity, usize>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Events at ERROR or above among the structured lines that were kept.
    pub fn alerting(&self) -> usize {
        self.severity_counts
            .iter()
            .filter(|(s, _)| s.is_alerting())
            .map(|(_, n)| n)
            .sum()
    }
}

/// Text stored in the index for a structured event.
pub fn document_text(event: &LogEvent) -> String {
    format!("[{}] {}: {}", event.level.as_str(), event.service, event.message.trim())
}

pub fn read_corpus<R: BufRead>(reader: R, opts: &CorpusOptions) -> Result<Corpus> {
    let mut corpus = Corpus::default();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read corpus line {}", n + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            corpus.skipped += 1;
            continue;
        }

        if !trimmed.starts_with('{') {
            corpus.plain += 1;
            corpus.texts.push(trimmed.to_string());
            continue;
        }

        let event = match serde_json::from_str::<LogEvent>(trimmed) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = n + 1, error = %e, "skipping malformed log event");
                corpus.skipped += 1;
                continue;
            }
        };
        if event.message.trim().is_empty() {
            corpus.skipped += 1;
            continue;
        }
        if opts.min_level.is_some_and(|min| event.level < min) {
            corpus.filtered += 1;
            continue;
        }
        corpus.structured += 1;
        *corpus.severity_counts.entry(event.level).or_default() += 1;
        corpus.texts.push(document_text(&event));
    }
    Ok(corpus)
}

pub fn read_corpus_file(path: &Path, opts: &CorpusOptions) -> Result<Corpus> {
    let file = File::open(path).with_context(|| format!("open corpus {}", path.display()))?;
    read_corpus(BufReader::new(file), opts)
}

#[derive(Debug, Clone)]
pub struct IndexReport {
    pub entries: usize,
    pub location: String,
    pub elapsed_ms: u128,
}

/// Embed the corpus and replace the persisted index.
pub fn run_indexing(
    corpus: &Corpus,
    store: &VectorIndexStore,
    provider: &dyn EmbeddingProvider,
    batch_size: usize,
) -> Result<IndexReport> {
    if corpus.is_empty() {
        bail!(
            "corpus has no indexable lines ({} skipped, {} filtered)",
            corpus.skipped,
            corpus.filtered
        );
    }

    let started = Instant::now();
    info!(
        entries = corpus.len(),
        batch_size,
        provider = provider.name(),
        "embedding corpus"
    );
    let entries = store
        .save_texts(corpus.texts.as_slice(), provider, batch_size)
        .context("build index")?;

    Ok(IndexReport {
        entries,
        location: store.location(),
        elapsed_ms: started.elapsed().as_millis(),
    })
}

/// Log the per-severity distribution of the structured part of the corpus.
pub fn log_summary(corpus: &Corpus) {
    info!(
        structured = corpus.structured,
        plain = corpus.plain,
        skipped = corpus.skipped,
        filtered = corpus.filtered,
        alerting = corpus.alerting(),
        "corpus summary"
    );
    for level in Severity::ALL {
        if let Some(count) = corpus.severity_counts.get(&level) {
            info!(level = level.as_str(), count, "severity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semantic_index::HashingEmbedder;
    use std::io::Cursor;

    const MIXED: &str = r#"
{"level":"ERROR","service":"auth-service","message":"User authentication failed due to token timeout","region":"eastus"}
{"level":"WARNING","service":"payment-api","message":"Payment request took longer than expected"}
{"level":"INFO","service":"user-service","message":"User profile updated successfully"}
disk usage at 95% on /var/lib/postgres
{"level":"CRITICAL","service":"orders","message":
{"level":"DEBUG","service":"orders","message":"   "}
"#;

    #[test]
    fn mixed_corpus_is_classified() {
        let corpus = read_corpus(Cursor::new(MIXED), &CorpusOptions::default()).unwrap();
        assert_eq!(corpus.structured, 3);
        assert_eq!(corpus.plain, 1);
        // leading blank line, truncated object, empty message
        assert_eq!(corpus.skipped, 3);
        assert_eq!(corpus.len(), 4);
        assert_eq!(
            corpus.texts[0],
            "[ERROR] auth-service: User authentication failed due to token timeout"
        );
        assert_eq!(corpus.texts[3], "disk usage at 95% on /var/lib/postgres");
        assert_eq!(corpus.alerting(), 1);
    }

    #[test]
    fn min_level_filters_structured_only() {
        let opts = CorpusOptions {
            min_level: Some(Severity::Warning),
        };
        let corpus = read_corpus(Cursor::new(MIXED), &opts).unwrap();
        assert_eq!(corpus.filtered, 1);
        assert_eq!(corpus.structured, 2);
        assert_eq!(corpus.plain, 1);
        assert!(!corpus.severity_counts.contains_key(&Severity::Info));
    }

    #[test]
    fn indexing_writes_searchable_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = VectorIndexStore::open_file(dir.path().join("idx.lsix"));
        let embedder = HashingEmbedder::new(48)?;
        let corpus = read_corpus(Cursor::new(MIXED), &CorpusOptions::default())?;

        let report = run_indexing(&corpus, &store, &embedder, 2)?;
        assert_eq!(report.entries, 4);
        assert_eq!(store.load()?.len(), 4);
        Ok(())
    }

    #[test]
    fn empty_corpus_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorIndexStore::open_file(dir.path().join("idx.lsix"));
        let embedder = HashingEmbedder::new(8).unwrap();
        let corpus = read_corpus(Cursor::new("\n  \n"), &CorpusOptions::default()).unwrap();
        assert!(run_indexing(&corpus, &store, &embedder, 4).is_err());
        assert!(store.load().is_err());
    }
}

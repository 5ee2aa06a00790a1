//! Shared helpers for the logsight CLI: result rendering and error hints.

use console::style;
use core_types::ErrorKind;
use ipc::SearchHit;
use ipc::client::RemoteError;
use semantic_index::{SearchResult, SemanticError};

/// Rank local results the same way the service does.
pub fn hits_from_results(results: Vec<SearchResult>) -> Vec<SearchHit> {
    results
        .into_iter()
        .enumerate()
        .map(|(i, r)| SearchHit {
            rank: i as u32 + 1,
            text: r.text,
            score: r.score,
        })
        .collect()
}

/// One line per hit: rank, score to four places, text.
pub fn render_hits(hits: &[SearchHit]) -> String {
    let mut out = String::new();
    for hit in hits {
        out.push_str(&format!(
            "{:>3}. {} {}\n",
            hit.rank,
            style(format!("{:.4}", hit.score)).green(),
            hit.text
        ));
    }
    out
}

/// Error category of a failure from either the local engine or the service.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    if let Some(e) = err.downcast_ref::<SemanticError>() {
        return Some(e.kind());
    }
    err.downcast_ref::<RemoteError>().map(|e| e.kind)
}

/// Operator-facing line for a failed command, with a remedy when one is known.
pub fn describe_error(err: &anyhow::Error) -> String {
    match error_kind(err).and_then(ErrorKind::hint) {
        Some(hint) => format!("{err:#}\n  hint: {hint}"),
        None => format!("{err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn ranks_start_at_one() {
        let hits = hits_from_results(vec![
            SearchResult {
                text: "a".into(),
                score: 0.9,
            },
            SearchResult {
                text: "b".into(),
                score: 0.5,
            },
        ]);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[1].rank, 2);
        let text = render_hits(&hits);
        assert!(text.contains("0.9000"));
        assert!(text.contains(" b\n"));
    }

    #[test]
    fn not_found_gets_hint_through_context() {
        let err = Err::<(), _>(SemanticError::NotFound)
            .context("load index")
            .unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::NotFound));
        assert!(describe_error(&err).contains("run indexing first"));
    }

    #[test]
    fn remote_dimension_mismatch_gets_hint() {
        let err = anyhow::Error::new(RemoteError {
            kind: ErrorKind::DimensionMismatch,
            message: "index has 384, query has 768".into(),
        });
        assert!(describe_error(&err).contains("different embedding model"));
    }

    #[test]
    fn other_kinds_have_no_hint() {
        let err = anyhow::Error::new(RemoteError {
            kind: ErrorKind::Timeout,
            message: "slow".into(),
        });
        assert!(!describe_error(&err).contains("hint"));
    }
}

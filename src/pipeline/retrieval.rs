//! Evidence retrieval: category-filtered cosine-distance top-K with a
//! deterministic ordering and an unfiltered fallback fill.

use std::cmp::Ordering;

use rusqlite::Connection;
use thiserror::Error;

use super::embedding::EmbeddingModel;
use crate::db::{repository, DatabaseError};
use crate::models::EvidenceDocument;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("evidence store unavailable: {0}")]
    StoreUnavailable(#[from] DatabaseError),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Top-k evidence for a query, category matches first.
///
/// Documents whose category equals `category` (exact match) are ranked by
/// ascending cosine distance to the query embedding; ties break by most
/// recent publication date, then id ascending. If fewer than `k` match the
/// category, the remaining slots are filled from the whole store, same
/// ordering, duplicates excluded. An empty store yields an empty Vec —
/// the caller treats that as a valid empty-context case.
pub fn retrieve(
    query_text: &str,
    category: &str,
    k: usize,
    embedder: &dyn EmbeddingModel,
    conn: &Connection,
) -> Result<Vec<EvidenceDocument>, RetrievalError> {
    if k == 0 {
        return Err(RetrievalError::InvalidQuery("k must be at least 1".into()));
    }
    if query_text.trim().is_empty() {
        return Err(RetrievalError::InvalidQuery(
            "query text must be non-empty".into(),
        ));
    }

    let query_embedding = embedder
        .embed(query_text)
        .map_err(|e| RetrievalError::EmbeddingUnavailable(e.to_string()))?;

    let matched = repository::list_evidence_by_category(conn, category)?;
    let mut selected = rank(matched, &query_embedding);
    selected.truncate(k);

    if selected.len() < k {
        let rest: Vec<EvidenceDocument> = repository::list_all_evidence(conn)?
            .into_iter()
            .filter(|doc| !selected.iter().any(|s| s.id == doc.id))
            .collect();
        let fill = rank(rest, &query_embedding);
        selected.extend(fill.into_iter().take(k - selected.len()));
    }

    tracing::debug!(
        category,
        k,
        returned = selected.len(),
        "evidence retrieval complete"
    );
    Ok(selected)
}

/// Sort by ascending distance, then most recent publication date
/// (undated documents last), then id ascending for determinism.
fn rank(docs: Vec<EvidenceDocument>, query_embedding: &[f32]) -> Vec<EvidenceDocument> {
    let mut scored: Vec<(f32, EvidenceDocument)> = docs
        .into_iter()
        .map(|doc| (cosine_distance(query_embedding, &doc.embedding), doc))
        .collect();

    scored.sort_by(|(da, a), (db, b)| {
        da.partial_cmp(db)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.publication_date.cmp(&a.publication_date))
            .then_with(|| a.id.cmp(&b.id))
    });

    scored.into_iter().map(|(_, doc)| doc).collect()
}

/// Cosine distance in [0, 2]. Mismatched or zero-norm vectors are treated
/// as maximally unrelated rather than erroring.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

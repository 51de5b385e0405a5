//! Evidence store access. Embeddings are persisted as little-endian f32
//! blobs with the dimensionality fixed by `config::EMBEDDING_DIM`.

use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_date_opt, parse_uuid};
use crate::config::EMBEDDING_DIM;
use crate::db::DatabaseError;
use crate::models::enums::EvidenceType;
use crate::models::EvidenceDocument;

pub(crate) fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

pub(crate) fn embedding_from_blob(blob: &[u8]) -> Result<Vec<f32>, DatabaseError> {
    if blob.len() % 4 != 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn check_dimension(embedding: &[f32]) -> Result<(), DatabaseError> {
    if embedding.len() != EMBEDDING_DIM {
        return Err(DatabaseError::EmbeddingDimension {
            expected: EMBEDDING_DIM,
            actual: embedding.len(),
        });
    }
    Ok(())
}

pub fn insert_evidence_document(
    conn: &Connection,
    doc: &EvidenceDocument,
) -> Result<(), DatabaseError> {
    check_dimension(&doc.embedding)?;
    conn.execute(
        "INSERT INTO evidence_documents
         (id, doc_type, category, title, content, embedding, source, publication_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            doc.id.to_string(),
            doc.doc_type.as_str(),
            doc.category,
            doc.title,
            doc.content,
            embedding_to_blob(&doc.embedding),
            doc.source,
            doc.publication_date.map(|d| d.to_string()),
        ],
    )?;
    Ok(())
}

/// Content edits require a matching fresh embedding; everything else on an
/// evidence document is immutable.
pub fn reembed_evidence_document(
    conn: &Connection,
    id: &Uuid,
    content: &str,
    embedding: &[f32],
) -> Result<(), DatabaseError> {
    check_dimension(embedding)?;
    let changed = conn.execute(
        "UPDATE evidence_documents SET content = ?2, embedding = ?3 WHERE id = ?1",
        params![id.to_string(), content, embedding_to_blob(embedding)],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "evidence_document".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn get_evidence_document(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<EvidenceDocument>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, doc_type, category, title, content, embedding, source, publication_date
             FROM evidence_documents WHERE id = ?1",
            params![id.to_string()],
            map_row,
        )
        .optional()?;
    row.map(doc_from_row).transpose()
}

pub fn list_evidence_by_category(
    conn: &Connection,
    category: &str,
) -> Result<Vec<EvidenceDocument>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, doc_type, category, title, content, embedding, source, publication_date
         FROM evidence_documents WHERE category = ?1",
    )?;
    let rows = stmt.query_map(params![category], map_row)?;
    collect_docs(rows)
}

pub fn list_all_evidence(conn: &Connection) -> Result<Vec<EvidenceDocument>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, doc_type, category, title, content, embedding, source, publication_date
         FROM evidence_documents",
    )?;
    let rows = stmt.query_map([], map_row)?;
    collect_docs(rows)
}

type EvidenceRow = (
    String,
    String,
    String,
    String,
    String,
    Vec<u8>,
    String,
    Option<String>,
);

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EvidenceRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn doc_from_row(row: EvidenceRow) -> Result<EvidenceDocument, DatabaseError> {
    let (id, doc_type, category, title, content, blob, source, publication_date) = row;
    Ok(EvidenceDocument {
        id: parse_uuid(&id)?,
        doc_type: EvidenceType::from_str(&doc_type)?,
        category,
        title,
        content,
        embedding: embedding_from_blob(&blob)?,
        source,
        publication_date: parse_date_opt(publication_date),
    })
}

fn collect_docs(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<EvidenceRow>>,
) -> Result<Vec<EvidenceDocument>, DatabaseError> {
    let mut docs = Vec::new();
    for row in rows {
        docs.push(doc_from_row(row?)?);
    }
    Ok(docs)
}

//! The treatment-plan drafting pipeline:
//! authorize → retrieve → compose → generate → persist.

pub mod embedding;
pub mod generate;
pub mod orchestrator;
pub mod prompt;
pub mod retrieval;
pub mod types;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::guard::{AuditWriteError, DenyReason};
use generate::GenerationFailure;
use retrieval::RetrievalError;

/// Failure of a draft request. Each variant corresponds to one pipeline
/// stage, so the caller can decide where to retry from; nothing retries
/// automatically.
#[derive(Error, Debug)]
pub enum DraftError {
    #[error("Authorization denied: {}", .0.as_str())]
    Denied(DenyReason),

    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationFailure),

    #[error(transparent)]
    Audit(#[from] AuditWriteError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl DraftError {
    /// Which stage of the pipeline failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Denied(_) => "authorization",
            Self::Retrieval(_) => "retrieval",
            Self::Generation(_) => "generation",
            Self::Audit(_) => "audit",
            Self::Database(_) => "persistence",
        }
    }
}

//! Caredraft — evidence retrieval and AI-assisted treatment-plan drafting
//! for a therapist-office record system.
//!
//! The crate implements the core of the RAG flow:
//!
//! - [`guard`] — ownership-based access checks with a mandatory audit trail
//! - [`pipeline::retrieval`] — category-filtered vector search over the
//!   evidence store
//! - [`pipeline::prompt`] — deterministic prompt composition
//! - [`pipeline::generate`] — LLM backend client with typed failures
//! - [`pipeline::orchestrator`] — the per-request state machine tying the
//!   steps together
//!
//! Storage (SQLite), the embedding service, and the generation backend are
//! collaborators behind traits; everything request-scoped takes an explicit
//! caller identity and configuration — no ambient state.

pub mod config;
pub mod db;
pub mod guard;
pub mod health;
pub mod models;
pub mod pipeline;

pub use guard::{authorize, AccessVerdict, AuditSink, DenyReason, SqliteAuditSink};
pub use pipeline::orchestrator::DraftPipeline;
pub use pipeline::types::{DraftOutcome, DraftRequest, GenerationConfig};

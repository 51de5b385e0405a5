//! Domain entities persisted by the storage layer.

pub mod enums;

pub use enums::*;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Root of ownership for patients and treatment plans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Therapist {
    pub id: Uuid,
    pub email: String,
    pub credentials: String,
    pub created_at: NaiveDateTime,
}

/// A patient belongs to exactly one therapist; cross-therapist access
/// is forbidden and enforced by the access guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub therapist_id: Uuid,
    pub category: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
}

/// Immutable per-encounter record. Append-only; the repository exposes
/// no update or delete path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionNote {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    pub session_date: NaiveDate,
    pub presenting_problem: String,
    pub narrative: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    pub diagnosis: String,
    pub goals: String,
    pub interventions: String,
    pub modality: String,
    /// Written only by the drafting pipeline, only on a fully persisted run.
    pub ai_generated_recommendations: Option<String>,
    pub status: PlanStatus,
    pub updated_at: NaiveDateTime,
}

/// Reusable, category-scoped treatment-plan skeleton. Office-wide
/// templates are shared across therapists; private ones are scoped to
/// their creator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficeTemplate {
    pub id: Uuid,
    pub category: String,
    pub interventions: String,
    pub is_office_wide: bool,
    pub created_by: Option<Uuid>,
    pub updated_at: NaiveDateTime,
}

/// Clinical reference document with a precomputed embedding.
/// Immutable once stored, except re-embedding on content edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceDocument {
    pub id: Uuid,
    pub doc_type: EvidenceType,
    pub category: String,
    pub title: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub source: String,
    pub publication_date: Option<NaiveDate>,
}

/// An audit event to persist: one per guarded operation, whatever the
/// verdict. `outcome` is `allow`, `deny:not-owner` or `deny:not-found`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub therapist_id: Uuid,
    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub outcome: String,
    pub ip_address: Option<String>,
    pub timestamp: NaiveDateTime,
}

/// One row per guarded operation, including denied attempts.
/// Append-only; never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub therapist_id: Uuid,
    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub outcome: String,
    pub ip_address: Option<String>,
    pub timestamp: NaiveDateTime,
}

/// Provenance record for an AI generation. Holds a one-way hash of the
/// prompt — raw clinical text never enters the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub therapist_id: Uuid,
    pub patient_id: Uuid,
    pub prompt_sha256: String,
    pub timestamp: NaiveDateTime,
}

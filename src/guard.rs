//! Ownership-based access guard with a mandatory audit trail.
//!
//! Every Patient, SessionNote and TreatmentPlan read or write goes through
//! `authorize`: the resource's owning therapist must equal the caller.
//! Default-deny; a denial is a permanent verdict for the request, never
//! retried. One audit entry is written synchronously per guarded operation,
//! including denied attempts — if that write fails, the whole operation
//! fails rather than proceeding unattributed.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{repository, DatabaseError};
use crate::models::enums::{AuditAction, ResourceType};
use crate::models::{AuditEvent, GenerationRecord};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Why an access was denied — for the caller and the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The resource exists but belongs to another therapist.
    NotOwner,
    /// No such resource.
    NotFound,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotOwner => "not-owner",
            Self::NotFound => "not-found",
        }
    }
}

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessVerdict {
    Allow,
    Deny(DenyReason),
}

impl AccessVerdict {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Outcome string persisted in the audit log.
    pub fn outcome(self) -> String {
        match self {
            Self::Allow => "allow".to_string(),
            Self::Deny(reason) => format!("deny:{}", reason.as_str()),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

/// The audit trail could not be written. Fatal to the enclosing
/// operation: no result is exposed without its audit entry.
#[derive(Debug, thiserror::Error)]
#[error("audit write failed: {0}")]
pub struct AuditWriteError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Audit(#[from] AuditWriteError),
}

// ═══════════════════════════════════════════════════════════
// Audit sink
// ═══════════════════════════════════════════════════════════

/// Cross-cutting audit capability. Invoked by the guard and the pipeline
/// orchestrator after every guarded operation; substitutable in tests.
pub trait AuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditWriteError>;
    fn record_generation(&self, record: &GenerationRecord) -> Result<(), AuditWriteError>;
}

/// Audit sink backed by the `audit_log` / `generation_log` tables.
pub struct SqliteAuditSink<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteAuditSink<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl AuditSink for SqliteAuditSink<'_> {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditWriteError> {
        repository::insert_audit_entry(self.conn, event)
            .map_err(|e| AuditWriteError(e.to_string()))
    }

    fn record_generation(&self, record: &GenerationRecord) -> Result<(), AuditWriteError> {
        repository::insert_generation_record(self.conn, record)
            .map_err(|e| AuditWriteError(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════
// Authorization check
// ═══════════════════════════════════════════════════════════

/// Ownership check only — no side effects. `create` actions authorize
/// against the owning parent (the patient id), since a not-yet-existing
/// resource has no owner row.
pub fn authorize(
    conn: &Connection,
    therapist_id: &Uuid,
    resource_type: ResourceType,
    resource_id: &Uuid,
    _action: AuditAction,
) -> Result<AccessVerdict, DatabaseError> {
    let owner = match resource_type {
        ResourceType::Patient => repository::patient_owner(conn, resource_id)?,
        ResourceType::SessionNote => repository::session_note_owner(conn, resource_id)?,
        ResourceType::TreatmentPlan => repository::treatment_plan_owner(conn, resource_id)?,
    };

    match owner {
        None => Ok(AccessVerdict::Deny(DenyReason::NotFound)),
        Some(owner_id) if owner_id == *therapist_id => Ok(AccessVerdict::Allow),
        Some(_) => Ok(AccessVerdict::Deny(DenyReason::NotOwner)),
    }
}

/// Authorize and write the audit entry in one step. The entry is persisted
/// whatever the verdict, before the verdict is returned; an audit failure
/// fails the call.
#[allow(clippy::too_many_arguments)]
pub fn authorize_and_audit<S: AuditSink>(
    conn: &Connection,
    sink: &S,
    therapist_id: &Uuid,
    resource_type: ResourceType,
    resource_id: &Uuid,
    action: AuditAction,
    ip_address: Option<&str>,
    now: NaiveDateTime,
) -> Result<AccessVerdict, GuardError> {
    let verdict = authorize(conn, therapist_id, resource_type, resource_id, action)?;

    if let AccessVerdict::Deny(reason) = verdict {
        tracing::warn!(
            therapist = %therapist_id,
            resource = resource_type.as_str(),
            id = %resource_id,
            reason = reason.as_str(),
            "access denied"
        );
    }

    sink.record(&AuditEvent {
        therapist_id: *therapist_id,
        action,
        resource_type,
        resource_id: *resource_id,
        outcome: verdict.outcome(),
        ip_address: ip_address.map(|s| s.to_string()),
        timestamp: now,
    })?;

    Ok(verdict)
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{
        audit_entries_for_therapist, insert_patient, insert_session_note, insert_therapist,
    };
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Patient, SessionNote, Therapist};
    use chrono::NaiveDate;

    fn seed_therapist(conn: &Connection) -> Uuid {
        let id = Uuid::new_v4();
        insert_therapist(
            conn,
            &Therapist {
                id,
                email: format!("{id}@office.example"),
                credentials: "LMFT".into(),
                created_at: chrono::Local::now().naive_local(),
            },
        )
        .unwrap();
        id
    }

    fn seed_patient(conn: &Connection, therapist_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        insert_patient(
            conn,
            &Patient {
                id,
                therapist_id,
                category: "anxiety".into(),
                first_name: "Ana".into(),
                last_name: "Silva".into(),
                date_of_birth: None,
            },
        )
        .unwrap();
        id
    }

    #[test]
    fn owner_is_allowed() {
        let conn = open_memory_database().unwrap();
        let t1 = seed_therapist(&conn);
        let p1 = seed_patient(&conn, t1);

        let verdict =
            authorize(&conn, &t1, ResourceType::Patient, &p1, AuditAction::View).unwrap();
        assert_eq!(verdict, AccessVerdict::Allow);
    }

    #[test]
    fn cross_therapist_access_always_denied() {
        let conn = open_memory_database().unwrap();
        let t1 = seed_therapist(&conn);
        let t2 = seed_therapist(&conn);
        let p1 = seed_patient(&conn, t1);

        for action in [
            AuditAction::View,
            AuditAction::Create,
            AuditAction::Update,
            AuditAction::Delete,
        ] {
            let verdict = authorize(&conn, &t2, ResourceType::Patient, &p1, action).unwrap();
            assert_eq!(verdict, AccessVerdict::Deny(DenyReason::NotOwner));
        }
    }

    #[test]
    fn missing_resource_is_not_found() {
        let conn = open_memory_database().unwrap();
        let t1 = seed_therapist(&conn);

        let verdict = authorize(
            &conn,
            &t1,
            ResourceType::TreatmentPlan,
            &Uuid::new_v4(),
            AuditAction::View,
        )
        .unwrap();
        assert_eq!(verdict, AccessVerdict::Deny(DenyReason::NotFound));
    }

    #[test]
    fn denied_attempt_still_writes_audit_entry() {
        let conn = open_memory_database().unwrap();
        let t1 = seed_therapist(&conn);
        let t2 = seed_therapist(&conn);
        let p1 = seed_patient(&conn, t1);
        let note = SessionNote {
            id: Uuid::new_v4(),
            patient_id: p1,
            therapist_id: t1,
            session_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            presenting_problem: "Panic".into(),
            narrative: "Narrative".into(),
            created_at: chrono::Local::now().naive_local(),
        };
        insert_session_note(&conn, &note).unwrap();

        // T2 attempts to view T1's session note
        let sink = SqliteAuditSink::new(&conn);
        let verdict = authorize_and_audit(
            &conn,
            &sink,
            &t2,
            ResourceType::SessionNote,
            &note.id,
            AuditAction::View,
            Some("10.0.0.9"),
            chrono::Local::now().naive_local(),
        )
        .unwrap();

        assert_eq!(verdict, AccessVerdict::Deny(DenyReason::NotOwner));

        let entries = audit_entries_for_therapist(&conn, &t2).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::View);
        assert_eq!(entries[0].resource_type, ResourceType::SessionNote);
        assert_eq!(entries[0].resource_id, note.id);
        assert_eq!(entries[0].outcome, "deny:not-owner");
        assert_eq!(entries[0].ip_address.as_deref(), Some("10.0.0.9"));
    }

    #[test]
    fn allowed_access_writes_allow_entry() {
        let conn = open_memory_database().unwrap();
        let t1 = seed_therapist(&conn);
        let p1 = seed_patient(&conn, t1);

        let sink = SqliteAuditSink::new(&conn);
        let verdict = authorize_and_audit(
            &conn,
            &sink,
            &t1,
            ResourceType::Patient,
            &p1,
            AuditAction::Update,
            None,
            chrono::Local::now().naive_local(),
        )
        .unwrap();

        assert!(verdict.is_allowed());
        let entries = audit_entries_for_therapist(&conn, &t1).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, "allow");
    }

    #[test]
    fn audit_failure_fails_the_call() {
        struct FailingSink;
        impl AuditSink for FailingSink {
            fn record(&self, _event: &AuditEvent) -> Result<(), AuditWriteError> {
                Err(AuditWriteError("disk full".into()))
            }
            fn record_generation(
                &self,
                _record: &GenerationRecord,
            ) -> Result<(), AuditWriteError> {
                Err(AuditWriteError("disk full".into()))
            }
        }

        let conn = open_memory_database().unwrap();
        let t1 = seed_therapist(&conn);
        let p1 = seed_patient(&conn, t1);

        let result = authorize_and_audit(
            &conn,
            &FailingSink,
            &t1,
            ResourceType::Patient,
            &p1,
            AuditAction::View,
            None,
            chrono::Local::now().naive_local(),
        );
        assert!(matches!(result, Err(GuardError::Audit(_))));
    }

    #[test]
    fn verdict_outcome_strings() {
        assert_eq!(AccessVerdict::Allow.outcome(), "allow");
        assert_eq!(
            AccessVerdict::Deny(DenyReason::NotOwner).outcome(),
            "deny:not-owner"
        );
        assert_eq!(
            AccessVerdict::Deny(DenyReason::NotFound).outcome(),
            "deny:not-found"
        );
    }
}

//! Append-only audit and generation logs. No update or delete paths by
//! design: compliance traceability requires the trail stay intact.

use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::{AuditAction, ResourceType};
use crate::models::{AuditEvent, AuditLogEntry, GenerationRecord};

/// Persist one audit entry, synchronously. Callers treat a failure here
/// as fatal to the enclosing operation.
pub fn insert_audit_entry(conn: &Connection, event: &AuditEvent) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log
         (therapist_id, action, resource_type, resource_id, outcome, ip_address, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.therapist_id.to_string(),
            event.action.as_str(),
            event.resource_type.as_str(),
            event.resource_id.to_string(),
            event.outcome,
            event.ip_address,
            format_datetime(&event.timestamp),
        ],
    )?;
    Ok(())
}

/// Audit entries for one therapist, most recent first (compliance review).
pub fn audit_entries_for_therapist(
    conn: &Connection,
    therapist_id: &Uuid,
) -> Result<Vec<AuditLogEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, therapist_id, action, resource_type, resource_id, outcome, ip_address, timestamp
         FROM audit_log WHERE therapist_id = ?1 ORDER BY id DESC",
    )?;

    let rows = stmt.query_map(params![therapist_id.to_string()], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, therapist_id, action, resource_type, resource_id, outcome, ip_address, timestamp) =
            row?;
        entries.push(AuditLogEntry {
            id,
            therapist_id: parse_uuid(&therapist_id)?,
            action: AuditAction::from_str(&action)?,
            resource_type: ResourceType::from_str(&resource_type)?,
            resource_id: parse_uuid(&resource_id)?,
            outcome,
            ip_address,
            timestamp: parse_datetime(&timestamp)?,
        });
    }
    Ok(entries)
}

/// Persist the provenance record for one AI generation. Stores only the
/// prompt hash, never raw clinical text.
pub fn insert_generation_record(
    conn: &Connection,
    record: &GenerationRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO generation_log (therapist_id, patient_id, prompt_sha256, timestamp)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            record.therapist_id.to_string(),
            record.patient_id.to_string(),
            record.prompt_sha256,
            format_datetime(&record.timestamp),
        ],
    )?;
    Ok(())
}

pub fn generation_records_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<GenerationRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT therapist_id, patient_id, prompt_sha256, timestamp
         FROM generation_log WHERE patient_id = ?1 ORDER BY id DESC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (therapist_id, patient_id, prompt_sha256, timestamp) = row?;
        records.push(GenerationRecord {
            therapist_id: parse_uuid(&therapist_id)?,
            patient_id: parse_uuid(&patient_id)?,
            prompt_sha256,
            timestamp: parse_datetime(&timestamp)?,
        });
    }
    Ok(records)
}

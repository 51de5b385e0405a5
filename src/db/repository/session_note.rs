//! Session notes are an append-only historical record: this module
//! deliberately exposes no update or delete path.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_datetime, parse_date, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::SessionNote;

pub fn insert_session_note(conn: &Connection, note: &SessionNote) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO session_notes
         (id, patient_id, therapist_id, session_date, presenting_problem, narrative, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            note.id.to_string(),
            note.patient_id.to_string(),
            note.therapist_id.to_string(),
            note.session_date.to_string(),
            note.presenting_problem,
            note.narrative,
            format_datetime(&note.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_session_note(conn: &Connection, id: &Uuid) -> Result<Option<SessionNote>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, patient_id, therapist_id, session_date, presenting_problem, narrative, created_at
             FROM session_notes WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?;

    row.map(note_from_row).transpose()
}

pub fn list_session_notes_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<SessionNote>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, therapist_id, session_date, presenting_problem, narrative, created_at
         FROM session_notes WHERE patient_id = ?1 ORDER BY session_date DESC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut notes = Vec::new();
    for row in rows {
        notes.push(note_from_row(row?)?);
    }
    Ok(notes)
}

/// Owning therapist of a session note, for authorization checks.
pub fn session_note_owner(conn: &Connection, id: &Uuid) -> Result<Option<Uuid>, DatabaseError> {
    let owner = conn
        .query_row(
            "SELECT therapist_id FROM session_notes WHERE id = ?1",
            params![id.to_string()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    owner.map(|s| parse_uuid(&s)).transpose()
}

type NoteRow = (String, String, String, String, String, String, String);

fn note_from_row(row: NoteRow) -> Result<SessionNote, DatabaseError> {
    let (id, patient_id, therapist_id, session_date, presenting_problem, narrative, created_at) =
        row;
    Ok(SessionNote {
        id: parse_uuid(&id)?,
        patient_id: parse_uuid(&patient_id)?,
        therapist_id: parse_uuid(&therapist_id)?,
        session_date: parse_date(&session_date)?,
        presenting_problem,
        narrative,
        created_at: parse_datetime(&created_at)?,
    })
}

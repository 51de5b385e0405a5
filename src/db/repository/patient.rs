use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_date_opt, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Patient;

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, therapist_id, category, first_name, last_name, date_of_birth)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            patient.id.to_string(),
            patient.therapist_id.to_string(),
            patient.category,
            patient.first_name,
            patient.last_name,
            patient.date_of_birth.map(|d| d.to_string()),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, therapist_id, category, first_name, last_name, date_of_birth
             FROM patients WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, therapist_id, category, first_name, last_name, dob)| {
        Ok(Patient {
            id: parse_uuid(&id)?,
            therapist_id: parse_uuid(&therapist_id)?,
            category,
            first_name,
            last_name,
            date_of_birth: parse_date_opt(dob),
        })
    })
    .transpose()
}

pub fn list_patients_for_therapist(
    conn: &Connection,
    therapist_id: &Uuid,
) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, therapist_id, category, first_name, last_name, date_of_birth
         FROM patients WHERE therapist_id = ?1 ORDER BY last_name, first_name",
    )?;

    let rows = stmt.query_map(params![therapist_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    let mut patients = Vec::new();
    for row in rows {
        let (id, therapist_id, category, first_name, last_name, dob) = row?;
        patients.push(Patient {
            id: parse_uuid(&id)?,
            therapist_id: parse_uuid(&therapist_id)?,
            category,
            first_name,
            last_name,
            date_of_birth: parse_date_opt(dob),
        });
    }
    Ok(patients)
}

/// Owning therapist of a patient, for authorization checks.
pub fn patient_owner(conn: &Connection, id: &Uuid) -> Result<Option<Uuid>, DatabaseError> {
    let owner = conn
        .query_row(
            "SELECT therapist_id FROM patients WHERE id = ?1",
            params![id.to_string()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    owner.map(|s| parse_uuid(&s)).transpose()
}

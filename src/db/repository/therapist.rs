use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Therapist;

pub fn insert_therapist(conn: &Connection, therapist: &Therapist) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO therapists (id, email, credentials, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            therapist.id.to_string(),
            therapist.email,
            therapist.credentials,
            format_datetime(&therapist.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_therapist(conn: &Connection, id: &Uuid) -> Result<Option<Therapist>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, email, credentials, created_at FROM therapists WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, email, credentials, created_at)| {
        Ok(Therapist {
            id: parse_uuid(&id)?,
            email,
            credentials,
            created_at: parse_datetime(&created_at)?,
        })
    })
    .transpose()
}

pub fn get_therapist_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<Therapist>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, email, credentials, created_at FROM therapists WHERE email = ?1",
            params![email],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, email, credentials, created_at)| {
        Ok(Therapist {
            id: parse_uuid(&id)?,
            email,
            credentials,
            created_at: parse_datetime(&created_at)?,
        })
    })
    .transpose()
}

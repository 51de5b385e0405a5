use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::OfficeTemplate;

pub fn insert_office_template(
    conn: &Connection,
    template: &OfficeTemplate,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO office_templates (id, category, interventions, is_office_wide, created_by, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            template.id.to_string(),
            template.category,
            template.interventions,
            template.is_office_wide,
            template.created_by.map(|id| id.to_string()),
            format_datetime(&template.updated_at),
        ],
    )?;
    Ok(())
}

/// Templates visible to a therapist for a category: office-wide ones plus
/// the therapist's own private ones. Exact category match.
pub fn templates_for_category(
    conn: &Connection,
    category: &str,
    therapist_id: &Uuid,
) -> Result<Vec<OfficeTemplate>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, category, interventions, is_office_wide, created_by, updated_at
         FROM office_templates
         WHERE category = ?1 AND (is_office_wide = 1 OR created_by = ?2)",
    )?;

    let rows = stmt.query_map(params![category, therapist_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, bool>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut templates = Vec::new();
    for row in rows {
        let (id, category, interventions, is_office_wide, created_by, updated_at) = row?;
        templates.push(OfficeTemplate {
            id: parse_uuid(&id)?,
            category,
            interventions,
            is_office_wide,
            created_by: created_by.map(|s| parse_uuid(&s)).transpose()?,
            updated_at: parse_datetime(&updated_at)?,
        });
    }
    Ok(templates)
}

use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::PlanStatus;
use crate::models::TreatmentPlan;

pub fn insert_treatment_plan(conn: &Connection, plan: &TreatmentPlan) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO treatment_plans
         (id, patient_id, therapist_id, diagnosis, goals, interventions, modality,
          ai_generated_recommendations, status, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            plan.id.to_string(),
            plan.patient_id.to_string(),
            plan.therapist_id.to_string(),
            plan.diagnosis,
            plan.goals,
            plan.interventions,
            plan.modality,
            plan.ai_generated_recommendations,
            plan.status.as_str(),
            format_datetime(&plan.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_treatment_plan(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<TreatmentPlan>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, patient_id, therapist_id, diagnosis, goals, interventions, modality,
                    ai_generated_recommendations, status, updated_at
             FROM treatment_plans WHERE id = ?1",
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
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, String>(9)?,
                ))
            },
        )
        .optional()?;

    row.map(plan_from_row).transpose()
}

pub fn list_treatment_plans_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<TreatmentPlan>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, therapist_id, diagnosis, goals, interventions, modality,
                ai_generated_recommendations, status, updated_at
         FROM treatment_plans WHERE patient_id = ?1 ORDER BY updated_at DESC",
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
            row.get::<_, Option<String>>(7)?,
            row.get::<_, String>(8)?,
            row.get::<_, String>(9)?,
        ))
    })?;

    let mut plans = Vec::new();
    for row in rows {
        plans.push(plan_from_row(row?)?);
    }
    Ok(plans)
}

/// Therapist edit of the clinical fields. Last writer wins; the drafting
/// pipeline never touches these columns.
pub fn update_treatment_plan(conn: &Connection, plan: &TreatmentPlan) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE treatment_plans
         SET diagnosis = ?2, goals = ?3, interventions = ?4, modality = ?5,
             status = ?6, updated_at = ?7
         WHERE id = ?1",
        params![
            plan.id.to_string(),
            plan.diagnosis,
            plan.goals,
            plan.interventions,
            plan.modality,
            plan.status.as_str(),
            format_datetime(&plan.updated_at),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "treatment_plan".into(),
            id: plan.id.to_string(),
        });
    }
    Ok(())
}

/// Write the AI draft. The only column the pipeline mutates; stored
/// verbatim, exactly as the generation backend returned it.
pub fn set_ai_recommendations(
    conn: &Connection,
    plan_id: &Uuid,
    recommendations: &str,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE treatment_plans SET ai_generated_recommendations = ?2 WHERE id = ?1",
        params![plan_id.to_string(), recommendations],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "treatment_plan".into(),
            id: plan_id.to_string(),
        });
    }
    Ok(())
}

/// Owning therapist of a treatment plan, for authorization checks.
pub fn treatment_plan_owner(conn: &Connection, id: &Uuid) -> Result<Option<Uuid>, DatabaseError> {
    let owner = conn
        .query_row(
            "SELECT therapist_id FROM treatment_plans WHERE id = ?1",
            params![id.to_string()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    owner.map(|s| parse_uuid(&s)).transpose()
}

type PlanRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
);

fn plan_from_row(row: PlanRow) -> Result<TreatmentPlan, DatabaseError> {
    let (id, patient_id, therapist_id, diagnosis, goals, interventions, modality, ai, status, updated_at) =
        row;
    Ok(TreatmentPlan {
        id: parse_uuid(&id)?,
        patient_id: parse_uuid(&patient_id)?,
        therapist_id: parse_uuid(&therapist_id)?,
        diagnosis,
        goals,
        interventions,
        modality,
        ai_generated_recommendations: ai,
        status: PlanStatus::from_str(&status)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

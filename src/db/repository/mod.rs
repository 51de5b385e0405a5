//! Repository layer — entity-scoped database operations.
//!
//! All public functions are re-exported here so callers can use
//! `repository::insert_patient` without caring about the sub-module split.

mod audit;
mod evidence;
mod office_template;
mod patient;
mod session_note;
mod therapist;
mod treatment_plan;

pub use audit::*;
pub use evidence::*;
pub use office_template::*;
pub use patient::*;
pub use session_note::*;
pub use therapist::*;
pub use treatment_plan::*;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use super::DatabaseError;

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

pub(crate) fn parse_datetime(s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn parse_date_opt(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

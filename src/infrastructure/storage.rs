use crate::infrastructure::error::InfraError;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use std::path::Path;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Timestamps are stored as RFC 3339 text; a row that fails to parse is a
/// storage-level problem, not a silent default.
pub(crate) fn parse_stored_datetime(
    raw: &str,
    field_name: &str,
) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| {
            InfraError::InvalidConfig(format!("invalid {field_name} '{raw}': {error}"))
        })
}

pub(crate) fn parse_stored_date(raw: &str, field_name: &str) -> Result<NaiveDate, InfraError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|error| {
        InfraError::InvalidConfig(format!("invalid {field_name} '{raw}': {error}"))
    })
}

//! Persistence layer for annals
//!
//! Provides the SQLite handle, schema provisioning and the event repository.

mod database;
mod repository;
mod schema;

pub use database::Database;
pub use repository::{ArtifactWarning, DeleteReport, EventRepository};
pub use schema::{Schema, SCHEMA_VERSION};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;

/// Read an RFC 3339 column written by this crate
pub(crate) fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a `YYYY-MM-DD` column written by this crate
pub(crate) fn parse_date_column(idx: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, crate::event::DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

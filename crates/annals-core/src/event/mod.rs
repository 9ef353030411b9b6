//! Event records: the canonical entity, its partial updates and read views
//!
//! - **record**: the stored entity with list fields already decoded
//! - **update**: sparse overrides applied atomically to a record
//! - **view**: summary/detail projections with authors resolved to usernames

mod record;
mod update;
mod view;

pub use record::{EventRecord, NewEvent};
pub use update::EventUpdate;
pub use view::{EventDetail, EventSummary, UsernameResolver};

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Result, ValidationError};

/// Event identifier (SQLite rowid)
pub type EventId = i64;

/// The single calendar format accepted for event dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

lazy_static! {
    /// Four-digit unsigned year, two-digit month and day. chrono alone also
    /// takes signed, wider and unpadded fields, which break text ordering.
    static ref DATE_SHAPE_RE: Regex = Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap();
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    if !DATE_SHAPE_RE.is_match(value) {
        return Err(ValidationError::InvalidDate(value.to_string()).into());
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(value.to_string()).into())
}

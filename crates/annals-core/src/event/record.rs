use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{parse_date, EventId};
use crate::error::{Result, ValidationError};
use crate::user::UserId;

/// A stored event with `tags`/`images` decoded to sequences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub id: EventId,
    pub title: String,
    /// Rich HTML body
    pub content: String,
    pub date: NaiveDate,
    pub location: String,
    pub tags: Vec<String>,
    pub is_important: bool,
    /// Stored artifact references owned by this event
    pub images: Vec<String>,
    /// Weak reference; may name a user that no longer exists
    pub created_by: Option<UserId>,
    /// Weak reference; may name a user that no longer exists
    pub updated_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub content: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub created_by: UserId,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_important: bool,
    #[serde(default)]
    pub images: Vec<String>,
}

impl NewEvent {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        date: impl Into<String>,
        created_by: UserId,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            date: date.into(),
            created_by,
            location: String::new(),
            tags: Vec::new(),
            is_important: false,
            images: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_images<I, S>(mut self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images = images.into_iter().map(Into::into).collect();
        self
    }

    pub fn important(mut self, is_important: bool) -> Self {
        self.is_important = is_important;
        self
    }

    /// Check the fields that need no lookup and parse the date
    pub fn validate(&self) -> Result<NaiveDate> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title".into()).into());
        }
        parse_date(&self.date)
    }

    /// Build the record that will be stored, before an id is assigned.
    /// `updated_by` starts out equal to `created_by`.
    pub(crate) fn into_record(self, date: NaiveDate, now: DateTime<Utc>) -> EventRecord {
        EventRecord {
            id: 0,
            title: self.title,
            content: self.content,
            date,
            location: self.location,
            tags: self.tags,
            is_important: self.is_important,
            images: self.images,
            created_by: Some(self.created_by),
            updated_by: Some(self.created_by),
            created_at: now,
            updated_at: now,
        }
    }
}

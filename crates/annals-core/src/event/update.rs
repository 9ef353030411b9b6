use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{parse_date, EventRecord};
use crate::error::{Result, ValidationError};
use crate::user::UserId;

/// Sparse overrides for an existing event. Only the fields listed here can
/// change after creation; any other key is rejected on deserialization.
///
/// `tags` and `images` replace the stored sequence wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_important: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<UserId>,
}

impl EventUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no field is overridden
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn images<I, S>(mut self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images = Some(images.into_iter().map(Into::into).collect());
        self
    }

    pub fn important(mut self, is_important: bool) -> Self {
        self.is_important = Some(is_important);
        self
    }

    pub fn updated_by(mut self, user: UserId) -> Self {
        self.updated_by = Some(user);
        self
    }

    /// Merge the overrides into a copy of `record`.
    ///
    /// Every check runs before any field is copied, so on error `record` is
    /// exactly what the caller passed in. Validating `updated_by` against the
    /// user directory is the caller's job.
    pub fn apply_to(&self, record: &EventRecord, now: DateTime<Utc>) -> Result<EventRecord> {
        let date = self.date.as_deref().map(parse_date).transpose()?;
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(ValidationError::MissingField("title".into()).into());
            }
        }

        let mut merged = record.clone();
        if let Some(title) = &self.title {
            merged.title = title.clone();
        }
        if let Some(content) = &self.content {
            merged.content = content.clone();
        }
        if let Some(location) = &self.location {
            merged.location = location.clone();
        }
        if let Some(date) = date {
            merged.date = date;
        }
        if let Some(tags) = &self.tags {
            merged.tags = tags.clone();
        }
        if let Some(images) = &self.images {
            merged.images = images.clone();
        }
        if let Some(is_important) = self.is_important {
            merged.is_important = is_important;
        }
        if let Some(updated_by) = self.updated_by {
            merged.updated_by = Some(updated_by);
        }
        merged.updated_at = now;

        Ok(merged)
    }
}

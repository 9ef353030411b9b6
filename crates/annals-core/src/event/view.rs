use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{EventId, EventRecord};
use crate::error::Result;
use crate::user::{UserDirectory, UserId};

/// An event without its content body, as listed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: EventId,
    pub title: String,
    pub date: NaiveDate,
    pub location: String,
    pub tags: Vec<String>,
    pub is_important: bool,
    pub images: Vec<String>,
    /// Username of the author, or `None` if that user is gone
    pub created_by: Option<String>,
    /// Username of the last editor, or `None` if that user is gone
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An event with its content body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub summary: EventSummary,
    pub content: String,
}

/// Turns author ids into usernames at read time.
///
/// Lookups are cached for the lifetime of the resolver, so rendering a list
/// asks the directory once per distinct author.
pub struct UsernameResolver<'a> {
    users: &'a dyn UserDirectory,
    cache: HashMap<UserId, Option<String>>,
}

impl<'a> UsernameResolver<'a> {
    pub fn new(users: &'a dyn UserDirectory) -> Self {
        Self {
            users,
            cache: HashMap::new(),
        }
    }

    /// Username for `id`; a dangling reference resolves to `None`
    pub fn username(&mut self, id: Option<UserId>) -> Result<Option<String>> {
        let Some(id) = id else {
            return Ok(None);
        };
        if let Some(cached) = self.cache.get(&id) {
            return Ok(cached.clone());
        }
        let name = self.users.get_by_id(id)?.map(|user| user.username);
        self.cache.insert(id, name.clone());
        Ok(name)
    }

    pub fn summary(&mut self, record: &EventRecord) -> Result<EventSummary> {
        Ok(EventSummary {
            id: record.id,
            title: record.title.clone(),
            date: record.date,
            location: record.location.clone(),
            tags: record.tags.clone(),
            is_important: record.is_important,
            images: record.images.clone(),
            created_by: self.username(record.created_by)?,
            updated_by: self.username(record.updated_by)?,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    pub fn detail(&mut self, record: EventRecord) -> Result<EventDetail> {
        let summary = self.summary(&record)?;
        Ok(EventDetail {
            summary,
            content: record.content,
        })
    }
}

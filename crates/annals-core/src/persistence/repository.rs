//! Event repository: CRUD orchestration over the `events` table

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{parse_date_column, parse_timestamp, Database};
use crate::codec::{decode_list, encode_list};
use crate::error::{AnnalsError, Result, ValidationError};
use crate::event::{
    EventDetail, EventId, EventRecord, EventSummary, EventUpdate, NewEvent, UsernameResolver,
    DATE_FORMAT,
};
use crate::media::{MediaStore, Upload};
use crate::reconcile::reconcile;
use crate::user::{UserDirectory, UserId};

const EVENT_COLUMNS: &str = "id, title, content, date, location, created_at, updated_at, \
                             tags, is_important, images, created_by, updated_by";

/// An artifact that could not be removed while deleting its event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactWarning {
    pub path: String,
    pub message: String,
}

/// Outcome of [`EventRepository::delete`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub id: EventId,
    /// Artifacts removed (or already absent)
    pub removed: Vec<String>,
    /// Artifacts left behind; they did not block the delete
    pub warnings: Vec<ArtifactWarning>,
}

/// Creates, edits and deletes events.
///
/// User references are validated through the [`UserDirectory`] before any
/// transaction is opened, and every write commits in a single transaction.
pub struct EventRepository<'a> {
    db: &'a Database,
    users: &'a dyn UserDirectory,
    media: &'a dyn MediaStore,
}

impl<'a> EventRepository<'a> {
    pub fn new(
        db: &'a Database,
        users: &'a dyn UserDirectory,
        media: &'a dyn MediaStore,
    ) -> Self {
        Self { db, users, media }
    }

    /// Create an event. Inline images in the content have nothing to be
    /// matched with and are stripped.
    pub fn create(&self, mut new: NewEvent) -> Result<EventDetail> {
        let date = new.validate()?;
        self.check_user(new.created_by, ValidationError::InvalidCreator)?;

        new.content = reconcile(&new.content, Vec::new()).content;
        let record = self.insert(new.into_record(date, Utc::now()))?;
        UsernameResolver::new(self.users).detail(record)
    }

    /// Create an event whose inline images arrive as separate uploads.
    ///
    /// Uploads are stored in order and matched to inline images in document
    /// order. If any upload is refused, or the event cannot be persisted,
    /// every artifact written by this call is removed again.
    pub fn create_with_uploads(
        &self,
        mut new: NewEvent,
        uploads: Vec<Upload>,
    ) -> Result<EventDetail> {
        let date = new.validate()?;
        self.check_user(new.created_by, ValidationError::InvalidCreator)?;

        let mut written = Vec::with_capacity(uploads.len());
        for upload in &uploads {
            match self.media.save(&upload.bytes, &upload.filename) {
                Ok(path) => written.push(path),
                Err(e) => {
                    self.discard(&written);
                    return Err(e);
                }
            }
        }

        let reconciled = reconcile(&new.content, written.clone());
        tracing::debug!(
            uploads = written.len(),
            rewritten = reconciled.rewritten,
            removed = reconciled.removed,
            "reconciled content"
        );
        new.content = reconciled.content;
        new.images.extend(reconciled.images);

        let record = match self.insert(new.into_record(date, Utc::now())) {
            Ok(record) => record,
            Err(e) => {
                self.discard(&written);
                return Err(e);
            }
        };
        UsernameResolver::new(self.users).detail(record)
    }

    /// Apply sparse overrides to an event. On any error the stored event is
    /// left untouched.
    pub fn update(&self, id: EventId, update: EventUpdate) -> Result<EventDetail> {
        let current = self.load(id)?;
        if let Some(updater) = update.updated_by {
            self.check_user(updater, ValidationError::InvalidUpdater)?;
        }

        let mut merged = update.apply_to(&current, Utc::now())?;
        if update.content.is_some() {
            merged.content = reconcile(&merged.content, Vec::new()).content;
        }

        let rows = self.db.transaction(|tx| {
            Ok(tx.execute(
                "UPDATE events SET title = ?1, content = ?2, date = ?3, location = ?4, \
                 updated_at = ?5, tags = ?6, is_important = ?7, images = ?8, updated_by = ?9 \
                 WHERE id = ?10",
                params![
                    merged.title,
                    merged.content,
                    merged.date.format(DATE_FORMAT).to_string(),
                    merged.location,
                    merged.updated_at.to_rfc3339(),
                    encode_list(&merged.tags),
                    merged.is_important,
                    encode_list(&merged.images),
                    merged.updated_by,
                    id,
                ],
            )?)
        })?;
        if rows == 0 {
            return Err(AnnalsError::event_not_found(id));
        }

        tracing::info!(event_id = id, "updated event");
        UsernameResolver::new(self.users).detail(merged)
    }

    /// Delete an event and, best effort, the artifacts it owns. Artifacts
    /// that cannot be removed are reported, not fatal.
    pub fn delete(&self, id: EventId) -> Result<DeleteReport> {
        let record = self.load(id)?;

        let mut removed = Vec::new();
        let mut warnings = Vec::new();
        for path in record.images {
            match self.media.delete(&path) {
                Ok(()) => removed.push(path),
                Err(e) => {
                    tracing::warn!(event_id = id, path = %path, error = %e, "artifact not removed");
                    warnings.push(ArtifactWarning {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        let rows = self
            .db
            .transaction(|tx| Ok(tx.execute("DELETE FROM events WHERE id = ?1", [id])?))?;
        if rows == 0 {
            return Err(AnnalsError::event_not_found(id));
        }

        tracing::info!(
            event_id = id,
            removed = removed.len(),
            warnings = warnings.len(),
            "deleted event"
        );
        Ok(DeleteReport {
            id,
            removed,
            warnings,
        })
    }

    /// All events, oldest date first
    pub fn list(&self) -> Result<Vec<EventSummary>> {
        let records = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM events ORDER BY date ASC, id ASC",
                EVENT_COLUMNS
            ))?;
            let records = stmt
                .query_map([], Self::row_to_record)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(records)
        })?;

        let mut resolver = UsernameResolver::new(self.users);
        records.iter().map(|r| resolver.summary(r)).collect()
    }

    pub fn get(&self, id: EventId) -> Result<EventDetail> {
        let record = self.load(id)?;
        UsernameResolver::new(self.users).detail(record)
    }

    fn check_user(&self, id: UserId, err: ValidationError) -> Result<()> {
        if self.users.exists(id)? {
            Ok(())
        } else {
            Err(err.into())
        }
    }

    fn load(&self, id: EventId) -> Result<EventRecord> {
        self.db
            .with_conn(|conn| Self::query_record(conn, id))?
            .ok_or_else(|| AnnalsError::event_not_found(id))
    }

    fn insert(&self, mut record: EventRecord) -> Result<EventRecord> {
        let id = self.db.transaction(|tx| {
            tx.execute(
                "INSERT INTO events (title, content, date, location, created_at, updated_at, \
                 tags, is_important, images, created_by, updated_by) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.title,
                    record.content,
                    record.date.format(DATE_FORMAT).to_string(),
                    record.location,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                    encode_list(&record.tags),
                    record.is_important,
                    encode_list(&record.images),
                    record.created_by,
                    record.updated_by,
                ],
            )?;
            Ok(tx.last_insert_rowid())
        })?;

        record.id = id;
        tracing::info!(event_id = id, images = record.images.len(), "created event");
        Ok(record)
    }

    /// Remove artifacts written by a request that is being abandoned
    fn discard(&self, written: &[String]) {
        for path in written {
            if let Err(e) = self.media.delete(path) {
                tracing::warn!(path = %path, error = %e, "rollback left artifact behind");
            }
        }
    }

    fn query_record(conn: &Connection, id: EventId) -> Result<Option<EventRecord>> {
        let sql = format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS);
        Ok(conn
            .query_row(&sql, [id], Self::row_to_record)
            .optional()?)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<EventRecord> {
        let date: String = row.get(3)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;
        let tags: Option<String> = row.get(7)?;
        let images: Option<String> = row.get(9)?;

        Ok(EventRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            date: parse_date_column(3, &date)?,
            location: row.get(4)?,
            created_at: parse_timestamp(5, &created_at)?,
            updated_at: parse_timestamp(6, &updated_at)?,
            tags: decode_list(tags.as_deref()),
            is_important: row.get(8)?,
            images: decode_list(images.as_deref()),
            created_by: row.get(10)?,
            updated_by: row.get(11)?,
        })
    }
}

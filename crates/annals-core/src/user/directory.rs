//! SQLite-backed user directory

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{credential, User, UserDirectory, UserId};
use crate::error::{AnnalsError, Result, ValidationError};
use crate::persistence::{parse_timestamp, Database};

const USER_COLUMNS: &str = "id, username, password, created_at, last_login, is_active";

/// User directory stored in the `users` table of a [`Database`]
pub struct SqliteUserDirectory<'db> {
    db: &'db Database,
}

impl<'db> SqliteUserDirectory<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Register a user with a freshly hashed password
    pub fn create_user(&self, username: &str, password: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ValidationError::MissingField("username".into()).into());
        }
        if password.is_empty() {
            return Err(ValidationError::MissingField("password".into()).into());
        }

        let password_hash = credential::hash_password(password)?;
        let created_at = Utc::now();

        let id = self.db.transaction(|tx| {
            let inserted = tx.execute(
                "INSERT INTO users (username, password, created_at, is_active) VALUES (?1, ?2, ?3, 1)",
                params![username, password_hash, created_at.to_rfc3339()],
            );
            match inserted {
                Ok(_) => Ok(tx.last_insert_rowid()),
                Err(rusqlite::Error::SqliteFailure(ref err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(ValidationError::DuplicateUsername(username.to_string()).into())
                }
                Err(e) => Err(e.into()),
            }
        })?;

        tracing::info!(user_id = id, username, "created user");
        self.get_by_id(id)?
            .ok_or_else(|| AnnalsError::Storage("user missing after insert".into()))
    }

    /// All users ordered by id
    pub fn list(&self) -> Result<Vec<User>> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
            let users = stmt
                .query_map([], Self::row_to_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    /// Stamp a successful login
    pub fn record_login(&self, id: UserId) -> Result<()> {
        let rows = self.db.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE users SET last_login = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id],
            )?)
        })?;
        if rows == 0 {
            return Err(AnnalsError::user_not_found(id));
        }
        Ok(())
    }

    /// Remove a user. Events they authored keep the now dangling id.
    pub fn remove(&self, id: UserId) -> Result<()> {
        let rows = self
            .db
            .with_conn(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])?))?;
        if rows == 0 {
            return Err(AnnalsError::user_not_found(id));
        }
        tracing::info!(user_id = id, "removed user");
        Ok(())
    }

    /// Create the default account when no user exists yet. Returns the new
    /// user, or `None` if the table already had users.
    pub fn ensure_default_admin(&self, username: &str, password: &str) -> Result<Option<User>> {
        let count: i64 = self.db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
        })?;
        if count > 0 {
            return Ok(None);
        }
        self.create_user(username, password).map(Some)
    }

    /// Look the user up, check the password and stamp the login. Inactive
    /// users and wrong passwords both yield `None`.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.find_by_username(username)? else {
            return Ok(None);
        };
        if !user.is_active || !self.verify_credential(&user, password) {
            tracing::debug!(username, "rejected login");
            return Ok(None);
        }
        self.record_login(user.id)?;
        self.get_by_id(user.id)
    }

    fn query_one(conn: &Connection, filter: &str, value: &dyn rusqlite::ToSql) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, filter);
        Ok(conn
            .query_row(&sql, params![value], Self::row_to_user)
            .optional()?)
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let created_at: String = row.get(3)?;
        let last_login: Option<String> = row.get(4)?;

        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            created_at: parse_timestamp(3, &created_at)?,
            last_login: last_login
                .map(|s| parse_timestamp(4, &s))
                .transpose()?,
            is_active: row.get(5)?,
        })
    }
}

impl UserDirectory for SqliteUserDirectory<'_> {
    fn get_by_id(&self, id: UserId) -> Result<Option<User>> {
        self.db.with_conn(|conn| Self::query_one(conn, "id", &id))
    }

    fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.db
            .with_conn(|conn| Self::query_one(conn, "username", &username))
    }

    fn verify_credential(&self, user: &User, plaintext: &str) -> bool {
        credential::verify_password(plaintext, &user.password_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_lookup() {
        let db = Database::in_memory().unwrap();
        let users = SqliteUserDirectory::new(&db);

        let admin = users.create_user("admin", "admin123").unwrap();
        assert_eq!(admin.username, "admin");
        assert!(admin.is_active);
        assert!(admin.last_login.is_none());

        assert_eq!(users.get_by_id(admin.id).unwrap(), Some(admin.clone()));
        assert_eq!(users.find_by_username("admin").unwrap(), Some(admin.clone()));
        assert!(users.find_by_username("nobody").unwrap().is_none());
        assert!(users.exists(admin.id).unwrap());
        assert!(!users.exists(admin.id + 1).unwrap());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let db = Database::in_memory().unwrap();
        let users = SqliteUserDirectory::new(&db);
        users.create_user("aldo", "pw").unwrap();

        let err = users.create_user("aldo", "other").unwrap_err();
        assert!(matches!(
            err,
            AnnalsError::Validation(ValidationError::DuplicateUsername(_))
        ));
        assert_eq!(users.list().unwrap().len(), 1);
    }

    #[test]
    fn test_blank_fields_rejected() {
        let db = Database::in_memory().unwrap();
        let users = SqliteUserDirectory::new(&db);
        assert!(users.create_user("  ", "pw").is_err());
        assert!(users.create_user("aldo", "").is_err());
    }

    #[test]
    fn test_authenticate_records_login() {
        let db = Database::in_memory().unwrap();
        let users = SqliteUserDirectory::new(&db);
        users.create_user("admin", "admin123").unwrap();

        assert!(users.authenticate("admin", "wrong").unwrap().is_none());
        assert!(users.authenticate("ghost", "admin123").unwrap().is_none());

        let user = users.authenticate("admin", "admin123").unwrap().unwrap();
        assert!(user.last_login.is_some());
    }

    #[test]
    fn test_inactive_user_cannot_authenticate() {
        let db = Database::in_memory().unwrap();
        let users = SqliteUserDirectory::new(&db);
        let user = users.create_user("admin", "admin123").unwrap();
        db.with_conn(|conn| {
            Ok(conn.execute("UPDATE users SET is_active = 0 WHERE id = ?1", [user.id])?)
        })
        .unwrap();

        assert!(users.authenticate("admin", "admin123").unwrap().is_none());
    }

    #[test]
    fn test_ensure_default_admin_only_once() {
        let db = Database::in_memory().unwrap();
        let users = SqliteUserDirectory::new(&db);

        assert!(users.ensure_default_admin("admin", "admin123").unwrap().is_some());
        assert!(users.ensure_default_admin("admin", "admin123").unwrap().is_none());
        assert_eq!(users.list().unwrap().len(), 1);
    }

    #[test]
    fn test_remove() {
        let db = Database::in_memory().unwrap();
        let users = SqliteUserDirectory::new(&db);
        let user = users.create_user("temp", "pw").unwrap();

        users.remove(user.id).unwrap();
        assert!(users.get_by_id(user.id).unwrap().is_none());
        assert!(matches!(users.remove(user.id), Err(AnnalsError::NotFound(_))));
    }
}

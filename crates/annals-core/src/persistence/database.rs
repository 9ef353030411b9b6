//! Explicitly owned SQLite handle shared by the repository and user directory

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, Transaction};

use super::schema::{Schema, SCHEMA_VERSION};
use crate::error::{AnnalsError, Result};

/// The backing store. Opened once at process start and passed by reference
/// to everything that reads or writes events and users.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| AnnalsError::Storage(format!("open: {}", e)))?;
        Self::init_with_connection(conn)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AnnalsError::Storage(format!("open_in_memory: {}", e)))?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> Result<Self> {
        Self::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Initialize the database schema
    fn initialize(conn: &Connection) -> Result<()> {
        let current_version = Self::schema_version(conn).unwrap_or(0);

        if current_version == 0 {
            conn.execute_batch(Schema::create_tables())?;
            Self::set_schema_version(conn, SCHEMA_VERSION)?;
        } else if current_version != SCHEMA_VERSION {
            return Err(AnnalsError::Storage(format!(
                "unsupported schema version {} (expected {})",
                current_version, SCHEMA_VERSION
            )));
        }

        Ok(())
    }

    fn schema_version(conn: &Connection) -> Option<u32> {
        conn.query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .ok()
    }

    fn set_schema_version(conn: &Connection, version: u32) -> Result<()> {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AnnalsError::Storage(format!("connection lock poisoned: {}", e)))
    }

    /// Run a read (or single-statement write) against the connection
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits only when `f` succeeds; any
    /// error rolls back every statement `f` executed.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AnnalsError::Storage(format!("begin tx: {}", e)))?;
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| AnnalsError::Storage(format!("commit: {}", e)))?;
        Ok(value)
    }

    /// Current schema version recorded in the database
    pub fn version(&self) -> Result<u32> {
        self.with_conn(|conn| Ok(Self::schema_version(conn).unwrap_or(0)))
    }
}

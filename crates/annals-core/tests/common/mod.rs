//! Shared setup for the repository integration tests

use std::path::PathBuf;

use annals_core::config::MediaConfig;
use annals_core::{Database, LocalMediaStore, SqliteUserDirectory, Upload, UserId};
use tempfile::TempDir;

/// An in-memory database with one user and an upload area in a temp dir
pub struct Fixture {
    pub db: Database,
    pub media: LocalMediaStore,
    pub admin: UserId,
    _dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::in_memory().expect("in-memory database");
        let admin = SqliteUserDirectory::new(&db)
            .create_user("admin", "admin123")
            .expect("seed admin")
            .id;
        let media = LocalMediaStore::new(&MediaConfig {
            upload_dir: dir.path().join("uploads"),
            ..MediaConfig::default()
        });
        Self {
            db,
            media,
            admin,
            _dir: dir,
        }
    }

    pub fn users(&self) -> SqliteUserDirectory<'_> {
        SqliteUserDirectory::new(&self.db)
    }

    /// File backing a stored reference
    pub fn file_for(&self, stored: &str) -> PathBuf {
        let name = stored
            .strip_prefix(self.media.url_prefix())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or_else(|| panic!("not a managed path: {}", stored));
        self.media.root().join(name)
    }

    /// Number of files currently in the upload area
    #[allow(dead_code)]
    pub fn stored_files(&self) -> usize {
        match std::fs::read_dir(self.media.root()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

/// `<img>` with an inline PNG source
#[allow(dead_code)]
pub fn inline_img() -> &'static str {
    r#"<img src="data:image/png;base64,AAA">"#
}

#[allow(dead_code)]
pub fn png(name: &str) -> Upload {
    Upload::new(b"\x89PNG\r\n\x1a\n".to_vec(), name)
}

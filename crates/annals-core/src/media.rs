//! Media store adapter: uploaded image artifacts on the local filesystem

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::MediaConfig;
use crate::error::{AnnalsError, Result, ValidationError};

/// Persists uploaded blobs and removes them again.
pub trait MediaStore: Send + Sync {
    /// Store `bytes` under a fresh unique name derived from
    /// `declared_filename`. Returns the stable reference to embed in content.
    fn save(&self, bytes: &[u8], declared_filename: &str) -> Result<String>;

    /// Remove a previously stored artifact. An artifact that is already gone
    /// counts as removed.
    fn delete(&self, stored_path: &str) -> Result<()>;
}

/// A file uploaded with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub filename: String,
}

impl Upload {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
        }
    }
}

/// Media store writing into a single upload directory
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    url_prefix: String,
    allowed_extensions: Vec<String>,
}

impl LocalMediaStore {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: config.upload_dir.clone(),
            url_prefix: config.url_prefix.trim_end_matches('/').to_string(),
            allowed_extensions: config.allowed_extensions.clone(),
        }
    }

    /// Directory artifacts are written to
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Prefix of every reference this store hands out
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Whether `filename` carries an allowed extension
    pub fn is_allowed(&self, filename: &str) -> bool {
        extension(filename)
            .map(|ext| self.allowed_extensions.iter().any(|a| *a == ext))
            .unwrap_or(false)
    }

    /// Map a stored reference back to its file, refusing anything outside
    /// the upload directory.
    fn resolve(&self, stored_path: &str) -> Result<PathBuf> {
        let name = stored_path
            .strip_prefix(&self.url_prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| {
                AnnalsError::Io(format!("not a managed upload: {}", stored_path))
            })?;

        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
            || name.chars().any(char::is_control)
        {
            return Err(AnnalsError::Io(format!(
                "not a managed upload: {}",
                stored_path
            )));
        }

        Ok(self.root.join(name))
    }
}

impl MediaStore for LocalMediaStore {
    fn save(&self, bytes: &[u8], declared_filename: &str) -> Result<String> {
        if !self.is_allowed(declared_filename) {
            return Err(ValidationError::DisallowedExtension(declared_filename.to_string()).into());
        }

        std::fs::create_dir_all(&self.root)?;

        let name = format!(
            "{}_{}",
            Uuid::new_v4().simple(),
            sanitize_filename(declared_filename)
        );
        std::fs::write(self.root.join(&name), bytes)?;

        let stored = format!("{}/{}", self.url_prefix, name);
        tracing::debug!(path = %stored, size = bytes.len(), "stored upload");
        Ok(stored)
    }

    fn delete(&self, stored_path: &str) -> Result<()> {
        let file = self.resolve(stored_path)?;
        match std::fs::remove_file(&file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(AnnalsError::Io(format!("remove {}: {}", file.display(), e))),
        }
    }
}

/// Lower-cased text after the last `.`, if any
fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Reduce a client-supplied name to a safe single path component:
/// separators become spaces, only ASCII alphanumerics and `._-` survive,
/// whitespace runs become `_`, and leading/trailing `._` are stripped.
/// A result that lost its stem or its extension becomes `upload.<ext>`.
pub fn sanitize_filename(filename: &str) -> String {
    let spaced: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(*c, '.' | '-' | '_'))
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    let trimmed = joined.trim_matches(|c: char| c == '.' || c == '_');
    let ext = extension(filename)
        .map(|ext| sanitize_extension(&ext))
        .filter(|ext| !ext.is_empty());

    match ext {
        Some(ext) => {
            let keeps_extension = trimmed
                .rsplit_once('.')
                .is_some_and(|(stem, tail)| !stem.is_empty() && tail.eq_ignore_ascii_case(&ext));
            if keeps_extension {
                trimmed.to_string()
            } else {
                format!("upload.{}", ext)
            }
        }
        None if trimmed.is_empty() => "upload".to_string(),
        None => trimmed.to_string(),
    }
}

fn sanitize_extension(ext: &str) -> String {
    ext.chars().filter(char::is_ascii_alphanumeric).collect()
}

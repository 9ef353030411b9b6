//! Users and the directory that resolves them
//!
//! Events reference users only by id. The directory is the single place that
//! turns those ids back into users, so a reference to a removed user simply
//! resolves to nothing.

mod credential;
mod directory;

pub use credential::{hash_password, verify_password};
pub use directory::SqliteUserDirectory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// User identifier (SQLite rowid)
pub type UserId = i64;

/// An account able to author events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Opaque argon2 PHC string
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Public projection of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }
}

/// Identity lookup consumed by the event repository
pub trait UserDirectory: Send + Sync {
    /// Look a user up by id
    fn get_by_id(&self, id: UserId) -> Result<Option<User>>;

    /// Look a user up by username
    fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Check a plaintext password against the user's stored credential
    fn verify_credential(&self, user: &User, plaintext: &str) -> bool;

    /// Whether `id` names an existing user
    fn exists(&self, id: UserId) -> Result<bool> {
        Ok(self.get_by_id(id)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_omits_credential() {
        let user = User {
            id: 1,
            username: "admin".into(),
            password_hash: "$argon2id$secret".into(),
            created_at: Utc::now(),
            last_login: None,
            is_active: true,
        };
        let json = serde_json::to_string(&user.profile()).unwrap();
        assert!(json.contains("\"username\":\"admin\""));
        assert!(!json.contains("argon2"));
    }
}

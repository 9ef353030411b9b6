//! Annals Core - Historical event records with reconciled inline media
//!
//! This crate provides the core functionality behind the annals chronicle:
//!
//! - **Event**: Canonical event record, sparse updates and summary/detail views
//! - **Codec**: Comma-joined storage encoding of the tag and image lists
//! - **Reconcile**: Matching of inline `data:` images to uploaded artifacts
//! - **Media**: Upload area adapter (unique names, extension allow-list)
//! - **User**: User directory with argon2 credentials
//! - **Persistence**: SQLite handle, schema and the event repository
//! - **Config**: Database, media, server and bootstrap settings
//!
//! # Flow
//!
//! ```text
//! uploads → MediaStore → reconcile → NewEvent/EventUpdate → EventRepository
//! ```
//!
//! Events reference their authors weakly: removing a user never removes or
//! blocks their events, whose views then show no author.

pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod media;
pub mod persistence;
pub mod reconcile;
pub mod user;

pub use codec::{decode_list, encode_list};
pub use config::{AnnalsConfig, BootstrapConfig, DatabaseConfig, MediaConfig, ServerConfig};
pub use error::{AnnalsError, ErrorKind, Result, ValidationError};
pub use event::{EventDetail, EventId, EventRecord, EventSummary, EventUpdate, NewEvent};
pub use media::{LocalMediaStore, MediaStore, Upload};
pub use persistence::{ArtifactWarning, Database, DeleteReport, EventRepository};
pub use reconcile::{reconcile, Reconciled};
pub use user::{SqliteUserDirectory, User, UserDirectory, UserId, UserProfile};

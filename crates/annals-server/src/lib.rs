//! Annals Server - HTTP boundary for the annals chronicle
//!
//! JSON endpoints for events and users, multipart event creation with
//! image uploads, and static serving of the upload area.

pub mod error;
pub mod http;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use annals_core::{
    AnnalsConfig, AnnalsError, Database, EventRepository, LocalMediaStore, SqliteUserDirectory,
    User,
};

pub use error::ApiError;

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub media: LocalMediaStore,
    pub config: AnnalsConfig,
}

impl AppState {
    /// Open the configured database and upload area
    pub fn new(config: AnnalsConfig) -> Result<Self, AnnalsError> {
        let db = Database::open(&config.database.path)?;
        tracing::info!("Opened database at {:?}", config.database.path);
        Ok(Self::with_database(db, config))
    }

    /// Use an already opened database
    pub fn with_database(db: Database, config: AnnalsConfig) -> Self {
        let media = LocalMediaStore::new(&config.media);
        Self { db, media, config }
    }

    pub fn users(&self) -> SqliteUserDirectory<'_> {
        SqliteUserDirectory::new(&self.db)
    }

    /// Run `f` against an event repository over this state
    pub fn with_events<T>(
        &self,
        f: impl FnOnce(&EventRepository<'_>) -> annals_core::Result<T>,
    ) -> annals_core::Result<T> {
        let users = self.users();
        let repo = EventRepository::new(&self.db, &users, &self.media);
        f(&repo)
    }

    /// Seed the bootstrap account on an empty user table
    pub fn bootstrap(&self) -> Result<Option<User>, AnnalsError> {
        let bootstrap = &self.config.bootstrap;
        let created = self
            .users()
            .ensure_default_admin(&bootstrap.admin_username, &bootstrap.admin_password)?;
        if let Some(user) = &created {
            tracing::info!("Created default user {:?}", user.username);
        }
        Ok(created)
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let uploads = ServeDir::new(&state.config.media.upload_dir);
    let url_prefix = state.media.url_prefix().to_string();
    let body_limit = state.config.media.max_upload_bytes;

    Router::new()
        // Users
        .route("/login", post(http::login))
        .route("/users", get(http::list_users))
        // Events
        .route("/events", get(http::list_events).post(http::create_event))
        .route(
            "/events/{id}",
            get(http::get_event)
                .put(http::update_event)
                .delete(http::delete_event),
        )
        // Uploads
        .route("/api/events", post(http::create_event_with_images))
        .route("/upload-image", post(http::upload_image))
        .nest_service(&url_prefix, uploads)
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the server
pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Annals server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use annals_core::{
    decode_list, DeleteReport, EventDetail, EventId, EventSummary, EventUpdate, MediaStore,
    NewEvent, Upload, UserProfile, ValidationError,
};

use crate::error::ApiError;
use crate::AppState;

/// Run blocking core work (SQLite, argon2, file writes) off the async runtime
async fn run<T, F>(state: &Arc<AppState>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppState) -> annals_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| ApiError::Internal(format!("worker failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub user: UserProfile,
}

/// Check credentials and stamp the login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload?;

    let user = run(&state, move |s| {
        s.users()
            .authenticate(&request.username, &request.password)
    })
    .await?
    .ok_or_else(|| ApiError::Unauthorized("invalid username or password".into()))?;

    Ok(Json(LoginResponse {
        success: true,
        message: "login successful".into(),
        user: user.profile(),
    }))
}

/// List all users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let users = run(&state, |s| s.users().list()).await?;
    Ok(Json(users.iter().map(|u| u.profile()).collect()))
}

/// Response carrying a single event
#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    pub success: bool,
    pub message: String,
    pub event: EventDetail,
}

impl EventResponse {
    fn new(message: &str, event: EventDetail) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            event,
        }
    }
}

/// Response to a delete
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub report: DeleteReport,
}

/// List events, oldest first
pub async fn list_events(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EventSummary>>, ApiError> {
    let events = run(&state, |s| s.with_events(|repo| repo.list())).await?;
    Ok(Json(events))
}

/// Create an event from a JSON body
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<EventResponse>), ApiError> {
    let Json(new) = payload?;
    let event = run(&state, move |s| s.with_events(|repo| repo.create(new))).await?;
    Ok((
        StatusCode::CREATED,
        Json(EventResponse::new("event created", event)),
    ))
}

/// Get one event with its content
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EventId>,
) -> Result<Json<EventDetail>, ApiError> {
    let event = run(&state, move |s| s.with_events(|repo| repo.get(id))).await?;
    Ok(Json(event))
}

/// Apply sparse overrides to an event
pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EventId>,
    payload: Result<Json<EventUpdate>, JsonRejection>,
) -> Result<Json<EventResponse>, ApiError> {
    let Json(update) = payload?;
    let event = run(&state, move |s| s.with_events(|repo| repo.update(id, update))).await?;
    Ok(Json(EventResponse::new("event updated", event)))
}

/// Delete an event and its artifacts
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EventId>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let report = run(&state, move |s| s.with_events(|repo| repo.delete(id))).await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "event deleted".into(),
        report,
    }))
}

/// Text fields and files of a multipart event submission
#[derive(Debug, Default)]
struct EventForm {
    title: Option<String>,
    content: Option<String>,
    date: Option<String>,
    location: Option<String>,
    tags: Option<String>,
    is_important: Option<String>,
    created_by: Option<String>,
    uploads: Vec<Upload>,
}

impl EventForm {
    async fn read(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "images" {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                // An empty file input still sends a part
                if filename.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.uploads.push(Upload::new(bytes.to_vec(), filename));
                continue;
            }

            let value = field.text().await?;
            match name.as_str() {
                "title" => form.title = Some(value),
                "content" => form.content = Some(value),
                "date" => form.date = Some(value),
                "location" => form.location = Some(value),
                "tags" => form.tags = Some(value),
                "is_important" => form.is_important = Some(value),
                "created_by" => form.created_by = Some(value),
                other => tracing::debug!(field = other, "ignoring form field"),
            }
        }
        Ok(form)
    }

    fn into_parts(self) -> Result<(NewEvent, Vec<Upload>), ValidationError> {
        let required = |value: Option<String>, field: &str| {
            value.ok_or_else(|| ValidationError::MissingField(field.to_string()))
        };

        let created_by = required(self.created_by, "created_by")?;
        let created_by = created_by
            .trim()
            .parse::<i64>()
            .map_err(|_| ValidationError::InvalidValue {
                field: "created_by".into(),
                reason: format!("{:?} is not a user id", created_by),
            })?;

        let new = NewEvent::new(
            required(self.title, "title")?,
            required(self.content, "content")?,
            required(self.date, "date")?,
            created_by,
        )
        .with_location(self.location.unwrap_or_default())
        .with_tags(decode_list(self.tags.as_deref()))
        .important(self.is_important.as_deref() == Some("true"));

        Ok((new, self.uploads))
    }
}

/// Create an event from a multipart form whose `images` parts are matched
/// to the inline images of `content`
pub async fn create_event_with_images(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<EventResponse>), ApiError> {
    let (new, uploads) = EventForm::read(&mut multipart)
        .await?
        .into_parts()
        .map_err(annals_core::AnnalsError::from)?;

    let event = run(&state, move |s| {
        s.with_events(|repo| repo.create_with_uploads(new, uploads))
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(EventResponse::new("event created", event)),
    ))
}

/// Response to a standalone image upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

/// Store a single `image` part and return its reference
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some(Upload::new(bytes.to_vec(), filename));
        break;
    }

    let upload = upload
        .filter(|u| !u.filename.is_empty())
        .ok_or_else(|| annals_core::AnnalsError::from(ValidationError::MissingField("image".into())))?;

    let image_url = run(&state, move |s| s.media.save(&upload.bytes, &upload.filename)).await?;
    Ok(Json(UploadResponse {
        success: true,
        image_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_defaults() {
        let form = EventForm {
            title: Some("Via Fani".into()),
            content: Some("<p>x</p>".into()),
            date: Some("1978-03-16".into()),
            created_by: Some("1".into()),
            ..Default::default()
        };
        let (new, uploads) = form.into_parts().unwrap();
        assert_eq!(new, NewEvent::new("Via Fani", "<p>x</p>", "1978-03-16", 1));
        assert!(uploads.is_empty());
    }

    #[test]
    fn test_form_tags_and_flag() {
        let form = EventForm {
            title: Some("t".into()),
            content: Some(String::new()),
            date: Some("1978-03-16".into()),
            created_by: Some(" 2 ".into()),
            tags: Some("Moro,BR".into()),
            is_important: Some("true".into()),
            ..Default::default()
        };
        let (new, _) = form.into_parts().unwrap();
        assert_eq!(new.tags, vec!["Moro", "BR"]);
        assert!(new.is_important);
        assert_eq!(new.created_by, 2);

        let form = EventForm {
            title: Some("t".into()),
            content: Some(String::new()),
            date: Some("1978-03-16".into()),
            created_by: Some("1".into()),
            is_important: Some("True".into()),
            ..Default::default()
        };
        assert!(!form.into_parts().unwrap().0.is_important);
    }

    #[test]
    fn test_form_requires_fields() {
        let form = EventForm {
            title: Some("t".into()),
            content: Some(String::new()),
            date: Some("1978-03-16".into()),
            ..Default::default()
        };
        assert_eq!(
            form.into_parts().unwrap_err(),
            ValidationError::MissingField("created_by".into())
        );

        let form = EventForm {
            title: Some("t".into()),
            date: Some("1978-03-16".into()),
            created_by: Some("admin".into()),
            ..Default::default()
        };
        assert!(matches!(
            form.into_parts().unwrap_err(),
            ValidationError::InvalidValue { .. }
        ));
    }
}

//! Complaint endpoints.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
};
use civiccare_common::{AppError, AppResult};
use civiccare_core::{
    ComplaintQuery, ComplaintStats, ComplaintView, Coordinates, CreateComplaintInput,
    UpdateComplaintInput, UploadedImage, require_role,
};
use civiccare_db::{
    entities::{
        complaint::{ComplaintStatus, Priority},
        user::Role,
    },
    repositories::ComplaintFilter,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{extractors::AuthUser, middleware::AppState, response::MessageResponse};

/// Multipart field carrying image files.
const IMAGES_FIELD: &str = "images";

/// Text fields and image files of a complaint form.
#[derive(Debug, Default)]
struct ComplaintForm {
    fields: HashMap<String, String>,
    images: Vec<UploadedImage>,
}

impl ComplaintForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == IMAGES_FIELD {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?
                    .to_vec();
                form.images
                    .push(UploadedImage::new(file_name, content_type, data));
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let text = text.trim();
                if !text.is_empty() {
                    form.fields.insert(name, text.to_string());
                }
            }
        }

        Ok(form)
    }

    fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    fn require(&mut self, name: &str) -> AppResult<String> {
        self.take(name)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))
    }

    fn coordinates(&mut self) -> AppResult<Option<Coordinates>> {
        self.take("coordinates")
            .map(|raw| {
                serde_json::from_str(&raw)
                    .map_err(|_| AppError::Validation("coordinates must be {\"lat\", \"lng\"}".to_string()))
            })
            .transpose()
    }
}

/// Parse a wire name (`"In Progress"`, `"High"`, ...) into its enum.
fn parse_enum<T: DeserializeOwned>(field: &str, raw: &str) -> AppResult<T> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| AppError::Validation(format!("Invalid {field}: {raw}")))
}

fn parse_optional<T: DeserializeOwned>(field: &str, raw: Option<&str>) -> AppResult<Option<T>> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_enum(field, s))
        .transpose()
}

/// File a complaint.
async fn create_complaint(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ComplaintView>)> {
    // Reject before buffering the upload.
    require_role(&user, Role::User)?;
    let mut form = ComplaintForm::read(multipart).await?;

    let input = CreateComplaintInput {
        title: form.require("title")?,
        description: form.require("description")?,
        category: parse_enum("category", &form.require("category")?)?,
        location: form.require("location")?,
        coordinates: form.coordinates()?,
    };

    let complaint = state
        .complaint_service
        .create(&user, input, form.images)
        .await?;

    Ok((StatusCode::CREATED, Json(complaint)))
}

/// Edit one of the caller's complaints.
async fn update_complaint(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<ComplaintView>> {
    require_role(&user, Role::User)?;
    let mut form = ComplaintForm::read(multipart).await?;

    let category = form.take("category");
    let input = UpdateComplaintInput {
        title: form.take("title"),
        description: form.take("description"),
        category: parse_optional("category", category.as_deref())?,
        location: form.take("location"),
        coordinates: form.coordinates()?,
    };

    let complaint = state
        .complaint_service
        .update(&user, &id, input, form.images)
        .await?;

    Ok(Json(complaint))
}

/// Image removal result.
#[derive(Serialize)]
struct DeleteImageResponse {
    message: String,
    complaint: ComplaintView,
}

/// Remove one image from one of the caller's complaints.
async fn delete_image(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((id, image_name)): Path<(String, String)>,
) -> AppResult<Json<DeleteImageResponse>> {
    let complaint = state
        .complaint_service
        .delete_image(&user, &id, &image_name)
        .await?;

    Ok(Json(DeleteImageResponse {
        message: "Image deleted successfully".to_string(),
        complaint,
    }))
}

/// Delete one of the caller's complaints.
async fn delete_complaint(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state.complaint_service.delete(&user, &id).await?;
    Ok(Json(MessageResponse::new("Complaint deleted successfully")))
}

/// The caller's complaints, newest first.
async fn my_complaints(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ComplaintView>>> {
    Ok(Json(state.complaint_service.list_mine(&user).await?))
}

/// Listing filters. Empty values are ignored.
#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    status: Option<String>,
    category: Option<String>,
    priority: Option<String>,
    search: Option<String>,
}

impl TryFrom<ListQuery> for ComplaintQuery {
    type Error = AppError;

    fn try_from(q: ListQuery) -> AppResult<Self> {
        Ok(Self {
            filter: ComplaintFilter {
                status: parse_optional("status", q.status.as_deref())?,
                category: parse_optional("category", q.category.as_deref())?,
                priority: parse_optional("priority", q.priority.as_deref())?,
            },
            search: q.search,
        })
    }
}

/// Every complaint matching the filters, newest first.
async fn list_complaints(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<ComplaintView>>> {
    let query = ComplaintQuery::try_from(query)?;
    Ok(Json(state.complaint_service.list_all(&user, &query).await?))
}

/// Dashboard statistics over the filtered complaints.
async fn complaint_stats(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ComplaintStats>> {
    let query = ComplaintQuery::try_from(query)?;
    Ok(Json(state.complaint_service.stats(&user, &query).await?))
}

#[derive(Deserialize)]
struct StatusRequest {
    status: String,
}

/// Set a complaint's status; the caller becomes its assignee.
async fn update_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> AppResult<Json<ComplaintView>> {
    let status: ComplaintStatus = parse_enum("status", &req.status)?;
    Ok(Json(
        state
            .complaint_service
            .update_status(&user, &id, status)
            .await?,
    ))
}

#[derive(Deserialize)]
struct PriorityRequest {
    priority: String,
}

/// Set a complaint's priority.
async fn update_priority(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PriorityRequest>,
) -> AppResult<Json<ComplaintView>> {
    let priority: Priority = parse_enum("priority", &req.priority)?;
    Ok(Json(
        state
            .complaint_service
            .update_priority(&user, &id, priority)
            .await?,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_complaints).post(create_complaint))
        .route("/my-complaints", get(my_complaints))
        .route("/stats", get(complaint_stats))
        .route("/{id}", put(update_complaint).delete(delete_complaint))
        .route("/{id}/images/{image_name}", delete(delete_image))
        .route("/{id}/status", put(update_status))
        .route("/{id}/priority", put(update_priority))
}

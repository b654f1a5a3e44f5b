//! Complaint workflow service.

use std::collections::HashMap;

use chrono::Utc;
use civiccare_common::{AppError, AppResult, IdGenerator};
use civiccare_db::{
    entities::{
        complaint::{self, Category, ComplaintStatus, Priority},
        user::{self, Role},
    },
    repositories::{ComplaintFilter, ComplaintRepository, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::services::{
    screening::ScreeningGate,
    stats::ComplaintStats,
    storage::{StorageBackend, StorageService, discard_files, stored_file_name, validate_file_name},
    upload::{UploadLimits, UploadedImage},
};

const NOT_FOUND: &str = "Complaint not found";

/// Fail with `Forbidden` unless the actor holds `role`.
pub fn require_role(actor: &user::Model, role: Role) -> AppResult<()> {
    if actor.role == role {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "User role {} is not authorized to access this route",
            actor.role.as_str()
        )))
    }
}

/// Owner identity embedded in complaint responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<&user::Model> for OwnerSummary {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct Coordinates {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

/// A complaint as returned to clients, with its owner expanded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub status: ComplaintStatus,
    pub priority: Priority,
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub images: Vec<String>,
    /// Public URLs of `images`, in the same order.
    pub image_urls: Vec<String>,
    pub user: Option<OwnerSummary>,
    pub assigned_to: Option<String>,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
    pub updated_at: chrono::DateTime<chrono::FixedOffset>,
}

impl ComplaintView {
    /// Build a view from a stored complaint and its owner, if known.
    #[must_use]
    pub fn new(
        complaint: complaint::Model,
        owner: Option<OwnerSummary>,
        storage: &dyn StorageBackend,
    ) -> Self {
        let images = complaint.image_names();
        let image_urls = images.iter().map(|name| storage.url(name)).collect();
        let coordinates = match (complaint.latitude, complaint.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        };

        Self {
            id: complaint.id,
            title: complaint.title,
            description: complaint.description,
            category: complaint.category,
            status: complaint.status,
            priority: complaint.priority,
            location: complaint.location,
            coordinates,
            images,
            image_urls,
            user: owner,
            assigned_to: complaint.assigned_to,
            created_at: complaint.created_at,
            updated_at: complaint.updated_at,
        }
    }
}

/// Whether the needle (already lower-cased) occurs in a searchable field.
fn matches_search(complaint: &complaint::Model, owner: Option<&OwnerSummary>, needle: &str) -> bool {
    [
        Some(complaint.title.as_str()),
        Some(complaint.description.as_str()),
        Some(complaint.location.as_str()),
        owner.map(|u| u.name.as_str()),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle))
}

/// Input for filing a complaint.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateComplaintInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1, max = 5000))]
    pub description: String,

    pub category: Category,

    #[validate(length(min = 1, max = 500))]
    pub location: String,

    #[validate(nested)]
    pub coordinates: Option<Coordinates>,
}

/// Input for editing a complaint. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateComplaintInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 5000))]
    pub description: Option<String>,

    pub category: Option<Category>,

    #[validate(length(min = 1, max = 500))]
    pub location: Option<String>,

    #[validate(nested)]
    pub coordinates: Option<Coordinates>,
}

/// Authority listing query.
#[derive(Debug, Clone, Default)]
pub struct ComplaintQuery {
    pub filter: ComplaintFilter,
    /// Case-insensitive substring over title, description, location and owner name.
    pub search: Option<String>,
}

/// Complaint service for the complaint lifecycle.
#[derive(Clone)]
pub struct ComplaintService {
    complaint_repo: ComplaintRepository,
    user_repo: UserRepository,
    storage: StorageService,
    gate: ScreeningGate,
    limits: UploadLimits,
    screen_updates: bool,
    id_gen: IdGenerator,
}

impl ComplaintService {
    /// Create a new complaint service.
    #[must_use]
    pub const fn new(
        complaint_repo: ComplaintRepository,
        user_repo: UserRepository,
        storage: StorageService,
        gate: ScreeningGate,
        limits: UploadLimits,
    ) -> Self {
        Self {
            complaint_repo,
            user_repo,
            storage,
            gate,
            limits,
            screen_updates: false,
            id_gen: IdGenerator::new(),
        }
    }

    /// Also screen images attached by an edit.
    #[must_use]
    pub const fn with_update_screening(mut self, enabled: bool) -> Self {
        self.screen_updates = enabled;
        self
    }

    /// File a new complaint. Every image must pass screening or nothing is kept.
    pub async fn create(
        &self,
        actor: &user::Model,
        input: CreateComplaintInput,
        images: Vec<UploadedImage>,
    ) -> AppResult<ComplaintView> {
        require_role(actor, Role::User)?;
        input.validate()?;

        if images.is_empty() {
            return Err(AppError::Validation("Image required".to_string()));
        }
        self.limits.check(&images)?;
        self.gate.check_all(&images).await?;

        let stored = self.store_images(&images).await?;

        let now = Utc::now();
        let model = complaint::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(input.title),
            description: Set(input.description),
            category: Set(input.category),
            status: Set(ComplaintStatus::Pending),
            priority: Set(Priority::Medium),
            location: Set(input.location),
            latitude: Set(input.coordinates.map(|c| c.lat)),
            longitude: Set(input.coordinates.map(|c| c.lng)),
            images: Set(serde_json::json!(stored)),
            user_id: Set(actor.id.clone()),
            assigned_to: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        match self.complaint_repo.create(model).await {
            Ok(created) => {
                info!(complaint_id = %created.id, user_id = %actor.id, images = stored.len(), "Complaint filed");
                Ok(self.view(created, Some(actor.into())))
            }
            Err(e) => {
                discard_files(self.storage.as_ref(), &stored).await;
                Err(e)
            }
        }
    }

    /// Edit an owned complaint; new images are appended.
    pub async fn update(
        &self,
        actor: &user::Model,
        id: &str,
        input: UpdateComplaintInput,
        images: Vec<UploadedImage>,
    ) -> AppResult<ComplaintView> {
        require_role(actor, Role::User)?;
        input.validate()?;

        let complaint = self.find_owned(id, actor).await?;

        self.limits.check(&images)?;
        if self.screen_updates {
            self.gate.check_all(&images).await?;
        }
        let added = self.store_images(&images).await?;

        let mut names = complaint.image_names();
        names.extend(added.iter().cloned());

        let mut active: complaint::ActiveModel = complaint.into();
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(category) = input.category {
            active.category = Set(category);
        }
        if let Some(location) = input.location {
            active.location = Set(location);
        }
        if let Some(coordinates) = input.coordinates {
            active.latitude = Set(Some(coordinates.lat));
            active.longitude = Set(Some(coordinates.lng));
        }
        if !added.is_empty() {
            active.images = Set(serde_json::json!(names));
        }
        active.updated_at = Set(Utc::now().into());

        match self.complaint_repo.update(active).await {
            Ok(updated) => Ok(self.view(updated, Some(actor.into()))),
            Err(e) => {
                discard_files(self.storage.as_ref(), &added).await;
                Err(e)
            }
        }
    }

    /// Remove one image from an owned complaint and delete its file.
    ///
    /// A name the complaint does not reference leaves it untouched.
    pub async fn delete_image(
        &self,
        actor: &user::Model,
        id: &str,
        image_name: &str,
    ) -> AppResult<ComplaintView> {
        require_role(actor, Role::User)?;
        validate_file_name(image_name)?;

        let complaint = self.find_owned(id, actor).await?;
        let names = complaint.image_names();
        if !names.iter().any(|n| n == image_name) {
            return Ok(self.view(complaint, Some(actor.into())));
        }

        let remaining: Vec<String> = names.into_iter().filter(|n| n != image_name).collect();
        let mut active: complaint::ActiveModel = complaint.into();
        active.images = Set(serde_json::json!(remaining));
        active.updated_at = Set(Utc::now().into());

        let updated = self.complaint_repo.update(active).await?;
        discard_files(self.storage.as_ref(), &[image_name.to_string()]).await;

        Ok(self.view(updated, Some(actor.into())))
    }

    /// Delete an owned complaint, then its image files.
    pub async fn delete(&self, actor: &user::Model, id: &str) -> AppResult<()> {
        require_role(actor, Role::User)?;

        let complaint = self.find_owned(id, actor).await?;
        if !self.complaint_repo.delete(&complaint.id).await? {
            return Err(AppError::NotFound(NOT_FOUND.to_string()));
        }

        let images = complaint.image_names();
        discard_files(self.storage.as_ref(), &images).await;

        info!(complaint_id = %complaint.id, images = images.len(), "Complaint deleted");
        Ok(())
    }

    /// The actor's own complaints, newest first.
    pub async fn list_mine(&self, actor: &user::Model) -> AppResult<Vec<ComplaintView>> {
        require_role(actor, Role::User)?;

        let complaints = self.complaint_repo.find_by_owner(&actor.id).await?;
        Ok(complaints
            .into_iter()
            .map(|c| self.view(c, Some(actor.into())))
            .collect())
    }

    /// Every complaint matching the query, newest first.
    pub async fn list_all(
        &self,
        actor: &user::Model,
        query: &ComplaintQuery,
    ) -> AppResult<Vec<ComplaintView>> {
        require_role(actor, Role::Authority)?;

        Ok(self
            .find_matching(query)
            .await?
            .into_iter()
            .map(|(complaint, owner)| self.view(complaint, owner))
            .collect())
    }

    /// Dashboard statistics over the same complaints [`Self::list_all`] returns.
    pub async fn stats(
        &self,
        actor: &user::Model,
        query: &ComplaintQuery,
    ) -> AppResult<ComplaintStats> {
        require_role(actor, Role::Authority)?;

        let complaints: Vec<complaint::Model> = self
            .find_matching(query)
            .await?
            .into_iter()
            .map(|(complaint, _)| complaint)
            .collect();

        Ok(ComplaintStats::from_complaints(&complaints))
    }

    /// Set a complaint's status and assign it to the acting authority.
    ///
    /// Any status may follow any other.
    pub async fn update_status(
        &self,
        actor: &user::Model,
        id: &str,
        status: ComplaintStatus,
    ) -> AppResult<ComplaintView> {
        require_role(actor, Role::Authority)?;

        let complaint = self.find(id).await?;
        let mut active: complaint::ActiveModel = complaint.into();
        active.status = Set(status);
        active.assigned_to = Set(Some(actor.id.clone()));
        active.updated_at = Set(Utc::now().into());

        let updated = self.complaint_repo.update(active).await?;
        info!(complaint_id = %updated.id, status = ?status, authority = %actor.id, "Complaint status changed");
        self.with_owner(updated).await
    }

    /// Set a complaint's priority.
    pub async fn update_priority(
        &self,
        actor: &user::Model,
        id: &str,
        priority: Priority,
    ) -> AppResult<ComplaintView> {
        require_role(actor, Role::Authority)?;

        let complaint = self.find(id).await?;
        let mut active: complaint::ActiveModel = complaint.into();
        active.priority = Set(priority);
        active.updated_at = Set(Utc::now().into());

        let updated = self.complaint_repo.update(active).await?;
        self.with_owner(updated).await
    }

    async fn find(&self, id: &str) -> AppResult<complaint::Model> {
        self.complaint_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))
    }

    async fn find_owned(&self, id: &str, actor: &user::Model) -> AppResult<complaint::Model> {
        self.complaint_repo
            .find_by_id_and_owner(id, &actor.id)
            .await?
            .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))
    }

    async fn with_owner(&self, complaint: complaint::Model) -> AppResult<ComplaintView> {
        let owner = self.user_repo.find_by_id(&complaint.user_id).await?;
        Ok(self.view(complaint, owner.as_ref().map(OwnerSummary::from)))
    }

    fn view(&self, complaint: complaint::Model, owner: Option<OwnerSummary>) -> ComplaintView {
        ComplaintView::new(complaint, owner, self.storage.as_ref())
    }

    async fn find_matching(
        &self,
        query: &ComplaintQuery,
    ) -> AppResult<Vec<(complaint::Model, Option<OwnerSummary>)>> {
        let complaints = self.complaint_repo.find_filtered(query.filter).await?;

        let mut owner_ids: Vec<String> = complaints.iter().map(|c| c.user_id.clone()).collect();
        owner_ids.sort_unstable();
        owner_ids.dedup();
        let owners: HashMap<String, OwnerSummary> = self
            .user_repo
            .find_by_ids(&owner_ids)
            .await?
            .iter()
            .map(|u| (u.id.clone(), OwnerSummary::from(u)))
            .collect();

        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        Ok(complaints
            .into_iter()
            .map(|c| {
                let owner = owners.get(&c.user_id).cloned();
                (c, owner)
            })
            .filter(|(c, owner)| {
                needle
                    .as_deref()
                    .is_none_or(|n| matches_search(c, owner.as_ref(), n))
            })
            .collect())
    }

    /// Write images to storage, removing any already written if one fails.
    async fn store_images(&self, images: &[UploadedImage]) -> AppResult<Vec<String>> {
        let mut stored = Vec::with_capacity(images.len());
        for image in images {
            let name = stored_file_name(&self.id_gen, image);
            if let Err(e) = self.storage.save(&name, &image.data).await {
                discard_files(self.storage.as_ref(), &stored).await;
                return Err(e);
            }
            stored.push(name);
        }
        Ok(stored)
    }
}

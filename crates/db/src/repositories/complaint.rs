//! Complaint repository.

use std::sync::Arc;

use crate::entities::{
    Complaint,
    complaint::{self, Category, ComplaintStatus, Priority},
};
use civiccare_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder,
};

const NOT_FOUND: &str = "Complaint not found";

/// Equality filters for the authority listing. `None` means unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplaintFilter {
    pub status: Option<ComplaintStatus>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
}

impl ComplaintFilter {
    /// AND of every present equality.
    #[must_use]
    pub fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(status) = self.status {
            condition = condition.add(complaint::Column::Status.eq(status));
        }
        if let Some(category) = self.category {
            condition = condition.add(complaint::Column::Category.eq(category));
        }
        if let Some(priority) = self.priority {
            condition = condition.add(complaint::Column::Priority.eq(priority));
        }
        condition
    }
}

/// Complaint repository for database operations.
#[derive(Clone)]
pub struct ComplaintRepository {
    db: Arc<DatabaseConnection>,
}

impl ComplaintRepository {
    /// Create a new complaint repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a complaint by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<complaint::Model>> {
        Complaint::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a complaint by ID only if `user_id` filed it.
    ///
    /// Both checks share one predicate, so a foreign complaint and a missing
    /// one are indistinguishable to the caller.
    pub async fn find_by_id_and_owner(
        &self,
        id: &str,
        user_id: &str,
    ) -> AppResult<Option<complaint::Model>> {
        Complaint::find()
            .filter(complaint::Column::Id.eq(id))
            .filter(complaint::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Complaints filed by a user, newest first.
    pub async fn find_by_owner(&self, user_id: &str) -> AppResult<Vec<complaint::Model>> {
        Complaint::find()
            .filter(complaint::Column::UserId.eq(user_id))
            .order_by_desc(complaint::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Complaints matching the filter, newest first.
    pub async fn find_filtered(&self, filter: ComplaintFilter) -> AppResult<Vec<complaint::Model>> {
        Complaint::find()
            .filter(filter.condition())
            .order_by_desc(complaint::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new complaint.
    pub async fn create(&self, model: complaint::ActiveModel) -> AppResult<complaint::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a complaint. A row deleted since it was read is `NotFound`.
    pub async fn update(&self, model: complaint::ActiveModel) -> AppResult<complaint::Model> {
        model.update(self.db.as_ref()).await.map_err(|e| match e {
            DbErr::RecordNotUpdated => AppError::NotFound(NOT_FOUND.to_string()),
            e => AppError::Database(e.to_string()),
        })
    }

    /// Delete a complaint. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = Complaint::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }
}

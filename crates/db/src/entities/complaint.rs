//! Complaint entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Complaint category.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum Category {
    #[sea_orm(string_value = "Infrastructure")]
    Infrastructure,
    #[sea_orm(string_value = "Sanitation")]
    Sanitation,
    #[sea_orm(string_value = "Security")]
    Security,
    #[sea_orm(string_value = "Electrical")]
    Electrical,
    #[sea_orm(string_value = "Water")]
    Water,
    #[sea_orm(string_value = "Other")]
    Other,
}

/// Complaint status. Any status may be set from any other.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ComplaintStatus {
    #[sea_orm(string_value = "Pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "In Progress")]
    #[serde(rename = "In Progress")]
    InProgress,
    #[sea_orm(string_value = "Resolved")]
    Resolved,
}

/// Complaint priority.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Priority {
    #[sea_orm(string_value = "Low")]
    Low,
    #[sea_orm(string_value = "Medium")]
    #[default]
    Medium,
    #[sea_orm(string_value = "High")]
    High,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "complaint")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub category: Category,

    pub status: ComplaintStatus,

    pub priority: Priority,

    /// Free-text address
    pub location: String,

    #[sea_orm(nullable)]
    pub latitude: Option<f64>,

    #[sea_orm(nullable)]
    pub longitude: Option<f64>,

    /// Stored image file names, in upload order
    #[sea_orm(column_type = "JsonBinary")]
    pub images: Json,

    /// Filing user, never reassigned
    pub user_id: String,

    /// Authority that last changed the status
    #[sea_orm(nullable)]
    pub assigned_to: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Stored image file names.
    #[must_use]
    pub fn image_names(&self) -> Vec<String> {
        serde_json::from_value(self.images.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Owner,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AssignedTo",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Assignee,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ComplaintStatus::InProgress).unwrap(),
            "\"In Progress\""
        );
        assert_eq!(
            serde_json::from_str::<ComplaintStatus>("\"Resolved\"").unwrap(),
            ComplaintStatus::Resolved
        );
        assert!(serde_json::from_str::<ComplaintStatus>("\"Closed\"").is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ComplaintStatus::default(), ComplaintStatus::Pending);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_category_rejects_unknown() {
        assert_eq!(
            serde_json::from_str::<Category>("\"Water\"").unwrap(),
            Category::Water
        );
        assert!(serde_json::from_str::<Category>("\"Roads\"").is_err());
    }

    #[test]
    fn test_image_names() {
        let now = chrono::Utc::now().into();
        let model = Model {
            id: "c1".to_string(),
            title: "Pothole".to_string(),
            description: "Deep pothole".to_string(),
            category: Category::Infrastructure,
            status: ComplaintStatus::Pending,
            priority: Priority::Medium,
            location: "Main St".to_string(),
            latitude: None,
            longitude: None,
            images: json!(["a.jpg", "b.png"]),
            user_id: "u1".to_string(),
            assigned_to: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(model.image_names(), vec!["a.jpg", "b.png"]);
    }
}

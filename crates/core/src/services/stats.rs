//! Dashboard statistics over a list of complaints.

use std::collections::BTreeMap;

use civiccare_db::entities::complaint::{self, Category, ComplaintStatus, Priority};
use sea_orm::{ActiveEnum, Iterable};
use serde::Serialize;

/// Aggregate counts shown on the authority dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintStats {
    pub total: u64,
    /// Every status is present, zero when unused.
    pub by_status: BTreeMap<String, u64>,
    /// Every category is present, zero when unused.
    pub by_category: BTreeMap<String, u64>,
    /// Every priority is present, zero when unused.
    pub by_priority: BTreeMap<String, u64>,
    /// Keyed by creation month, `YYYY-MM`.
    pub by_month: BTreeMap<String, u64>,
    pub high_priority: u64,
    /// Share of complaints resolved, `0.0` for an empty list.
    pub resolution_rate: f64,
}

fn zeroed<E: ActiveEnum<Value = String> + Iterable>() -> BTreeMap<String, u64> {
    E::iter().map(|v| (v.to_value(), 0)).collect()
}

impl ComplaintStats {
    /// Tally a list of complaints.
    #[must_use]
    pub fn from_complaints(complaints: &[complaint::Model]) -> Self {
        let mut by_status = zeroed::<ComplaintStatus>();
        let mut by_category = zeroed::<Category>();
        let mut by_priority = zeroed::<Priority>();
        let mut by_month = BTreeMap::new();

        for c in complaints {
            *by_status.entry(c.status.to_value()).or_default() += 1;
            *by_category.entry(c.category.to_value()).or_default() += 1;
            *by_priority.entry(c.priority.to_value()).or_default() += 1;
            *by_month
                .entry(c.created_at.format("%Y-%m").to_string())
                .or_default() += 1;
        }

        let total = complaints.len() as u64;
        let resolved = by_status
            .get(&ComplaintStatus::Resolved.to_value())
            .copied()
            .unwrap_or_default();
        let high_priority = by_priority
            .get(&Priority::High.to_value())
            .copied()
            .unwrap_or_default();

        #[allow(clippy::cast_precision_loss)]
        let resolution_rate = if total == 0 {
            0.0
        } else {
            resolved as f64 / total as f64
        };

        Self {
            total,
            by_status,
            by_category,
            by_priority,
            by_month,
            high_priority,
            resolution_rate,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn complaint(
        id: &str,
        status: ComplaintStatus,
        priority: Priority,
        month: u32,
    ) -> complaint::Model {
        let at = Utc.with_ymd_and_hms(2025, month, 10, 12, 0, 0).unwrap();
        complaint::Model {
            id: id.to_string(),
            title: "Broken streetlight".to_string(),
            description: "Dark at night".to_string(),
            category: Category::Electrical,
            status,
            priority,
            location: "Main St".to_string(),
            latitude: None,
            longitude: None,
            images: json!(["a.png"]),
            user_id: "user1".to_string(),
            assigned_to: None,
            created_at: at.into(),
            updated_at: at.into(),
        }
    }

    #[test]
    fn test_empty_list() {
        let stats = ComplaintStats::from_complaints(&[]);
        assert_eq!(stats.total, 0);
        assert!((stats.resolution_rate - 0.0).abs() < f64::EPSILON);
        assert_eq!(stats.by_status.len(), 3);
        assert_eq!(stats.by_category.len(), 6);
        assert!(stats.by_status.values().all(|&n| n == 0));
        assert!(stats.by_month.is_empty());
    }

    #[test]
    fn test_counts() {
        let stats = ComplaintStats::from_complaints(&[
            complaint("1", ComplaintStatus::Resolved, Priority::High, 1),
            complaint("2", ComplaintStatus::InProgress, Priority::High, 1),
            complaint("3", ComplaintStatus::Pending, Priority::Low, 2),
            complaint("4", ComplaintStatus::Resolved, Priority::Medium, 3),
        ]);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_status["In Progress"], 1);
        assert_eq!(stats.by_status["Resolved"], 2);
        assert_eq!(stats.by_category["Electrical"], 4);
        assert_eq!(stats.by_category["Water"], 0);
        assert_eq!(stats.high_priority, 2);
        assert_eq!(stats.by_month["2025-01"], 2);
        assert_eq!(stats.by_month["2025-03"], 1);
        assert!((stats.resolution_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(ComplaintStats::from_complaints(&[])).unwrap();
        assert!(value.get("byStatus").is_some());
        assert!(value.get("resolutionRate").is_some());
        assert!(value.get("highPriority").is_some());
    }
}

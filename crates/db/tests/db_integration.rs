//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `civiccare_test`)
//!   `TEST_DB_PASSWORD` (default: `civiccare_test`)
//!   `TEST_DB_NAME` (default: `civiccare_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, Utc};
use civiccare_db::{
    entities::{
        complaint::{self, Category, ComplaintStatus, Priority},
        user::{self, Role},
    },
    repositories::{ComplaintFilter, ComplaintRepository, UserRepository},
    test_utils::{TestDatabase, TestDbConfig},
};
use sea_orm::Set;
use serde_json::json;

async fn seed_user(repo: &UserRepository, id: &str, role: Role) -> user::Model {
    repo.create(user::ActiveModel {
        id: Set(id.to_string()),
        name: Set(format!("User {id}")),
        email: Set(format!("{id}@example.com")),
        password_hash: Set("$argon2id$test".to_string()),
        role: Set(role),
        token: Set(Some(format!("token-{id}"))),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    })
    .await
    .expect("seed user")
}

async fn seed_complaint(
    repo: &ComplaintRepository,
    id: &str,
    user_id: &str,
    status: ComplaintStatus,
    age_minutes: i64,
) -> complaint::Model {
    let created = Utc::now() - Duration::minutes(age_minutes);
    repo.create(complaint::ActiveModel {
        id: Set(id.to_string()),
        title: Set(format!("Complaint {id}")),
        description: Set("Water leaking onto the road".to_string()),
        category: Set(Category::Water),
        status: Set(status),
        priority: Set(Priority::Medium),
        location: Set("Ward 7".to_string()),
        latitude: Set(None),
        longitude: Set(None),
        images: Set(json!([format!("{id}.jpg")])),
        user_id: Set(user_id.to_string()),
        assigned_to: Set(None),
        created_at: Set(created.into()),
        updated_at: Set(created.into()),
    })
    .await
    .expect("seed complaint")
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection_runs_migrations() {
    let result = TestDatabase::with_config(TestDbConfig::default()).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_owner_scoped_lookup_and_filtering() {
    let db = TestDatabase::create_unique().await.expect("Failed to create db");
    let users = UserRepository::new(db.shared());
    let complaints = ComplaintRepository::new(db.shared());

    seed_user(&users, "alice", Role::User).await;
    seed_user(&users, "bob", Role::User).await;
    seed_complaint(&complaints, "c-old", "alice", ComplaintStatus::Resolved, 30).await;
    seed_complaint(&complaints, "c-new", "alice", ComplaintStatus::Resolved, 5).await;
    seed_complaint(&complaints, "c-open", "bob", ComplaintStatus::Pending, 10).await;

    // A foreign complaint looks exactly like a missing one.
    assert!(
        complaints
            .find_by_id_and_owner("c-open", "alice")
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        complaints
            .find_by_id_and_owner("does-not-exist", "alice")
            .await
            .unwrap()
            .is_none()
    );

    let resolved = complaints
        .find_filtered(ComplaintFilter {
            status: Some(ComplaintStatus::Resolved),
            ..ComplaintFilter::default()
        })
        .await
        .unwrap();
    let ids: Vec<_> = resolved.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c-new", "c-old"]);

    let mine = complaints.find_by_owner("bob").await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].image_names(), vec!["c-open.jpg"]);

    assert!(complaints.delete("c-open").await.unwrap());
    assert!(complaints.find_by_owner("bob").await.unwrap().is_empty());

    drop((users, complaints));
    db.drop_database().await.expect("Failed to drop db");
}

#[test]
fn test_database_url_format() {
    let config = TestDbConfig {
        host: "testhost".to_string(),
        port: 5432,
        username: "testuser".to_string(),
        password: "testpass".to_string(),
        database: "testdb".to_string(),
    };

    let url = config.database_url();
    assert!(url.starts_with("postgres://"));
    assert!(url.contains("testhost"));
    assert!(url.contains("testdb"));
}

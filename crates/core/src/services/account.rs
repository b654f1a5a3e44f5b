//! Account service: registration, login and bearer tokens.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use civiccare_common::{AppError, AppResult, IdGenerator};
use civiccare_db::{
    entities::user::{self, Role},
    repositories::UserRepository,
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Account service for user identity operations.
#[derive(Clone)]
pub struct AccountService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

/// Input for registering an account.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6, max = 128))]
    pub password: String,

    #[serde(default)]
    pub role: Role,
}

/// Input for logging in.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,

    /// Role selected on the login form, if any.
    pub role: Option<Role>,
}

impl AccountService {
    /// Create a new account service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new account and issue its first token.
    pub async fn register(&self, input: RegisterInput) -> AppResult<user::Model> {
        input.validate()?;

        let email = input.email.trim().to_lowercase();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let password_hash = hash_password(&input.password)?;

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(input.name.trim().to_string()),
            email: Set(email),
            password_hash: Set(password_hash),
            role: Set(input.role),
            token: Set(Some(self.id_gen.generate_token())),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, role = user.role.as_str(), "Account registered");
        Ok(user)
    }

    /// Check credentials. Unknown email, wrong password and a role other than
    /// the one selected all fail the same way.
    pub async fn login(&self, input: LoginInput) -> AppResult<user::Model> {
        input.validate()?;

        let user = self
            .user_repo
            .find_by_email(input.email.trim())
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        if input.role.is_some_and(|role| role != user.role) {
            tracing::debug!(user_id = %user.id, "Login rejected for role mismatch");
            return Err(AppError::Unauthorized);
        }

        if user.token.is_some() {
            Ok(user)
        } else {
            self.regenerate_token(&user.id).await
        }
    }

    /// Resolve a bearer token to its account.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Replace a user's token, invalidating the old one.
    pub async fn regenerate_token(&self, user_id: &str) -> AppResult<user::Model> {
        let user = self.user_repo.get_by_id(user_id).await?;

        let mut active: user::ActiveModel = user.into();
        active.token = Set(Some(self.id_gen.generate_token()));
        active.updated_at = Set(Some(Utc::now().into()));

        self.user_repo.update(active).await
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn test_user(password: &str, role: Role) -> user::Model {
        user::Model {
            id: "user1".to_string(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            password_hash: hash_password(password).unwrap(),
            role,
            token: Some("token1".to_string()),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn service_with(db: MockDatabase) -> AccountService {
        AccountService::new(UserRepository::new(Arc::new(db.into_connection())))
    }

    fn login_input(password: &str, role: Option<Role>) -> LoginInput {
        LoginInput {
            email: "Asha@Example.com".to_string(),
            password: password.to_string(),
            role,
        }
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("anything", "not-a-hash").is_err());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let existing = test_user("secret1", Role::User);
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[existing]]);
        let service = service_with(db);

        let result = service
            .register(RegisterInput {
                name: "Asha".to_string(),
                email: "asha@example.com".to_string(),
                password: "secret1".to_string(),
                role: Role::User,
            })
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let service = service_with(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service
            .register(RegisterInput {
                name: String::new(),
                email: "not-an-email".to_string(),
                password: "123".to_string(),
                role: Role::User,
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_creates_user() {
        let created = test_user("secret1", Role::Authority);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_results([[created.clone()]]);
        let service = service_with(db);

        let user = service
            .register(RegisterInput {
                name: "Asha".to_string(),
                email: "ASHA@example.com".to_string(),
                password: "secret1".to_string(),
                role: Role::Authority,
            })
            .await
            .unwrap();

        assert_eq!(user.id, created.id);
        assert_eq!(user.role, Role::Authority);
    }

    #[tokio::test]
    async fn test_login_success() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_user("secret1", Role::User)]]);
        let service = service_with(db);

        let user = service.login(login_input("secret1", None)).await.unwrap();
        assert_eq!(user.token.as_deref(), Some("token1"));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_user("secret1", Role::User)]]);
        let service = service_with(db);

        let result = service.login(login_input("wrong-pass", None)).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_login_role_mismatch() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_user("secret1", Role::User)]]);
        let service = service_with(db);

        let result = service
            .login(login_input("secret1", Some(Role::Authority)))
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()]);
        let service = service_with(db);

        let result = service.login(login_input("secret1", None)).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_authenticate_by_token_unknown() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()]);
        let service = service_with(db);

        let result = service.authenticate_by_token("nope").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_regenerate_token() {
        let user = test_user("secret1", Role::User);
        let mut rotated = user.clone();
        rotated.token = Some("token2".to_string());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user]])
            .append_query_results([[rotated]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]);
        let service = service_with(db);

        let updated = service.regenerate_token("user1").await.unwrap();
        assert_eq!(updated.token.as_deref(), Some("token2"));
    }
}

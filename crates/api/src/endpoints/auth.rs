//! Authentication endpoints.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use civiccare_common::AppResult;
use civiccare_core::{LoginInput, RegisterInput};
use civiccare_db::entities::user::{self, Role};
use serde::Serialize;

use crate::{extractors::AuthUser, middleware::AppState, response::MessageResponse};

/// Account as returned to its owner.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            created_at: u.created_at.to_rfc3339(),
        }
    }
}

/// Token plus the account it belongs to.
#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

impl From<user::Model> for AuthResponse {
    fn from(mut u: user::Model) -> Self {
        Self {
            token: u.token.take().unwrap_or_default(),
            user: u.into(),
        }
    }
}

/// Create a new account.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterInput>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let user = state.account_service.register(req).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Sign in to an existing account.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginInput>,
) -> AppResult<Json<AuthResponse>> {
    let user = state.account_service.login(req).await?;
    Ok(Json(user.into()))
}

/// The calling account.
async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

/// Sign out (invalidate current token by regenerating).
async fn logout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<MessageResponse>> {
    state.account_service.regenerate_token(&user.id).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

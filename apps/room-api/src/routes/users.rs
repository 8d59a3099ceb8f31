//! User profile endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use flickpick_common::id::{prefix, prefixed_ulid};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::user::{NewUser, User};
use crate::models::user_statistics::UserStatistics;
use crate::store::StoreError;
use crate::AppState;

const MAX_USERNAME_LEN: usize = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/me", get(get_me))
        .route("/users/{user_id}", get(get_user))
        .route("/users/{user_id}/statistics", get(get_statistics))
}

async fn load_user(state: &AppState, user_id: &str) -> Result<User, ApiError> {
    match state.stores.users.get_user(user_id).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound) => Err(ApiError::not_found("User not found")),
        Err(err) => Err(err.into()),
    }
}

// ---------------------------------------------------------------------------
// POST /api/v1/users
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub avatar_url: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Validation error", body = ApiErrorBody),
    ),
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let username = body.username.trim();
    let mut errors = Vec::new();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        errors.push(FieldError {
            field: "username".to_string(),
            message: format!("must be between 1 and {MAX_USERNAME_LEN} characters"),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let id = prefixed_ulid(prefix::USER);
    let user = state
        .stores
        .users
        .create_user(NewUser {
            id: &id,
            username,
            avatar_url: body.avatar_url.as_deref().filter(|u| !u.is_empty()),
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(user_id = %user.id, "user created");

    Ok((StatusCode::CREATED, Json(user)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/users/me
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn get_me(AuthUser { user }: AuthUser) -> Json<User> {
    Json(user)
}

// ---------------------------------------------------------------------------
// GET /api/v1/users/{user_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "Users",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found", body = ApiErrorBody),
    ),
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(load_user(&state, &user_id).await?))
}

// ---------------------------------------------------------------------------
// GET /api/v1/users/{user_id}/statistics
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/statistics",
    tag = "Users",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Swipe, match and room counters", body = UserStatistics),
        (status = 404, description = "User not found", body = ApiErrorBody),
    ),
)]
pub async fn get_statistics(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserStatistics>, ApiError> {
    load_user(&state, &user_id).await?;
    let stats = state.stores.users.statistics(&user_id).await?;
    Ok(Json(stats))
}

//! Swipe endpoints. A like may complete a room-wide match.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::room_match::MatchWithDetails;
use crate::models::swipe::{NewSwipe, Swipe, SwipeDirection};
use crate::store::StoreError;
use crate::AppState;

use super::rooms::{load_room, require_member};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms/{room_id}/swipes", post(create_swipe).get(list_swipes))
        .route("/rooms/{room_id}/swipes/undo", post(undo_room_swipe))
        .route("/swipes/undo", post(undo_swipe))
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/{room_id}/swipes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSwipeRequest {
    pub movie_id: String,
    /// `right`/`like` or `left`/`dislike`.
    pub direction: SwipeDirection,
}

/// Returned instead of the bare swipe when the like completed a match.
#[derive(Debug, Serialize, ToSchema)]
pub struct SwipeWithMatch {
    pub swipe: Swipe,
    #[serde(rename = "match")]
    pub matched: MatchWithDetails,
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/swipes",
    tag = "Swipes",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID")),
    request_body = CreateSwipeRequest,
    responses(
        (status = 200, description = "The swipe, or `{swipe, match}` when it completed a match", body = Swipe),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 403, description = "Not a member", body = ApiErrorBody),
        (status = 404, description = "Room not found", body = ApiErrorBody),
        (status = 409, description = "Movie already swiped", body = ApiErrorBody),
    ),
)]
pub async fn create_swipe(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<CreateSwipeRequest>,
) -> Result<Response, ApiError> {
    let movie_id = body.movie_id.trim();
    if movie_id.is_empty() {
        return Err(ApiError::validation(vec![FieldError {
            field: "movie_id".to_string(),
            message: "is required".to_string(),
        }]));
    }

    load_room(&state, &room_id).await?;
    require_member(&state, &room_id, auth.id()).await?;

    if state
        .stores
        .swipes
        .has_swiped(auth.id(), &room_id, movie_id)
        .await?
    {
        return Err(ApiError::conflict("Already swiped this movie"));
    }

    let swipe = state
        .stores
        .swipes
        .record_swipe(NewSwipe {
            id: state.snowflake.generate(),
            user_id: auth.id(),
            room_id: &room_id,
            movie_id,
            direction: body.direction,
            created_at: Utc::now(),
        })
        .await
        .map_err(|err| match err {
            StoreError::Conflict(_) => ApiError::conflict("Already swiped this movie"),
            other => other.into(),
        })?;

    tracing::debug!(
        room_id = %room_id,
        user_id = %auth.id(),
        movie_id = %movie_id,
        direction = body.direction.as_str(),
        "swipe recorded"
    );

    if !swipe.direction.is_like() {
        return Ok(Json(swipe).into_response());
    }

    // The swipe is already stored; a failed evaluation must not fail the request.
    let matched = match state.engine.check_and_create_match(&room_id, movie_id).await {
        Ok(Some(record)) => record,
        Ok(None) => return Ok(Json(swipe).into_response()),
        Err(err) => {
            tracing::error!(?err, room_id = %room_id, movie_id = %movie_id, "match evaluation failed");
            return Ok(Json(swipe).into_response());
        }
    };

    match state.engine.details(matched).await {
        Ok(details) => {
            state.hub.broadcast_match(&room_id, &details);
            Ok(Json(SwipeWithMatch {
                swipe,
                matched: details,
            })
            .into_response())
        }
        Err(err) => {
            tracing::error!(?err, room_id = %room_id, movie_id = %movie_id, "failed to load match details");
            Ok(Json(swipe).into_response())
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/swipes
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/swipes",
    tag = "Swipes",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID")),
    responses(
        (status = 200, description = "The caller's swipes, newest first", body = Vec<Swipe>),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn list_swipes(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<Swipe>>, ApiError> {
    let swipes = state
        .stores
        .swipes
        .list_user_swipes(auth.id(), &room_id)
        .await?;
    Ok(Json(swipes))
}

// ---------------------------------------------------------------------------
// POST /api/v1/swipes/undo
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UndoSwipeRequest {
    pub room_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UndoSwipeResponse {
    pub message: String,
    pub swipe: Swipe,
}

#[utoipa::path(
    post,
    path = "/api/v1/swipes/undo",
    tag = "Swipes",
    security(("bearer" = [])),
    request_body = UndoSwipeRequest,
    responses(
        (status = 200, description = "Most recent swipe removed", body = UndoSwipeResponse),
        (status = 404, description = "Nothing to undo", body = ApiErrorBody),
    ),
)]
pub async fn undo_swipe(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<UndoSwipeRequest>,
) -> Result<Json<UndoSwipeResponse>, ApiError> {
    Ok(Json(undo(&state, auth.id(), &body.room_id).await?))
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/{room_id}/swipes/undo
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/swipes/undo",
    tag = "Swipes",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Most recent swipe removed", body = UndoSwipeResponse),
        (status = 404, description = "Nothing to undo", body = ApiErrorBody),
    ),
)]
pub async fn undo_room_swipe(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<UndoSwipeResponse>, ApiError> {
    Ok(Json(undo(&state, auth.id(), &room_id).await?))
}

async fn undo(state: &AppState, user_id: &str, room_id: &str) -> Result<UndoSwipeResponse, ApiError> {
    let swipe = match state.stores.swipes.undo_last_swipe(user_id, room_id).await {
        Ok(swipe) => swipe,
        Err(StoreError::NotFound) => return Err(ApiError::not_found("No swipe found to undo")),
        Err(err) => return Err(err.into()),
    };

    tracing::debug!(room_id = %room_id, user_id = %user_id, movie_id = %swipe.movie_id, "swipe undone");

    Ok(UndoSwipeResponse {
        message: "Swipe undone successfully".to_string(),
        swipe,
    })
}

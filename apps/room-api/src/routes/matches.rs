//! Match read endpoints.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::error::{ApiError, ApiErrorBody};
use crate::models::room_match::{AlmostMatch, Match, MatchWithDetails};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms/{room_id}/matches", get(list_room_matches))
        .route("/rooms/{room_id}/almost-matches", get(list_almost_matches))
        .route("/matches/{match_id}", get(get_match))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/matches
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/matches",
    tag = "Matches",
    params(("room_id" = String, Path, description = "Room ID")),
    responses((status = 200, description = "Matches, newest first", body = Vec<Match>)),
)]
pub async fn list_room_matches(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<Match>>, ApiError> {
    Ok(Json(state.stores.matches.list_by_room(&room_id).await?))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/almost-matches
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/almost-matches",
    tag = "Matches",
    params(("room_id" = String, Path, description = "Room ID")),
    responses((status = 200, description = "Movies one like short of a match", body = Vec<AlmostMatch>)),
)]
pub async fn list_almost_matches(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<AlmostMatch>>, ApiError> {
    Ok(Json(state.engine.almost_matches(&room_id).await?))
}

// ---------------------------------------------------------------------------
// GET /api/v1/matches/{match_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/matches/{match_id}",
    tag = "Matches",
    params(("match_id" = String, Path, description = "Match ID")),
    responses(
        (status = 200, description = "Match with movie, room and the users who liked it", body = MatchWithDetails),
        (status = 404, description = "Match not found", body = ApiErrorBody),
    ),
)]
pub async fn get_match(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> Result<Json<MatchWithDetails>, ApiError> {
    Ok(Json(state.engine.match_with_details(&match_id).await?))
}

//! Room lifecycle and membership endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use flickpick_common::id::{prefix, prefixed_ulid};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::movie::Movie;
use crate::models::room::{generate_code, normalize_code, NewRoom, Room, RoomStatus};
use crate::models::user::User;
use crate::store::StoreError;
use crate::AppState;

/// Attempts at finding an unused join code before giving up.
const CODE_ATTEMPTS: usize = 5;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/code/{code}", get(get_room_by_code))
        .route("/rooms/code/{code}/join", post(join_room))
        .route("/rooms/join/{code}", post(join_room))
        .route("/rooms/{room_id}/start", post(start_room))
        .route("/rooms/{room_id}/members", get(list_members))
        .route("/rooms/{room_id}/online", get(list_online))
        .route("/rooms/{room_id}/deck", get(get_deck))
        .route("/rooms/{room_id}/movies", get(get_room_movies))
}

pub(crate) async fn load_room(state: &AppState, room_id: &str) -> Result<Room, ApiError> {
    match state.stores.rooms.get_room(room_id).await {
        Ok(room) => Ok(room),
        Err(StoreError::NotFound) => Err(ApiError::not_found("Room not found")),
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn require_member(
    state: &AppState,
    room_id: &str,
    user_id: &str,
) -> Result<(), ApiError> {
    if state.stores.rooms.is_member(room_id, user_id).await? {
        Ok(())
    } else {
        Err(ApiError::forbidden("You are not a member of this room"))
    }
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub filter_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms",
    tag = "Rooms",
    security(("bearer" = [])),
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created, host joined", body = Room),
        (status = 400, description = "Unknown filter_id", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn create_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let id = prefixed_ulid(prefix::ROOM);
    let filter_id = body.filter_id.as_deref().filter(|f| !f.is_empty());
    if let Some(filter_id) = filter_id {
        match state.stores.filters.get_filter(filter_id).await {
            Ok(_) => {}
            Err(StoreError::NotFound) => {
                return Err(ApiError::validation(vec![FieldError {
                    field: "filter_id".to_string(),
                    message: "does not exist".to_string(),
                }]));
            }
            Err(err) => return Err(err.into()),
        }
    }

    for _ in 0..CODE_ATTEMPTS {
        let code = generate_code();
        let now = Utc::now();
        let result = state
            .stores
            .rooms
            .create_room(NewRoom {
                id: &id,
                code: &code,
                host_id: auth.id(),
                status: RoomStatus::Waiting,
                filter_id,
                created_at: now,
                updated_at: now,
            })
            .await;

        match result {
            Ok(room) => {
                tracing::info!(room_id = %room.id, code = %room.code, host_id = %room.host_id, "room created");
                return Ok((StatusCode::CREATED, Json(room)));
            }
            Err(StoreError::Conflict(_)) => {
                tracing::debug!(code = %code, "join code taken, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(ApiError::internal("Could not allocate a room code"))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/code/{code}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/rooms/code/{code}",
    tag = "Rooms",
    params(("code" = String, Path, description = "Join code, any case")),
    responses(
        (status = 200, description = "Room", body = Room),
        (status = 404, description = "No room with this code", body = ApiErrorBody),
    ),
)]
pub async fn get_room_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Room>, ApiError> {
    Ok(Json(find_by_code(&state, &code).await?))
}

async fn find_by_code(state: &AppState, code: &str) -> Result<Room, ApiError> {
    if normalize_code(code).is_empty() {
        return Err(ApiError::bad_request("Room code required"));
    }
    match state.stores.rooms.get_room_by_code(code).await {
        Ok(room) => Ok(room),
        Err(StoreError::NotFound) => Err(ApiError::not_found("Room not found")),
        Err(err) => Err(err.into()),
    }
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/code/{code}/join (also /api/v1/rooms/join/{code})
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct JoinRoomResponse {
    pub room: Room,
    pub members: Vec<User>,
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms/code/{code}/join",
    tag = "Rooms",
    security(("bearer" = [])),
    params(("code" = String, Path, description = "Join code, any case")),
    responses(
        (status = 200, description = "Joined; current members included", body = JoinRoomResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "No room with this code", body = ApiErrorBody),
    ),
)]
pub async fn join_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<JoinRoomResponse>, ApiError> {
    let room = find_by_code(&state, &code).await?;
    state.stores.rooms.add_member(&room.id, auth.id()).await?;
    let members = state.stores.rooms.get_members(&room.id).await?;

    tracing::info!(room_id = %room.id, user_id = %auth.id(), "room joined");

    Ok(Json(JoinRoomResponse { room, members }))
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/{room_id}/start
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/start",
    tag = "Rooms",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room is now active", body = Room),
        (status = 400, description = "Room already started or finished", body = ApiErrorBody),
        (status = 403, description = "Only the host can start the room", body = ApiErrorBody),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
)]
pub async fn start_room(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Room>, ApiError> {
    let room = load_room(&state, &room_id).await?;
    if room.host_id != auth.id() {
        return Err(ApiError::forbidden("Only the room host can start the room"));
    }
    if room.status != RoomStatus::Waiting {
        return Err(ApiError::bad_request("Room is already started or finished"));
    }

    let room = state
        .stores
        .rooms
        .update_status(&room_id, RoomStatus::Active)
        .await?;

    tracing::info!(room_id = %room.id, "room started");

    Ok(Json(room))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/members
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/members",
    tag = "Rooms",
    params(("room_id" = String, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Members in join order", body = Vec<User>),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
)]
pub async fn list_members(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<User>>, ApiError> {
    let room = load_room(&state, &room_id).await?;
    let mut members = state.stores.rooms.get_members(&room_id).await?;

    // The host is always a member; put them back if the row went missing.
    if members.is_empty() {
        tracing::warn!(room_id = %room_id, host_id = %room.host_id, "room has no members, restoring host");
        state.stores.rooms.add_member(&room_id, &room.host_id).await?;
        members = state.stores.rooms.get_members(&room_id).await?;
    }

    Ok(Json(members))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/online
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct OnlineUsersResponse {
    pub room_id: String,
    pub user_ids: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/online",
    tag = "Rooms",
    params(("room_id" = String, Path, description = "Room ID")),
    responses((status = 200, description = "Users with a live connection", body = OnlineUsersResponse)),
)]
pub async fn list_online(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Json<OnlineUsersResponse> {
    let user_ids = state.hub.online_users(&room_id);
    Json(OnlineUsersResponse { room_id, user_ids })
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/deck
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct DeckParams {
    /// Cards to return, 1 to 100. Defaults to 20 on `/deck` and 100 on
    /// `/movies`.
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/deck",
    tag = "Rooms",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID"), DeckParams),
    responses(
        (status = 200, description = "Movies the caller has not swiped yet, narrowed by the room filter", body = Vec<Movie>),
        (status = 403, description = "Not a member", body = ApiErrorBody),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
)]
pub async fn get_deck(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(params): Query<DeckParams>,
) -> Result<Json<Vec<Movie>>, ApiError> {
    let limit = params.limit.unwrap_or(20);
    Ok(Json(deck(&state, &room_id, auth.id(), limit).await?))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/movies
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/movies",
    tag = "Rooms",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID"), DeckParams),
    responses(
        (status = 200, description = "Same as the deck, with a default limit of 100", body = Vec<Movie>),
        (status = 403, description = "Not a member", body = ApiErrorBody),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
)]
pub async fn get_room_movies(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(params): Query<DeckParams>,
) -> Result<Json<Vec<Movie>>, ApiError> {
    let limit = params.limit.unwrap_or(100);
    Ok(Json(deck(&state, &room_id, auth.id(), limit).await?))
}

async fn deck(
    state: &AppState,
    room_id: &str,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Movie>, ApiError> {
    let room = load_room(state, room_id).await?;
    require_member(state, room_id, user_id).await?;

    let filter = match room.filter_id.as_deref() {
        None => None,
        Some(filter_id) => match state.stores.filters.get_filter(filter_id).await {
            Ok(filter) => Some(filter),
            Err(StoreError::NotFound) => {
                tracing::warn!(room_id = %room_id, filter_id = %filter_id, "room filter missing, serving unfiltered deck");
                None
            }
            Err(err) => return Err(err.into()),
        },
    };

    let deck = state
        .stores
        .movies
        .list_unswiped(room_id, user_id, filter.as_ref(), limit.clamp(1, 100))
        .await?;
    Ok(deck)
}

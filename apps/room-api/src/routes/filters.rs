//! Room deck filters.

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
use crate::models::filter::{Filter, NewFilter};
use crate::store::StoreError;
use crate::AppState;

use super::rooms::load_room;

const MAX_GENRES: usize = 20;
const MAX_MOOD_LEN: usize = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms/{room_id}/filters", post(create_filter).get(get_room_filter))
        .route("/filters/{filter_id}", get(get_filter))
}

fn filter_not_found(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound => ApiError::not_found("Filter not found"),
        other => other.into(),
    }
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/{room_id}/filters
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateFilterRequest {
    #[serde(default)]
    pub genres: Vec<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub duration_min: Option<i32>,
    pub duration_max: Option<i32>,
    /// 0 to 10.
    pub min_rating: Option<f64>,
    pub mood: Option<String>,
}

impl CreateFilterRequest {
    /// Lower-cased, trimmed, de-duplicated genres in request order.
    fn genres(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for genre in &self.genres {
            let genre = genre.trim().to_lowercase();
            if !genre.is_empty() && !out.contains(&genre) {
                out.push(genre);
            }
        }
        out
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let mut reject = |field: &str, message: &str| {
            errors.push(FieldError {
                field: field.to_string(),
                message: message.to_string(),
            })
        };

        if self.genres.len() > MAX_GENRES {
            reject("genres", "too many genres");
        }
        if let (Some(from), Some(to)) = (self.year_from, self.year_to) {
            if from > to {
                reject("year_from", "must not be after year_to");
            }
        }
        if self.duration_min.is_some_and(|d| d < 0) {
            reject("duration_min", "must not be negative");
        }
        if self.duration_max.is_some_and(|d| d < 0) {
            reject("duration_max", "must not be negative");
        }
        if let (Some(min), Some(max)) = (self.duration_min, self.duration_max) {
            if min > max {
                reject("duration_min", "must not exceed duration_max");
            }
        }
        if self
            .min_rating
            .is_some_and(|r| !r.is_finite() || !(0.0..=10.0).contains(&r))
        {
            reject("min_rating", "must be between 0 and 10");
        }
        if self
            .mood
            .as_deref()
            .is_some_and(|m| m.trim().chars().count() > MAX_MOOD_LEN)
        {
            reject("mood", "too long");
        }
        errors
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/filters",
    tag = "Filters",
    security(("bearer" = [])),
    params(("room_id" = String, Path, description = "Room ID")),
    request_body = CreateFilterRequest,
    responses(
        (status = 201, description = "Filter created and applied to the room's deck", body = Filter),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 403, description = "Only the host can set filters", body = ApiErrorBody),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
)]
pub async fn create_filter(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<CreateFilterRequest>,
) -> Result<(StatusCode, Json<Filter>), ApiError> {
    let errors = body.validate();
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let room = load_room(&state, &room_id).await?;
    if room.host_id != auth.id() {
        return Err(ApiError::forbidden("Only the room host can set filters"));
    }

    let id = prefixed_ulid(prefix::FILTER);
    let genres = body.genres();
    let now = Utc::now();
    let filter = state
        .stores
        .filters
        .create_filter(NewFilter {
            id: &id,
            room_id: &room_id,
            genres: &genres,
            year_from: body.year_from,
            year_to: body.year_to,
            duration_min: body.duration_min,
            duration_max: body.duration_max,
            min_rating: body.min_rating,
            mood: body.mood.as_deref().map(str::trim).filter(|m| !m.is_empty()),
            created_at: now,
            updated_at: now,
        })
        .await
        .map_err(|err| match err {
            StoreError::NotFound => ApiError::not_found("Room not found"),
            other => other.into(),
        })?;

    tracing::info!(room_id = %room_id, filter_id = %filter.id, "room filter set");

    Ok((StatusCode::CREATED, Json(filter)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/filters
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/filters",
    tag = "Filters",
    params(("room_id" = String, Path, description = "Room ID")),
    responses(
        (status = 200, description = "The room's newest filter", body = Filter),
        (status = 404, description = "Room or filter not found", body = ApiErrorBody),
    ),
)]
pub async fn get_room_filter(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Filter>, ApiError> {
    load_room(&state, &room_id).await?;
    let filter = state
        .stores
        .filters
        .latest_for_room(&room_id)
        .await
        .map_err(filter_not_found)?;
    Ok(Json(filter))
}

// ---------------------------------------------------------------------------
// GET /api/v1/filters/{filter_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/filters/{filter_id}",
    tag = "Filters",
    params(("filter_id" = String, Path, description = "Filter ID")),
    responses(
        (status = 200, description = "Filter", body = Filter),
        (status = 404, description = "Filter not found", body = ApiErrorBody),
    ),
)]
pub async fn get_filter(
    State(state): State<AppState>,
    Path(filter_id): Path<String>,
) -> Result<Json<Filter>, ApiError> {
    let filter = state
        .stores
        .filters
        .get_filter(&filter_id)
        .await
        .map_err(filter_not_found)?;
    Ok(Json(filter))
}

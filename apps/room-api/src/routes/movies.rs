//! Catalog read endpoints.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, ApiErrorBody};
use crate::models::movie::Movie;
use crate::store::StoreError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/movies", get(list_movies))
        .route("/movies/{movie_id}", get(get_movie))
}

// ---------------------------------------------------------------------------
// GET /api/v1/movies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListMoviesParams {
    /// Page size, 1 to 100. Defaults to 50.
    pub limit: Option<i64>,
    /// Return movies with ids after this one.
    pub after: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListMoviesResponse {
    pub data: Vec<Movie>,
    pub has_more: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/movies",
    tag = "Movies",
    params(ListMoviesParams),
    responses((status = 200, description = "Catalog page ordered by id", body = ListMoviesResponse)),
)]
pub async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<ListMoviesParams>,
) -> Result<Json<ListMoviesResponse>, ApiError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    let rows = state
        .stores
        .movies
        .list_movies(params.after.as_deref(), limit + 1)
        .await?;

    let has_more = rows.len() as i64 > limit;
    let data = rows.into_iter().take(limit as usize).collect();

    Ok(Json(ListMoviesResponse { data, has_more }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/movies/{movie_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/movies/{movie_id}",
    tag = "Movies",
    params(("movie_id" = String, Path, description = "Movie ID")),
    responses(
        (status = 200, description = "Catalog entry", body = Movie),
        (status = 404, description = "Movie not found", body = ApiErrorBody),
    ),
)]
pub async fn get_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> Result<Json<Movie>, ApiError> {
    match state.stores.movies.get_movie(&movie_id).await {
        Ok(movie) => Ok(Json(movie)),
        Err(StoreError::NotFound) => Err(ApiError::not_found("Movie not found")),
        Err(err) => Err(err.into()),
    }
}

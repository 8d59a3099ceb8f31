pub mod filters;
pub mod health;
pub mod matches;
pub mod movies;
pub mod rooms;
pub mod swipes;
pub mod users;

use axum::Router;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api/v1",
            users::router()
                .merge(rooms::router())
                .merge(swipes::router())
                .merge(matches::router())
                .merge(movies::router())
                .merge(filters::router())
                .merge(crate::gateway::server::api_router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
            components.add_security_scheme(
                "legacy_user",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-User-ID"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Users
        users::create_user,
        users::get_me,
        users::get_user,
        users::get_statistics,
        // Rooms
        rooms::create_room,
        rooms::get_room_by_code,
        rooms::join_room,
        rooms::start_room,
        rooms::list_members,
        rooms::list_online,
        rooms::get_deck,
        rooms::get_room_movies,
        // Filters
        filters::create_filter,
        filters::get_room_filter,
        filters::get_filter,
        // Swipes
        swipes::create_swipe,
        swipes::list_swipes,
        swipes::undo_swipe,
        swipes::undo_room_swipe,
        // Matches
        matches::list_room_matches,
        matches::list_almost_matches,
        matches::get_match,
        // Movies
        movies::list_movies,
        movies::get_movie,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::user::User,
            crate::models::user_statistics::UserStatistics,
            crate::models::filter::Filter,
            crate::models::room::Room,
            crate::models::room::RoomStatus,
            crate::models::movie::Movie,
            crate::models::swipe::Swipe,
            crate::models::swipe::SwipeDirection,
            crate::models::room_match::Match,
            crate::models::room_match::MatchWithDetails,
            crate::models::room_match::AlmostMatch,
            // Route request/response types
            health::HealthResponse,
            users::CreateUserRequest,
            rooms::CreateRoomRequest,
            rooms::JoinRoomResponse,
            rooms::OnlineUsersResponse,
            filters::CreateFilterRequest,
            swipes::CreateSwipeRequest,
            swipes::SwipeWithMatch,
            swipes::UndoSwipeRequest,
            swipes::UndoSwipeResponse,
            movies::ListMoviesResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Users", description = "User profiles"),
        (name = "Rooms", description = "Rooms and membership"),
        (name = "Filters", description = "Room deck filters"),
        (name = "Swipes", description = "Swiping and undo"),
        (name = "Matches", description = "Matches and near-matches"),
        (name = "Movies", description = "Movie catalog"),
    )
)]
pub struct ApiDoc;

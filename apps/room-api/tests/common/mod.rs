#![allow(dead_code)]

use axum::Router;
use axum_test::TestServer;
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};

use flickpick_common::id::{prefix, prefixed_ulid};
use room_api::auth::identity::Claims;
use room_api::config::{Config, HubConfig};
use room_api::models::movie::{Movie, NewMovie};
use room_api::models::user::{NewUser, User};
use room_api::store::Stores;
use room_api::AppState;

pub const TEST_JWT_SECRET: &str = "room-api-test-secret";

/// AppState on in-memory stores with bearer auth and the legacy header
/// both enabled.
pub async fn test_state() -> AppState {
    test_state_with_hub(HubConfig::default()).await
}

/// Like [`test_state`], with custom keepalive settings. Values are used as
/// given, without the environment floors.
pub async fn test_state_with_hub(hub: HubConfig) -> AppState {
    let config = Config {
        jwt_secret: Some(TEST_JWT_SECRET.to_string()),
        allow_legacy_user_header: true,
        hub,
        ..Config::default()
    };
    AppState::new(config, Stores::memory())
}

pub async fn test_app() -> (Router, AppState) {
    let state = test_state().await;
    let app = room_api::routes::router().with_state(state.clone());
    (app, state)
}

pub async fn test_server() -> (TestServer, AppState) {
    let (app, state) = test_app().await;
    (TestServer::new(app).unwrap(), state)
}

/// Mint a bearer token for `user_id`, valid for five minutes.
pub fn mint_token(user_id: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: Some((Utc::now() + chrono::Duration::seconds(300)).timestamp()),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("mint test token")
}

pub fn bearer(user_id: &str) -> String {
    format!("Bearer {}", mint_token(user_id))
}

pub async fn create_user(state: &AppState, username: &str) -> User {
    let id = prefixed_ulid(prefix::USER);
    state
        .stores
        .users
        .create_user(NewUser {
            id: &id,
            username,
            avatar_url: None,
            created_at: Utc::now(),
        })
        .await
        .expect("create test user")
}

/// Insert `count` movies with ids `mov_00`, `mov_01`, ...
pub async fn seed_movies(state: &AppState, count: usize) -> Vec<Movie> {
    let mut movies = Vec::with_capacity(count);
    for i in 0..count {
        let id = format!("mov_{i:02}");
        let title = format!("Movie {i}");
        let movie = state
            .stores
            .movies
            .create_movie(NewMovie {
                id: &id,
                title: &title,
                title_en: None,
                poster_url: None,
                year: Some(2000 + i as i32),
                genre: Some("drama"),
                duration_minutes: Some(100),
                description: None,
                created_at: Utc::now(),
            })
            .await
            .expect("seed movie");
        movies.push(movie);
    }
    movies
}

/// Create a room hosted by `host` through the API and return its JSON.
pub async fn create_room(server: &TestServer, host: &User) -> serde_json::Value {
    let resp = server
        .post("/api/v1/rooms")
        .add_header("authorization", bearer(&host.id))
        .json(&serde_json::json!({}))
        .await;
    resp.assert_status(http::StatusCode::CREATED);
    resp.json()
}

/// Join `room` by its code through the API.
pub async fn join_room(server: &TestServer, room: &serde_json::Value, user: &User) {
    let code = room["code"].as_str().unwrap();
    server
        .post(&format!("/api/v1/rooms/code/{code}/join"))
        .add_header("authorization", bearer(&user.id))
        .await
        .assert_status_ok();
}

pub async fn swipe(
    server: &TestServer,
    room_id: &str,
    user: &User,
    movie_id: &str,
    direction: &str,
) -> axum_test::TestResponse {
    server
        .post(&format!("/api/v1/rooms/{room_id}/swipes"))
        .add_header("authorization", bearer(&user.id))
        .json(&serde_json::json!({ "movie_id": movie_id, "direction": direction }))
        .await
}

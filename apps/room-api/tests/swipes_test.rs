mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use flickpick_common::id::{has_prefix, prefix};

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/{room_id}/swipes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn last_like_returns_swipe_with_match() {
    let (server, state) = common::test_server().await;
    let alice = common::create_user(&state, "alice").await;
    let bob = common::create_user(&state, "bob").await;
    let movies = common::seed_movies(&state, 1).await;
    let room = common::create_room(&server, &alice).await;
    common::join_room(&server, &room, &bob).await;
    let room_id = room["id"].as_str().unwrap();

    let resp = common::swipe(&server, room_id, &alice, &movies[0].id, "like").await;
    resp.assert_status_ok();
    let first: serde_json::Value = resp.json();
    assert_eq!(first["direction"], "right");
    assert!(first.get("match").is_none());
    assert!(first["id"].is_string());

    let resp = common::swipe(&server, room_id, &bob, &movies[0].id, "right").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["swipe"]["user_id"], bob.id.as_str());
    assert_eq!(body["match"]["room_id"], room_id);
    assert_eq!(body["match"]["movie_id"], "mov_00");
    assert_eq!(body["match"]["movie"]["title"], "Movie 0");
    assert_eq!(body["match"]["room"]["id"], room_id);
    assert_eq!(body["match"]["users"].as_array().unwrap().len(), 2);
    assert!(has_prefix(body["match"]["id"].as_str().unwrap(), prefix::MATCH));

    let resp = server.get(&format!("/api/v1/rooms/{room_id}/matches")).await;
    let matches: Vec<serde_json::Value> = resp.json();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["id"], body["match"]["id"]);
}

#[tokio::test]
async fn dislike_never_completes_a_match() {
    let (server, state) = common::test_server().await;
    let alice = common::create_user(&state, "alice").await;
    let bob = common::create_user(&state, "bob").await;
    let movies = common::seed_movies(&state, 1).await;
    let room = common::create_room(&server, &alice).await;
    common::join_room(&server, &room, &bob).await;
    let room_id = room["id"].as_str().unwrap();

    common::swipe(&server, room_id, &alice, &movies[0].id, "like")
        .await
        .assert_status_ok();
    let resp = common::swipe(&server, room_id, &bob, &movies[0].id, "dislike").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["direction"], "left");
    assert!(body.get("match").is_none());

    let matches: Vec<serde_json::Value> = server
        .get(&format!("/api/v1/rooms/{room_id}/matches"))
        .await
        .json();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn second_swipe_on_same_movie_conflicts() {
    let (server, state) = common::test_server().await;
    let alice = common::create_user(&state, "alice").await;
    let movies = common::seed_movies(&state, 1).await;
    let room = common::create_room(&server, &alice).await;
    let room_id = room["id"].as_str().unwrap();

    common::swipe(&server, room_id, &alice, &movies[0].id, "left")
        .await
        .assert_status_ok();

    let resp = common::swipe(&server, room_id, &alice, &movies[0].id, "right").await;
    resp.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["message"], "Already swiped this movie");
}

#[tokio::test]
async fn swipe_requires_membership_and_room() {
    let (server, state) = common::test_server().await;
    let alice = common::create_user(&state, "alice").await;
    let outsider = common::create_user(&state, "outsider").await;
    let room = common::create_room(&server, &alice).await;
    let room_id = room["id"].as_str().unwrap();

    common::swipe(&server, room_id, &outsider, "mov_00", "like")
        .await
        .assert_status(StatusCode::FORBIDDEN);

    common::swipe(&server, "room_missing", &alice, "mov_00", "like")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn swipe_rejects_blank_movie_id() {
    let (server, state) = common::test_server().await;
    let alice = common::create_user(&state, "alice").await;
    let room = common::create_room(&server, &alice).await;
    let room_id = room["id"].as_str().unwrap();

    let resp = common::swipe(&server, room_id, &alice, "  ", "like").await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["details"][0]["field"], "movie_id");
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/swipes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_swipes_is_newest_first() {
    let (server, state) = common::test_server().await;
    let alice = common::create_user(&state, "alice").await;
    let movies = common::seed_movies(&state, 2).await;
    let room = common::create_room(&server, &alice).await;
    let room_id = room["id"].as_str().unwrap();

    for movie in &movies {
        common::swipe(&server, room_id, &alice, &movie.id, "left")
            .await
            .assert_status_ok();
    }

    let resp = server
        .get(&format!("/api/v1/rooms/{room_id}/swipes"))
        .add_header(AUTHORIZATION, common::bearer(&alice.id))
        .await;
    resp.assert_status_ok();
    let swipes: Vec<serde_json::Value> = resp.json();
    let ids: Vec<&str> = swipes.iter().map(|s| s["movie_id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["mov_01", "mov_00"]);
}

// ---------------------------------------------------------------------------
// POST /api/v1/swipes/undo
// ---------------------------------------------------------------------------

#[tokio::test]
async fn undo_removes_most_recent_swipe() {
    let (server, state) = common::test_server().await;
    let alice = common::create_user(&state, "alice").await;
    let movies = common::seed_movies(&state, 2).await;
    let room = common::create_room(&server, &alice).await;
    let room_id = room["id"].as_str().unwrap();

    for movie in &movies {
        common::swipe(&server, room_id, &alice, &movie.id, "right")
            .await
            .assert_status_ok();
    }

    let resp = server
        .post("/api/v1/swipes/undo")
        .add_header(AUTHORIZATION, common::bearer(&alice.id))
        .json(&serde_json::json!({ "room_id": room_id }))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["message"], "Swipe undone successfully");
    assert_eq!(body["swipe"]["movie_id"], "mov_01");

    // The undone movie is back in the deck and can be swiped again.
    common::swipe(&server, room_id, &alice, "mov_01", "left")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn undo_without_swipes_is_not_found() {
    let (server, state) = common::test_server().await;
    let alice = common::create_user(&state, "alice").await;
    let room = common::create_room(&server, &alice).await;

    let resp = server
        .post("/api/v1/swipes/undo")
        .add_header(AUTHORIZATION, common::bearer(&alice.id))
        .json(&serde_json::json!({ "room_id": room["id"] }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["message"], "No swipe found to undo");
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/{room_id}/swipes/undo
// ---------------------------------------------------------------------------

#[tokio::test]
async fn room_scoped_undo_takes_the_room_from_the_path() {
    let (server, state) = common::test_server().await;
    let alice = common::create_user(&state, "alice").await;
    let movies = common::seed_movies(&state, 2).await;
    let room = common::create_room(&server, &alice).await;
    let other = common::create_room(&server, &alice).await;
    let room_id = room["id"].as_str().unwrap();
    let other_id = other["id"].as_str().unwrap();

    common::swipe(&server, room_id, &alice, &movies[0].id, "right")
        .await
        .assert_status_ok();
    common::swipe(&server, other_id, &alice, &movies[1].id, "left")
        .await
        .assert_status_ok();

    let resp = server
        .post(&format!("/api/v1/rooms/{room_id}/swipes/undo"))
        .add_header(AUTHORIZATION, common::bearer(&alice.id))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["message"], "Swipe undone successfully");
    assert_eq!(body["swipe"]["room_id"], room_id);
    assert_eq!(body["swipe"]["movie_id"], "mov_00");

    server
        .post(&format!("/api/v1/rooms/{room_id}/swipes/undo"))
        .add_header(AUTHORIZATION, common::bearer(&alice.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // The other room's swipe is untouched.
    let resp = server
        .get(&format!("/api/v1/rooms/{other_id}/swipes"))
        .add_header(AUTHORIZATION, common::bearer(&alice.id))
        .await;
    let swipes: Vec<serde_json::Value> = resp.json();
    assert_eq!(swipes.len(), 1);
}

#[tokio::test]
async fn swipes_from_instances_with_distinct_workers_get_distinct_ids() {
    use room_api::config::Config;
    use room_api::store::Stores;
    use room_api::AppState;

    let stores = Stores::memory();
    let a = AppState::new(
        Config {
            snowflake_worker_id: 1,
            ..Config::default()
        },
        stores.clone(),
    );
    let b = AppState::new(
        Config {
            snowflake_worker_id: 2,
            ..Config::default()
        },
        stores,
    );

    let mut seen = std::collections::HashSet::new();
    for _ in 0..500 {
        assert!(seen.insert(a.snowflake.generate()));
        assert!(seen.insert(b.snowflake.generate()));
    }
}

mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;

// ---------------------------------------------------------------------------
// POST /api/v1/rooms
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_room_adds_host_as_member() {
    let (server, state) = common::test_server().await;
    let host = common::create_user(&state, "host").await;

    let room = common::create_room(&server, &host).await;
    assert_eq!(room["host_id"], host.id.as_str());
    assert_eq!(room["status"], "waiting");
    assert_eq!(room["code"].as_str().unwrap().len(), 6);

    let room_id = room["id"].as_str().unwrap();
    let resp = server.get(&format!("/api/v1/rooms/{room_id}/members")).await;
    resp.assert_status_ok();
    let members: Vec<serde_json::Value> = resp.json();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["id"], host.id.as_str());
}

#[tokio::test]
async fn create_room_requires_identity() {
    let (server, _state) = common::test_server().await;

    let resp = server
        .post("/api/v1/rooms")
        .json(&serde_json::json!({}))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn legacy_user_header_identifies_existing_users_only() {
    let (server, state) = common::test_server().await;
    let user = common::create_user(&state, "legacy").await;

    let resp = server
        .get("/api/v1/users/me")
        .add_header("x-user-id", user.id.clone())
        .await;
    resp.assert_status_ok();
    let me: serde_json::Value = resp.json();
    assert_eq!(me["username"], "legacy");

    server
        .get("/api/v1/users/me")
        .add_header("x-user-id", "usr_nobody")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_bearer_falls_back_to_legacy_header() {
    let (server, state) = common::test_server().await;
    let user = common::create_user(&state, "fallback").await;

    let resp = server
        .get("/api/v1/users/me")
        .add_header(AUTHORIZATION, "Bearer not-a-jwt")
        .add_header("x-user-id", user.id.clone())
        .await;
    resp.assert_status_ok();
    let me: serde_json::Value = resp.json();
    assert_eq!(me["id"], user.id.as_str());
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/code/{code}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn room_code_lookup_ignores_case() {
    let (server, state) = common::test_server().await;
    let host = common::create_user(&state, "host").await;
    let room = common::create_room(&server, &host).await;

    let lower = room["code"].as_str().unwrap().to_ascii_lowercase();
    let resp = server.get(&format!("/api/v1/rooms/code/{lower}")).await;
    resp.assert_status_ok();
    let found: serde_json::Value = resp.json();
    assert_eq!(found["id"], room["id"]);

    server
        .get("/api/v1/rooms/code/ZZZZZZ")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/code/{code}/join
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_room_returns_members_and_is_idempotent() {
    let (server, state) = common::test_server().await;
    let host = common::create_user(&state, "host").await;
    let guest = common::create_user(&state, "guest").await;
    let room = common::create_room(&server, &host).await;
    let code = room["code"].as_str().unwrap();

    // Both the code-scoped path and the short form join the same room.
    let lower = code.to_lowercase();
    for path in [
        format!("/api/v1/rooms/code/{code}/join"),
        format!("/api/v1/rooms/join/{lower}"),
    ] {
        let resp = server
            .post(&path)
            .add_header(AUTHORIZATION, common::bearer(&guest.id))
            .await;
        resp.assert_status_ok();
        let body: serde_json::Value = resp.json();
        assert_eq!(body["room"]["id"], room["id"]);
        let ids: Vec<&str> = body["members"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![host.id.as_str(), guest.id.as_str()]);
    }
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/{room_id}/start
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_host_can_start_room_once() {
    let (server, state) = common::test_server().await;
    let host = common::create_user(&state, "host").await;
    let guest = common::create_user(&state, "guest").await;
    let room = common::create_room(&server, &host).await;
    common::join_room(&server, &room, &guest).await;
    let room_id = room["id"].as_str().unwrap();

    server
        .post(&format!("/api/v1/rooms/{room_id}/start"))
        .add_header(AUTHORIZATION, common::bearer(&guest.id))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let resp = server
        .post(&format!("/api/v1/rooms/{room_id}/start"))
        .add_header(AUTHORIZATION, common::bearer(&host.id))
        .await;
    resp.assert_status_ok();
    let started: serde_json::Value = resp.json();
    assert_eq!(started["status"], "active");

    server
        .post(&format!("/api/v1/rooms/{room_id}/start"))
        .add_header(AUTHORIZATION, common::bearer(&host.id))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn members_of_unknown_room_is_not_found() {
    let (server, _state) = common::test_server().await;
    server
        .get("/api/v1/rooms/room_missing/members")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/deck
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deck_skips_swiped_movies() {
    let (server, state) = common::test_server().await;
    let host = common::create_user(&state, "host").await;
    let movies = common::seed_movies(&state, 3).await;
    let room = common::create_room(&server, &host).await;
    let room_id = room["id"].as_str().unwrap();

    common::swipe(&server, room_id, &host, &movies[1].id, "left")
        .await
        .assert_status_ok();

    let resp = server
        .get(&format!("/api/v1/rooms/{room_id}/deck"))
        .add_header(AUTHORIZATION, common::bearer(&host.id))
        .await;
    resp.assert_status_ok();
    let deck: Vec<serde_json::Value> = resp.json();
    let ids: Vec<&str> = deck.iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["mov_00", "mov_02"]);
}

#[tokio::test]
async fn deck_requires_membership() {
    let (server, state) = common::test_server().await;
    let host = common::create_user(&state, "host").await;
    let outsider = common::create_user(&state, "outsider").await;
    let room = common::create_room(&server, &host).await;
    let room_id = room["id"].as_str().unwrap();

    server
        .get(&format!("/api/v1/rooms/{room_id}/deck"))
        .add_header(AUTHORIZATION, common::bearer(&outsider.id))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/movies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn room_movies_serves_the_deck_with_a_larger_default() {
    let (server, state) = common::test_server().await;
    let host = common::create_user(&state, "host").await;
    let movies = common::seed_movies(&state, 25).await;
    let room = common::create_room(&server, &host).await;
    let room_id = room["id"].as_str().unwrap();

    common::swipe(&server, room_id, &host, &movies[0].id, "right")
        .await
        .assert_status_ok();

    let resp = server
        .get(&format!("/api/v1/rooms/{room_id}/movies"))
        .add_header(AUTHORIZATION, common::bearer(&host.id))
        .await;
    resp.assert_status_ok();
    let listed: Vec<serde_json::Value> = resp.json();
    assert_eq!(listed.len(), 24);
    assert_eq!(listed[0]["id"], "mov_01");

    let resp = server
        .get(&format!("/api/v1/rooms/{room_id}/deck"))
        .add_header(AUTHORIZATION, common::bearer(&host.id))
        .await;
    let deck: Vec<serde_json::Value> = resp.json();
    assert_eq!(deck.len(), 20);
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/online
// ---------------------------------------------------------------------------

#[tokio::test]
async fn online_is_empty_without_connections() {
    let (server, _state) = common::test_server().await;

    let resp = server.get("/api/v1/rooms/room_quiet/online").await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["room_id"], "room_quiet");
    assert_eq!(body["user_ids"], serde_json::json!([]));
}

// ---------------------------------------------------------------------------
// GET /api/v1/movies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn movie_catalog_pages_by_id() {
    let (server, state) = common::test_server().await;
    common::seed_movies(&state, 3).await;

    let resp = server.get("/api/v1/movies?limit=2").await;
    resp.assert_status_ok();
    let page: serde_json::Value = resp.json();
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["has_more"], true);

    let resp = server.get("/api/v1/movies?limit=2&after=mov_01").await;
    let page: serde_json::Value = resp.json();
    assert_eq!(page["data"][0]["id"], "mov_02");
    assert_eq!(page["has_more"], false);

    server
        .get("/api/v1/movies/mov_99")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

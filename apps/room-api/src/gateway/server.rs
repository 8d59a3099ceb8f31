//! WebSocket upgrade route for room connections.

use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::auth::identity::{self, WsCredentials};
use crate::error::ApiError;
use crate::store::StoreError;
use crate::AppState;

use super::connection::{self, Peer};

pub fn router() -> Router<AppState> {
    Router::new().route("/ws/rooms/{room_id}", get(ws_upgrade))
}

/// The same upgrade, mounted under the versioned API prefix.
pub fn api_router() -> Router<AppState> {
    Router::new().route("/rooms/{room_id}/ws", get(ws_upgrade))
}

/// Identity and room are checked before the upgrade, so a rejected request
/// never touches the hub.
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<WsCredentials>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = identity::ws_credentials(&headers, &query);
    let user =
        identity::resolve_user(&credentials, &state.config, state.stores.users.as_ref()).await?;

    match state.stores.rooms.get_room(&room_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound) => return Err(ApiError::not_found("Room not found")),
        Err(err) => return Err(err.into()),
    }

    tracing::debug!(room_id = %room_id, user_id = %user.id, "websocket upgrade accepted");

    let peer = Peer {
        room_id,
        user_id: user.id,
        username: Some(user.username),
    };
    let hub = state.hub.clone();
    Ok(ws
        .on_failed_upgrade(|err| tracing::debug!(?err, "websocket upgrade failed"))
        .on_upgrade(move |socket| connection::serve(socket, hub, peer)))
}

use std::net::SocketAddr;
use std::path::Path;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use room_api::config::Config;
use room_api::gateway::RoomHub;
use room_api::routes::ApiDoc;
use room_api::store::Stores;
use room_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing, env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;
    let shutdown_timeout = config.shutdown_timeout;

    let stores = match config.database_url.as_deref() {
        Some(url) => {
            let pool = room_api::db::pool::connect(url).expect("failed to build connection pool");
            Stores::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores (data is lost on exit)");
            Stores::memory()
        }
    };

    if config.jwt_secret.is_none() {
        tracing::warn!("JWT_SECRET not set, bearer tokens will be rejected");
    }

    tracing::info!(
        send_queue = config.hub.send_queue,
        ping_interval_secs = config.hub.ping_interval.as_secs(),
        read_timeout_secs = config.hub.read_timeout.as_secs(),
        legacy_user_header = config.allow_legacy_user_header,
        snowflake_worker_id = config.snowflake_worker_id,
        "room-api configured"
    );

    let state = AppState::new(config, stores);
    let hub = state.hub.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(room_api::routes::router())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "room-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub.clone()))
        .await
        .expect("server error");

    if hub.wait_idle(shutdown_timeout).await {
        tracing::info!("all room connections closed");
    } else {
        tracing::warn!(timeout_secs = shutdown_timeout.as_secs(), "room connections still open at shutdown deadline");
    }
}

/// Resolve on SIGINT or SIGTERM, then tell every room connection to close.
async fn shutdown_signal(hub: RoomHub) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(?err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(?err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
    hub.close_all();
}

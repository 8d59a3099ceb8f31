pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod matching;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use config::Config;
use flickpick_common::SnowflakeGenerator;
use gateway::RoomHub;
use matching::MatchEngine;
use store::Stores;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub engine: MatchEngine,
    pub hub: RoomHub,
    pub config: Arc<Config>,
    pub snowflake: Arc<SnowflakeGenerator>,
}

impl AppState {
    /// Wire the engine and spawn the hub task. Must be called inside a tokio
    /// runtime.
    pub fn new(config: Config, stores: Stores) -> Self {
        Self {
            engine: MatchEngine::new(stores.clone()),
            hub: RoomHub::spawn(config.hub),
            snowflake: Arc::new(SnowflakeGenerator::new(config.snowflake_worker_id)),
            config: Arc::new(config),
            stores,
        }
    }
}

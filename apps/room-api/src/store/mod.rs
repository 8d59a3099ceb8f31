//! Storage capabilities consumed by the match engine and the REST layer.
//!
//! Every store is an `async_trait` object so the engine can run against the
//! in-memory implementation in tests and against PostgreSQL in production.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::db::pool::DbPool;
use crate::models::filter::{Filter, NewFilter};
use crate::models::movie::{Movie, NewMovie};
use crate::models::room::{NewRoom, Room, RoomStatus};
use crate::models::room_match::{Match, NewMatch};
use crate::models::swipe::{NewSwipe, Swipe};
use crate::models::user::{NewUser, User};
use crate::models::user_statistics::UserStatistics;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: NewUser<'_>) -> Result<User, StoreError>;
    async fn get_user(&self, user_id: &str) -> Result<User, StoreError>;
    /// Swipe, match and room counters. All zero for a user with no activity.
    async fn statistics(&self, user_id: &str) -> Result<UserStatistics, StoreError>;
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Insert the room and add its host as the first member.
    async fn create_room(&self, room: NewRoom<'_>) -> Result<Room, StoreError>;
    async fn get_room(&self, room_id: &str) -> Result<Room, StoreError>;
    /// Case-insensitive lookup; `code` is compared after trimming.
    async fn get_room_by_code(&self, code: &str) -> Result<Room, StoreError>;
    /// Idempotent: joining twice keeps the original join time.
    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<(), StoreError>;
    async fn is_member(&self, room_id: &str, user_id: &str) -> Result<bool, StoreError>;
    /// Members in join order.
    async fn get_members(&self, room_id: &str) -> Result<Vec<User>, StoreError>;
    async fn update_status(&self, room_id: &str, status: RoomStatus) -> Result<Room, StoreError>;
}

#[async_trait]
pub trait MovieStore: Send + Sync {
    async fn create_movie(&self, movie: NewMovie<'_>) -> Result<Movie, StoreError>;
    async fn get_movie(&self, movie_id: &str) -> Result<Movie, StoreError>;
    /// Catalog page ordered by id, starting after `after`.
    async fn list_movies(&self, after: Option<&str>, limit: i64) -> Result<Vec<Movie>, StoreError>;
    /// Movies `user_id` has not swiped yet in `room_id`, narrowed by
    /// `filter` when given, ordered by id.
    async fn list_unswiped(
        &self,
        room_id: &str,
        user_id: &str,
        filter: Option<&Filter>,
        limit: i64,
    ) -> Result<Vec<Movie>, StoreError>;
}

#[async_trait]
pub trait FilterStore: Send + Sync {
    /// Insert the filter and point its room's `filter_id` at it.
    /// `NotFound` when the room does not exist.
    async fn create_filter(&self, filter: NewFilter<'_>) -> Result<Filter, StoreError>;
    async fn get_filter(&self, filter_id: &str) -> Result<Filter, StoreError>;
    /// The room's most recently created filter.
    async fn latest_for_room(&self, room_id: &str) -> Result<Filter, StoreError>;
}

#[async_trait]
pub trait SwipeStore: Send + Sync {
    /// Rejects a second swipe on the same (user, room, movie) with `Conflict`.
    async fn record_swipe(&self, swipe: NewSwipe<'_>) -> Result<Swipe, StoreError>;
    /// Delete and return the user's most recent swipe in the room.
    async fn undo_last_swipe(&self, user_id: &str, room_id: &str) -> Result<Swipe, StoreError>;
    async fn has_swiped(
        &self,
        user_id: &str,
        room_id: &str,
        movie_id: &str,
    ) -> Result<bool, StoreError>;
    /// Newest first.
    async fn list_user_swipes(&self, user_id: &str, room_id: &str) -> Result<Vec<Swipe>, StoreError>;
    /// Distinct users with at least one swipe in the room, in order of their
    /// first swipe.
    async fn list_active_user_ids(&self, room_id: &str) -> Result<Vec<String>, StoreError>;
    /// Distinct users who liked `movie_id` in the room.
    async fn list_likers(&self, room_id: &str, movie_id: &str) -> Result<Vec<String>, StoreError>;
    /// Distinct movies with at least one like in the room, in order of their
    /// first like.
    async fn list_liked_items(&self, room_id: &str) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn exists(&self, room_id: &str, movie_id: &str) -> Result<bool, StoreError>;
    async fn find(&self, room_id: &str, movie_id: &str) -> Result<Option<Match>, StoreError>;
    /// Fails with `Conflict` when (room, movie) already has a match.
    async fn create(&self, new_match: NewMatch<'_>) -> Result<Match, StoreError>;
    /// Newest first.
    async fn list_by_room(&self, room_id: &str) -> Result<Vec<Match>, StoreError>;
    async fn get_by_id(&self, match_id: &str) -> Result<Match, StoreError>;
}

/// All store handles, cloned into `AppState`.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub rooms: Arc<dyn RoomStore>,
    pub movies: Arc<dyn MovieStore>,
    pub swipes: Arc<dyn SwipeStore>,
    pub matches: Arc<dyn MatchStore>,
    pub filters: Arc<dyn FilterStore>,
}

impl Stores {
    /// Stores backed by a single shared in-memory database.
    pub fn memory() -> Self {
        let db = Arc::new(memory::MemoryDb::new());
        Self {
            users: db.clone(),
            rooms: db.clone(),
            movies: db.clone(),
            swipes: db.clone(),
            matches: db.clone(),
            filters: db,
        }
    }

    pub fn postgres(pool: DbPool) -> Self {
        let pg = Arc::new(postgres::PgStore::new(pool));
        Self {
            users: pg.clone(),
            rooms: pg.clone(),
            movies: pg.clone(),
            swipes: pg.clone(),
            matches: pg.clone(),
            filters: pg,
        }
    }
}

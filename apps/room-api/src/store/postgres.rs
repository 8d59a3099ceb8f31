//! PostgreSQL implementation of the store traits on top of `diesel-async`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, OptionalExtension};
use diesel::sql_types::{Nullable, Text};
use diesel_async::pooled_connection::deadpool::PoolError;
use diesel_async::{AsyncConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;

use crate::db::pool::DbPool;
use crate::db::schema::{filters, matches, movies, room_members, rooms, swipes, users};
use crate::models::filter::{Filter, NewFilter};
use crate::models::movie::{Movie, NewMovie};
use crate::models::room::{normalize_code, NewRoom, NewRoomMember, Room, RoomStatus};
use crate::models::room_match::{Match, NewMatch};
use crate::models::swipe::{NewSwipe, Swipe, SwipeDirection};
use crate::models::user::{NewUser, User};
use crate::models::user_statistics::UserStatistics;

use super::{FilterStore, MatchStore, MovieStore, RoomStore, StoreError, SwipeStore, UserStore};

diesel::define_sql_function! {
    fn upper(x: Text) -> Text;
}

diesel::define_sql_function! {
    fn lower(x: Nullable<Text>) -> Nullable<Text>;
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => StoreError::NotFound,
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.message().to_string())
            }
            diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                StoreError::NotFound
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<PoolError> for StoreError {
    fn from(err: PoolError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Keep the first occurrence of each value, preserving order.
fn distinct_in_order(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser<'_>) -> Result<User, StoreError> {
        let mut conn = self.pool.get().await?;
        let created = diesel::insert_into(users::table)
            .values(&user)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(created)
    }

    async fn get_user(&self, user_id: &str) -> Result<User, StoreError> {
        let mut conn = self.pool.get().await?;
        let user = users::table
            .find(user_id)
            .select(User::as_select())
            .get_result(&mut conn)
            .await?;
        Ok(user)
    }

    async fn statistics(&self, user_id: &str) -> Result<UserStatistics, StoreError> {
        let mut conn = self.pool.get().await?;

        let total_swipes: i64 = swipes::table
            .filter(swipes::user_id.eq(user_id))
            .count()
            .get_result(&mut conn)
            .await?;
        let liked_movies: i64 = swipes::table
            .filter(swipes::user_id.eq(user_id))
            .filter(swipes::direction.eq(SwipeDirection::Right))
            .count()
            .get_result(&mut conn)
            .await?;

        let member_rooms = room_members::table
            .filter(room_members::user_id.eq(user_id))
            .select(room_members::room_id);
        let total_matches: i64 = matches::table
            .filter(matches::room_id.eq_any(member_rooms))
            .count()
            .get_result(&mut conn)
            .await?;

        let rooms_created: i64 = rooms::table
            .filter(rooms::host_id.eq(user_id))
            .count()
            .get_result(&mut conn)
            .await?;
        let rooms_joined: i64 = room_members::table
            .filter(room_members::user_id.eq(user_id))
            .count()
            .get_result(&mut conn)
            .await?;
        let completed_rooms: i64 = rooms::table
            .inner_join(room_members::table)
            .filter(room_members::user_id.eq(user_id))
            .filter(rooms::status.eq(RoomStatus::Finished))
            .count()
            .get_result(&mut conn)
            .await?;

        Ok(UserStatistics {
            total_swipes,
            liked_movies,
            disliked_movies: total_swipes - liked_movies,
            total_matches,
            rooms_created,
            rooms_joined,
            active_rooms: rooms_joined - completed_rooms,
            completed_rooms,
        })
    }
}

#[async_trait]
impl RoomStore for PgStore {
    async fn create_room(&self, room: NewRoom<'_>) -> Result<Room, StoreError> {
        let mut conn = self.pool.get().await?;

        let created = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    let created: Room = diesel::insert_into(rooms::table)
                        .values(&room)
                        .returning(Room::as_returning())
                        .get_result(conn)
                        .await?;

                    diesel::insert_into(room_members::table)
                        .values(NewRoomMember {
                            room_id: &created.id,
                            user_id: &created.host_id,
                            joined_at: created.created_at,
                        })
                        .on_conflict_do_nothing()
                        .execute(conn)
                        .await?;

                    Ok(created)
                }
                .scope_boxed()
            })
            .await?;

        Ok(created)
    }

    async fn get_room(&self, room_id: &str) -> Result<Room, StoreError> {
        let mut conn = self.pool.get().await?;
        let room = rooms::table
            .find(room_id)
            .select(Room::as_select())
            .get_result(&mut conn)
            .await?;
        Ok(room)
    }

    async fn get_room_by_code(&self, code: &str) -> Result<Room, StoreError> {
        let mut conn = self.pool.get().await?;
        let room = rooms::table
            .filter(upper(rooms::code).eq(normalize_code(code)))
            .select(Room::as_select())
            .first(&mut conn)
            .await?;
        Ok(room)
    }

    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(room_members::table)
            .values(NewRoomMember {
                room_id,
                user_id,
                joined_at: Utc::now(),
            })
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn is_member(&self, room_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        let found: Option<String> = room_members::table
            .filter(room_members::room_id.eq(room_id))
            .filter(room_members::user_id.eq(user_id))
            .select(room_members::user_id)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(found.is_some())
    }

    async fn get_members(&self, room_id: &str) -> Result<Vec<User>, StoreError> {
        let mut conn = self.pool.get().await?;
        let members = users::table
            .inner_join(room_members::table)
            .filter(room_members::room_id.eq(room_id))
            .order((room_members::joined_at.asc(), users::id.asc()))
            .select(User::as_select())
            .load(&mut conn)
            .await?;
        Ok(members)
    }

    async fn update_status(&self, room_id: &str, status: RoomStatus) -> Result<Room, StoreError> {
        let mut conn = self.pool.get().await?;
        let room = diesel::update(rooms::table.find(room_id))
            .set((rooms::status.eq(status), rooms::updated_at.eq(Utc::now())))
            .returning(Room::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(room)
    }
}

#[async_trait]
impl MovieStore for PgStore {
    async fn create_movie(&self, movie: NewMovie<'_>) -> Result<Movie, StoreError> {
        let mut conn = self.pool.get().await?;
        let created = diesel::insert_into(movies::table)
            .values(&movie)
            .returning(Movie::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(created)
    }

    async fn get_movie(&self, movie_id: &str) -> Result<Movie, StoreError> {
        let mut conn = self.pool.get().await?;
        let movie = movies::table
            .find(movie_id)
            .select(Movie::as_select())
            .get_result(&mut conn)
            .await?;
        Ok(movie)
    }

    async fn list_movies(&self, after: Option<&str>, limit: i64) -> Result<Vec<Movie>, StoreError> {
        let mut conn = self.pool.get().await?;
        let mut query = movies::table
            .order(movies::id.asc())
            .limit(limit)
            .select(Movie::as_select())
            .into_boxed();
        if let Some(after) = after {
            query = query.filter(movies::id.gt(after));
        }
        Ok(query.load(&mut conn).await?)
    }

    async fn list_unswiped(
        &self,
        room_id: &str,
        user_id: &str,
        filter: Option<&Filter>,
        limit: i64,
    ) -> Result<Vec<Movie>, StoreError> {
        let mut conn = self.pool.get().await?;
        let swiped = swipes::table
            .filter(swipes::room_id.eq(room_id))
            .filter(swipes::user_id.eq(user_id))
            .select(swipes::movie_id);
        let mut query = movies::table
            .filter(movies::id.ne_all(swiped))
            .order(movies::id.asc())
            .limit(limit)
            .select(Movie::as_select())
            .into_boxed();

        if let Some(filter) = filter {
            if !filter.genres.is_empty() {
                query = query.filter(lower(movies::genre).eq_any(filter.genres.clone()));
            }
            if let Some(from) = filter.year_from {
                query = query.filter(movies::year.ge(from));
            }
            if let Some(to) = filter.year_to {
                query = query.filter(movies::year.le(to));
            }
            if let Some(min) = filter.duration_min {
                query = query.filter(movies::duration_minutes.ge(min));
            }
            if let Some(max) = filter.duration_max {
                query = query.filter(movies::duration_minutes.le(max));
            }
        }

        Ok(query.load(&mut conn).await?)
    }
}

#[async_trait]
impl SwipeStore for PgStore {
    async fn record_swipe(&self, swipe: NewSwipe<'_>) -> Result<Swipe, StoreError> {
        let mut conn = self.pool.get().await?;
        let created = diesel::insert_into(swipes::table)
            .values(&swipe)
            .returning(Swipe::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(created)
    }

    async fn undo_last_swipe(&self, user_id: &str, room_id: &str) -> Result<Swipe, StoreError> {
        let mut conn = self.pool.get().await?;
        let latest_swipe = diesel::alias!(swipes as latest_swipe);
        let latest = latest_swipe
            .filter(latest_swipe.field(swipes::user_id).eq(user_id))
            .filter(latest_swipe.field(swipes::room_id).eq(room_id))
            .order(latest_swipe.field(swipes::id).desc())
            .select(latest_swipe.field(swipes::id))
            .limit(1);
        let undone = diesel::delete(swipes::table.filter(swipes::id.eq_any(latest)))
            .returning(Swipe::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(undone)
    }

    async fn has_swiped(
        &self,
        user_id: &str,
        room_id: &str,
        movie_id: &str,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        let found: Option<i64> = swipes::table
            .filter(swipes::user_id.eq(user_id))
            .filter(swipes::room_id.eq(room_id))
            .filter(swipes::movie_id.eq(movie_id))
            .select(swipes::id)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(found.is_some())
    }

    async fn list_user_swipes(&self, user_id: &str, room_id: &str) -> Result<Vec<Swipe>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows = swipes::table
            .filter(swipes::user_id.eq(user_id))
            .filter(swipes::room_id.eq(room_id))
            .order(swipes::id.desc())
            .select(Swipe::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn list_active_user_ids(&self, room_id: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<String> = swipes::table
            .filter(swipes::room_id.eq(room_id))
            .order(swipes::id.asc())
            .select(swipes::user_id)
            .load(&mut conn)
            .await?;
        Ok(distinct_in_order(rows))
    }

    async fn list_likers(&self, room_id: &str, movie_id: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<String> = swipes::table
            .filter(swipes::room_id.eq(room_id))
            .filter(swipes::movie_id.eq(movie_id))
            .filter(swipes::direction.eq(SwipeDirection::Right))
            .order(swipes::id.asc())
            .select(swipes::user_id)
            .load(&mut conn)
            .await?;
        Ok(distinct_in_order(rows))
    }

    async fn list_liked_items(&self, room_id: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<String> = swipes::table
            .filter(swipes::room_id.eq(room_id))
            .filter(swipes::direction.eq(SwipeDirection::Right))
            .order(swipes::id.asc())
            .select(swipes::movie_id)
            .load(&mut conn)
            .await?;
        Ok(distinct_in_order(rows))
    }
}

#[async_trait]
impl MatchStore for PgStore {
    async fn exists(&self, room_id: &str, movie_id: &str) -> Result<bool, StoreError> {
        Ok(self.find(room_id, movie_id).await?.is_some())
    }

    async fn find(&self, room_id: &str, movie_id: &str) -> Result<Option<Match>, StoreError> {
        let mut conn = self.pool.get().await?;
        let found = matches::table
            .filter(matches::room_id.eq(room_id))
            .filter(matches::movie_id.eq(movie_id))
            .select(Match::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(found)
    }

    async fn create(&self, new_match: NewMatch<'_>) -> Result<Match, StoreError> {
        let mut conn = self.pool.get().await?;
        // The (room_id, movie_id) unique constraint turns a lost race into
        // `StoreError::Conflict`.
        let created = diesel::insert_into(matches::table)
            .values(&new_match)
            .returning(Match::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(created)
    }

    async fn list_by_room(&self, room_id: &str) -> Result<Vec<Match>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows = matches::table
            .filter(matches::room_id.eq(room_id))
            .order((matches::created_at.desc(), matches::id.desc()))
            .select(Match::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn get_by_id(&self, match_id: &str) -> Result<Match, StoreError> {
        let mut conn = self.pool.get().await?;
        let found = matches::table
            .find(match_id)
            .select(Match::as_select())
            .get_result(&mut conn)
            .await?;
        Ok(found)
    }
}

#[async_trait]
impl FilterStore for PgStore {
    async fn create_filter(&self, filter: NewFilter<'_>) -> Result<Filter, StoreError> {
        let mut conn = self.pool.get().await?;

        // A missing room fails the insert's foreign key, which maps to NotFound.
        let created = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    let created: Filter = diesel::insert_into(filters::table)
                        .values(&filter)
                        .returning(Filter::as_returning())
                        .get_result(conn)
                        .await?;

                    diesel::update(rooms::table.find(&created.room_id))
                        .set((
                            rooms::filter_id.eq(&created.id),
                            rooms::updated_at.eq(created.created_at),
                        ))
                        .execute(conn)
                        .await?;

                    Ok(created)
                }
                .scope_boxed()
            })
            .await?;

        Ok(created)
    }

    async fn get_filter(&self, filter_id: &str) -> Result<Filter, StoreError> {
        let mut conn = self.pool.get().await?;
        let found = filters::table
            .find(filter_id)
            .select(Filter::as_select())
            .get_result(&mut conn)
            .await?;
        Ok(found)
    }

    async fn latest_for_room(&self, room_id: &str) -> Result<Filter, StoreError> {
        let mut conn = self.pool.get().await?;
        let found = filters::table
            .filter(filters::room_id.eq(room_id))
            .order((filters::created_at.desc(), filters::id.desc()))
            .select(Filter::as_select())
            .first(&mut conn)
            .await?;
        Ok(found)
    }
}

//! In-memory store used by tests and by the server when no `DATABASE_URL`
//! is configured.
//!
//! A single `parking_lot::Mutex` guards every table, so each trait method is
//! atomic with respect to the others. That gives the same guarantees the
//! PostgreSQL unique constraints give: one swipe per (user, room, movie) and
//! one match per (room, movie).

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::models::filter::{Filter, NewFilter};
use crate::models::movie::{Movie, NewMovie};
use crate::models::room::{normalize_code, NewRoom, Room, RoomMember, RoomStatus};
use crate::models::room_match::{Match, NewMatch};
use crate::models::swipe::{NewSwipe, Swipe};
use crate::models::user::{NewUser, User};
use crate::models::user_statistics::UserStatistics;

use super::{FilterStore, MatchStore, MovieStore, RoomStore, StoreError, SwipeStore, UserStore};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    rooms: HashMap<String, Room>,
    members: Vec<RoomMember>,
    movies: BTreeMap<String, Movie>,
    swipes: Vec<Swipe>,
    matches: Vec<Match>,
    filters: Vec<Filter>,
}

pub struct MemoryDb {
    tables: Mutex<Tables>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

fn push_distinct(seen: &mut HashSet<String>, out: &mut Vec<String>, value: &str) {
    if seen.insert(value.to_string()) {
        out.push(value.to_string());
    }
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn create_user(&self, user: NewUser<'_>) -> Result<User, StoreError> {
        let mut t = self.tables.lock();
        if t.users.contains_key(user.id) {
            return Err(StoreError::Conflict(format!("user {} exists", user.id)));
        }
        let created = User {
            id: user.id.to_string(),
            username: user.username.to_string(),
            avatar_url: user.avatar_url.map(str::to_string),
            created_at: user.created_at,
        };
        t.users.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get_user(&self, user_id: &str) -> Result<User, StoreError> {
        self.tables
            .lock()
            .users
            .get(user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn statistics(&self, user_id: &str) -> Result<UserStatistics, StoreError> {
        let t = self.tables.lock();
        let mut stats = UserStatistics::default();

        for s in t.swipes.iter().filter(|s| s.user_id == user_id) {
            stats.total_swipes += 1;
            if s.direction.is_like() {
                stats.liked_movies += 1;
            } else {
                stats.disliked_movies += 1;
            }
        }

        let member_rooms: HashSet<&str> = t
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.room_id.as_str())
            .collect();
        stats.rooms_joined = member_rooms.len() as i64;
        stats.rooms_created = t.rooms.values().filter(|r| r.host_id == user_id).count() as i64;
        stats.total_matches = t
            .matches
            .iter()
            .filter(|m| member_rooms.contains(m.room_id.as_str()))
            .count() as i64;

        for room in member_rooms.iter().filter_map(|id| t.rooms.get(*id)) {
            match room.status {
                RoomStatus::Finished => stats.completed_rooms += 1,
                RoomStatus::Waiting | RoomStatus::Active => stats.active_rooms += 1,
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl RoomStore for MemoryDb {
    async fn create_room(&self, room: NewRoom<'_>) -> Result<Room, StoreError> {
        let mut t = self.tables.lock();
        let code = normalize_code(room.code);
        if t.rooms.values().any(|r| normalize_code(&r.code) == code) {
            return Err(StoreError::Conflict(format!("room code {code} in use")));
        }
        let created = Room {
            id: room.id.to_string(),
            code: room.code.to_string(),
            host_id: room.host_id.to_string(),
            status: room.status,
            filter_id: room.filter_id.map(str::to_string),
            created_at: room.created_at,
            updated_at: room.updated_at,
        };
        t.rooms.insert(created.id.clone(), created.clone());
        t.members.push(RoomMember {
            room_id: created.id.clone(),
            user_id: created.host_id.clone(),
            joined_at: created.created_at,
        });
        Ok(created)
    }

    async fn get_room(&self, room_id: &str) -> Result<Room, StoreError> {
        self.tables
            .lock()
            .rooms
            .get(room_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_room_by_code(&self, code: &str) -> Result<Room, StoreError> {
        let code = normalize_code(code);
        self.tables
            .lock()
            .rooms
            .values()
            .find(|r| normalize_code(&r.code) == code)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        if !t.rooms.contains_key(room_id) {
            return Err(StoreError::NotFound);
        }
        let already = t
            .members
            .iter()
            .any(|m| m.room_id == room_id && m.user_id == user_id);
        if !already {
            t.members.push(RoomMember {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
                joined_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn is_member(&self, room_id: &str, user_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .lock()
            .members
            .iter()
            .any(|m| m.room_id == room_id && m.user_id == user_id))
    }

    async fn get_members(&self, room_id: &str) -> Result<Vec<User>, StoreError> {
        let t = self.tables.lock();
        Ok(t.members
            .iter()
            .filter(|m| m.room_id == room_id)
            .filter_map(|m| t.users.get(&m.user_id).cloned())
            .collect())
    }

    async fn update_status(&self, room_id: &str, status: RoomStatus) -> Result<Room, StoreError> {
        let mut t = self.tables.lock();
        let room = t.rooms.get_mut(room_id).ok_or(StoreError::NotFound)?;
        room.status = status;
        room.updated_at = Utc::now();
        Ok(room.clone())
    }
}

#[async_trait]
impl MovieStore for MemoryDb {
    async fn create_movie(&self, movie: NewMovie<'_>) -> Result<Movie, StoreError> {
        let mut t = self.tables.lock();
        if t.movies.contains_key(movie.id) {
            return Err(StoreError::Conflict(format!("movie {} exists", movie.id)));
        }
        let created = Movie {
            id: movie.id.to_string(),
            title: movie.title.to_string(),
            title_en: movie.title_en.map(str::to_string),
            poster_url: movie.poster_url.map(str::to_string),
            year: movie.year,
            genre: movie.genre.map(str::to_string),
            duration_minutes: movie.duration_minutes,
            description: movie.description.map(str::to_string),
            created_at: movie.created_at,
        };
        t.movies.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get_movie(&self, movie_id: &str) -> Result<Movie, StoreError> {
        self.tables
            .lock()
            .movies
            .get(movie_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_movies(&self, after: Option<&str>, limit: i64) -> Result<Vec<Movie>, StoreError> {
        let t = self.tables.lock();
        Ok(t.movies
            .values()
            .filter(|m| after.map_or(true, |a| m.id.as_str() > a))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_unswiped(
        &self,
        room_id: &str,
        user_id: &str,
        filter: Option<&Filter>,
        limit: i64,
    ) -> Result<Vec<Movie>, StoreError> {
        let t = self.tables.lock();
        let swiped: HashSet<&str> = t
            .swipes
            .iter()
            .filter(|s| s.room_id == room_id && s.user_id == user_id)
            .map(|s| s.movie_id.as_str())
            .collect();
        Ok(t.movies
            .values()
            .filter(|m| !swiped.contains(m.id.as_str()))
            .filter(|m| filter.map_or(true, |f| f.admits(m)))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SwipeStore for MemoryDb {
    async fn record_swipe(&self, swipe: NewSwipe<'_>) -> Result<Swipe, StoreError> {
        let mut t = self.tables.lock();
        let duplicate = t.swipes.iter().any(|s| {
            s.user_id == swipe.user_id && s.room_id == swipe.room_id && s.movie_id == swipe.movie_id
        });
        if duplicate {
            return Err(StoreError::Conflict("already swiped this movie".to_string()));
        }
        let created = Swipe {
            id: swipe.id,
            user_id: swipe.user_id.to_string(),
            room_id: swipe.room_id.to_string(),
            movie_id: swipe.movie_id.to_string(),
            direction: swipe.direction,
            created_at: swipe.created_at,
        };
        t.swipes.push(created.clone());
        Ok(created)
    }

    async fn undo_last_swipe(&self, user_id: &str, room_id: &str) -> Result<Swipe, StoreError> {
        let mut t = self.tables.lock();
        let idx = t
            .swipes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.user_id == user_id && s.room_id == room_id)
            .max_by_key(|(_, s)| s.id)
            .map(|(i, _)| i)
            .ok_or(StoreError::NotFound)?;
        Ok(t.swipes.remove(idx))
    }

    async fn has_swiped(
        &self,
        user_id: &str,
        room_id: &str,
        movie_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .lock()
            .swipes
            .iter()
            .any(|s| s.user_id == user_id && s.room_id == room_id && s.movie_id == movie_id))
    }

    async fn list_user_swipes(&self, user_id: &str, room_id: &str) -> Result<Vec<Swipe>, StoreError> {
        let t = self.tables.lock();
        let mut swipes: Vec<Swipe> = t
            .swipes
            .iter()
            .filter(|s| s.user_id == user_id && s.room_id == room_id)
            .cloned()
            .collect();
        swipes.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(swipes)
    }

    async fn list_active_user_ids(&self, room_id: &str) -> Result<Vec<String>, StoreError> {
        let t = self.tables.lock();
        let mut in_room: Vec<&Swipe> = t.swipes.iter().filter(|s| s.room_id == room_id).collect();
        in_room.sort_by_key(|s| s.id);

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for s in in_room {
            push_distinct(&mut seen, &mut out, &s.user_id);
        }
        Ok(out)
    }

    async fn list_likers(&self, room_id: &str, movie_id: &str) -> Result<Vec<String>, StoreError> {
        let t = self.tables.lock();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for s in t
            .swipes
            .iter()
            .filter(|s| s.room_id == room_id && s.movie_id == movie_id && s.direction.is_like())
        {
            push_distinct(&mut seen, &mut out, &s.user_id);
        }
        Ok(out)
    }

    async fn list_liked_items(&self, room_id: &str) -> Result<Vec<String>, StoreError> {
        let t = self.tables.lock();
        let mut likes: Vec<&Swipe> = t
            .swipes
            .iter()
            .filter(|s| s.room_id == room_id && s.direction.is_like())
            .collect();
        likes.sort_by_key(|s| s.id);

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for s in likes {
            push_distinct(&mut seen, &mut out, &s.movie_id);
        }
        Ok(out)
    }
}

#[async_trait]
impl MatchStore for MemoryDb {
    async fn exists(&self, room_id: &str, movie_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .lock()
            .matches
            .iter()
            .any(|m| m.room_id == room_id && m.movie_id == movie_id))
    }

    async fn find(&self, room_id: &str, movie_id: &str) -> Result<Option<Match>, StoreError> {
        Ok(self
            .tables
            .lock()
            .matches
            .iter()
            .find(|m| m.room_id == room_id && m.movie_id == movie_id)
            .cloned())
    }

    async fn create(&self, new_match: NewMatch<'_>) -> Result<Match, StoreError> {
        let mut t = self.tables.lock();
        let taken = t
            .matches
            .iter()
            .any(|m| m.room_id == new_match.room_id && m.movie_id == new_match.movie_id);
        if taken {
            return Err(StoreError::Conflict(format!(
                "match exists for {}/{}",
                new_match.room_id, new_match.movie_id
            )));
        }
        let created = Match {
            id: new_match.id.to_string(),
            room_id: new_match.room_id.to_string(),
            movie_id: new_match.movie_id.to_string(),
            created_at: new_match.created_at,
        };
        t.matches.push(created.clone());
        Ok(created)
    }

    async fn list_by_room(&self, room_id: &str) -> Result<Vec<Match>, StoreError> {
        let t = self.tables.lock();
        // Pushed in creation order; newest first means reversed.
        Ok(t.matches
            .iter()
            .rev()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, match_id: &str) -> Result<Match, StoreError> {
        self.tables
            .lock()
            .matches
            .iter()
            .find(|m| m.id == match_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl FilterStore for MemoryDb {
    async fn create_filter(&self, filter: NewFilter<'_>) -> Result<Filter, StoreError> {
        let mut t = self.tables.lock();
        let room = t.rooms.get_mut(filter.room_id).ok_or(StoreError::NotFound)?;
        room.filter_id = Some(filter.id.to_string());
        room.updated_at = filter.created_at;

        let created = Filter {
            id: filter.id.to_string(),
            room_id: filter.room_id.to_string(),
            genres: filter.genres.to_vec(),
            year_from: filter.year_from,
            year_to: filter.year_to,
            duration_min: filter.duration_min,
            duration_max: filter.duration_max,
            min_rating: filter.min_rating,
            mood: filter.mood.map(str::to_string),
            created_at: filter.created_at,
            updated_at: filter.updated_at,
        };
        t.filters.push(created.clone());
        Ok(created)
    }

    async fn get_filter(&self, filter_id: &str) -> Result<Filter, StoreError> {
        self.tables
            .lock()
            .filters
            .iter()
            .find(|f| f.id == filter_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn latest_for_room(&self, room_id: &str) -> Result<Filter, StoreError> {
        // max_by_key keeps the last of equal timestamps, which is the newest push.
        self.tables
            .lock()
            .filters
            .iter()
            .filter(|f| f.room_id == room_id)
            .max_by_key(|f| f.created_at)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

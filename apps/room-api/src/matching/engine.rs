use std::collections::HashSet;

use chrono::Utc;
use flickpick_common::id::{prefix, prefixed_ulid};

use crate::models::movie::Movie;
use crate::models::room_match::{AlmostMatch, Match, MatchWithDetails, NewMatch};
use crate::store::{StoreError, Stores};

use super::EngineError;

/// Decides whether a room agrees on a movie.
///
/// The active member set of a room is the set of users with at least one
/// swipe in it, not the membership list: members who never swiped cannot
/// block a match.
#[derive(Clone)]
pub struct MatchEngine {
    stores: Stores,
}

impl MatchEngine {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Return the room's match for `movie_id` if every active member liked it,
    /// creating the match the first time.
    ///
    /// Idempotent: concurrent callers all get the same row. The store's
    /// unique (room, movie) constraint picks the winner and losers read it
    /// back.
    pub async fn check_and_create_match(
        &self,
        room_id: &str,
        movie_id: &str,
    ) -> Result<Option<Match>, EngineError> {
        let active = self.stores.swipes.list_active_user_ids(room_id).await?;
        if active.len() < 2 {
            return Ok(None);
        }

        let likers: HashSet<String> = self
            .stores
            .swipes
            .list_likers(room_id, movie_id)
            .await?
            .into_iter()
            .collect();
        if !active.iter().all(|user_id| likers.contains(user_id)) {
            return Ok(None);
        }

        if let Some(existing) = self.stores.matches.find(room_id, movie_id).await? {
            return Ok(Some(existing));
        }

        let id = prefixed_ulid(prefix::MATCH);
        let new_match = NewMatch {
            id: &id,
            room_id,
            movie_id,
            created_at: Utc::now(),
        };

        match self.stores.matches.create(new_match).await {
            Ok(created) => {
                tracing::info!(
                    room_id = %room_id,
                    movie_id = %movie_id,
                    match_id = %created.id,
                    members = active.len(),
                    "match created"
                );
                Ok(Some(created))
            }
            Err(StoreError::Conflict(_)) => {
                tracing::debug!(room_id = %room_id, movie_id = %movie_id, "lost match race, reusing row");
                self.stores
                    .matches
                    .find(room_id, movie_id)
                    .await?
                    .map(Some)
                    .ok_or(EngineError::NotFound("match"))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Movies liked by every active member but one, with the member still
    /// missing. Recomputed on every call.
    pub async fn almost_matches(&self, room_id: &str) -> Result<Vec<AlmostMatch>, EngineError> {
        let active = self.stores.swipes.list_active_user_ids(room_id).await?;
        if active.len() <= 1 {
            return Ok(Vec::new());
        }
        let needed = active.len() - 1;

        let mut result = Vec::new();
        for movie_id in self.stores.swipes.list_liked_items(room_id).await? {
            if self.stores.matches.exists(room_id, &movie_id).await? {
                continue;
            }

            let likers: HashSet<String> = self
                .stores
                .swipes
                .list_likers(room_id, &movie_id)
                .await?
                .into_iter()
                .collect();
            if likers.len() != needed {
                continue;
            }

            let missing: Vec<&String> = active
                .iter()
                .filter(|user_id| !likers.contains(*user_id))
                .collect();
            let [missing_user_id] = missing.as_slice() else {
                tracing::warn!(
                    room_id = %room_id,
                    movie_id = %movie_id,
                    missing = missing.len(),
                    "likers disagree with active members, skipping almost match"
                );
                continue;
            };

            result.push(AlmostMatch {
                movie: self.movie_if_present(&movie_id).await?,
                missing_user_id: (*missing_user_id).clone(),
                likes_count: likers.len(),
                movie_id,
            });
        }

        Ok(result)
    }

    /// Load a match by id with its room, movie and the members who liked it.
    pub async fn match_with_details(&self, match_id: &str) -> Result<MatchWithDetails, EngineError> {
        let record = match self.stores.matches.get_by_id(match_id).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => return Err(EngineError::NotFound("match")),
            Err(err) => return Err(err.into()),
        };
        self.details(record).await
    }

    /// Expand an already loaded match.
    pub async fn details(&self, record: Match) -> Result<MatchWithDetails, EngineError> {
        let room = match self.stores.rooms.get_room(&record.room_id).await {
            Ok(room) => room,
            Err(StoreError::NotFound) => return Err(EngineError::NotFound("room")),
            Err(err) => return Err(err.into()),
        };
        let movie = self.movie_if_present(&record.movie_id).await?;

        let likers: HashSet<String> = self
            .stores
            .swipes
            .list_likers(&record.room_id, &record.movie_id)
            .await?
            .into_iter()
            .collect();
        let users = self
            .stores
            .rooms
            .get_members(&record.room_id)
            .await?
            .into_iter()
            .filter(|user| likers.contains(&user.id))
            .collect();

        Ok(MatchWithDetails {
            record,
            movie,
            room,
            users,
        })
    }

    async fn movie_if_present(&self, movie_id: &str) -> Result<Option<Movie>, EngineError> {
        match self.stores.movies.get_movie(movie_id).await {
            Ok(movie) => Ok(Some(movie)),
            Err(StoreError::NotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

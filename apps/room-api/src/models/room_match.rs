use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::matches;
use crate::models::movie::Movie;
use crate::models::room::Room;
use crate::models::user::User;

/// A room-wide agreement on one movie. At most one per (room, movie).
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = matches)]
pub struct Match {
    pub id: String,
    pub room_id: String,
    pub movie_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = matches)]
pub struct NewMatch<'a> {
    pub id: &'a str,
    pub room_id: &'a str,
    pub movie_id: &'a str,
    pub created_at: DateTime<Utc>,
}

/// A match with everything a client needs to render it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchWithDetails {
    #[serde(flatten)]
    pub record: Match,
    /// `None` when the catalog no longer has the movie.
    pub movie: Option<Movie>,
    pub room: Room,
    /// Room members who liked the movie.
    pub users: Vec<User>,
}

/// A movie liked by every active member but one. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AlmostMatch {
    pub movie_id: String,
    pub movie: Option<Movie>,
    pub likes_count: usize,
    pub missing_user_id: String,
}

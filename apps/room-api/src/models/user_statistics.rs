use serde::Serialize;
use utoipa::ToSchema;

/// Lifetime activity counters for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserStatistics {
    pub total_swipes: i64,
    pub liked_movies: i64,
    pub disliked_movies: i64,
    /// Matches in rooms the user is a member of.
    pub total_matches: i64,
    pub rooms_created: i64,
    pub rooms_joined: i64,
    /// Member rooms still waiting or active.
    pub active_rooms: i64,
    /// Member rooms that have finished.
    pub completed_rooms: i64,
}

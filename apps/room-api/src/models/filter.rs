use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::filters;
use crate::models::movie::Movie;

/// Deck constraints a host sets for a room. The newest filter of a room is
/// the one its `filter_id` points at.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = filters)]
pub struct Filter {
    pub id: String,
    pub room_id: String,
    /// Lower-cased genre names. Empty means any genre.
    pub genres: Vec<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub duration_min: Option<i32>,
    pub duration_max: Option<i32>,
    /// Stored for clients; the catalog carries no ratings to filter on.
    pub min_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = filters)]
pub struct NewFilter<'a> {
    pub id: &'a str,
    pub room_id: &'a str,
    pub genres: &'a [String],
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub duration_min: Option<i32>,
    pub duration_max: Option<i32>,
    pub min_rating: Option<f64>,
    pub mood: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Filter {
    /// Whether `movie` belongs in a deck narrowed by this filter.
    ///
    /// A bound on a field the movie lacks excludes the movie.
    pub fn admits(&self, movie: &Movie) -> bool {
        if !self.genres.is_empty() {
            let Some(genre) = movie.genre.as_deref() else {
                return false;
            };
            let genre = genre.to_lowercase();
            if !self.genres.iter().any(|g| *g == genre) {
                return false;
            }
        }
        within(movie.year, self.year_from, self.year_to)
            && within(movie.duration_minutes, self.duration_min, self.duration_max)
    }
}

fn within(value: Option<i32>, min: Option<i32>, max: Option<i32>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m)
}

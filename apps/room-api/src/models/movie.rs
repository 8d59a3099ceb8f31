use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::movies;

/// A catalog entry users swipe on.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = movies)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub title_en: Option<String>,
    pub poster_url: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub duration_minutes: Option<i32>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = movies)]
pub struct NewMovie<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub title_en: Option<&'a str>,
    pub poster_url: Option<&'a str>,
    pub year: Option<i32>,
    pub genre: Option<&'a str>,
    pub duration_minutes: Option<i32>,
    pub description: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

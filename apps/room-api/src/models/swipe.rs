use std::io::Write;

use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::swipes;

/// Swipe direction. `right` is a like, `left` a dislike; the words
/// `like`/`dislike` are accepted on input.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    #[serde(alias = "like")]
    Right,
    #[serde(alias = "dislike")]
    Left,
}

impl SwipeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeDirection::Right => "right",
            SwipeDirection::Left => "left",
        }
    }

    pub fn is_like(&self) -> bool {
        matches!(self, SwipeDirection::Right)
    }
}

impl ToSql<Text, Pg> for SwipeDirection {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for SwipeDirection {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"right" => Ok(SwipeDirection::Right),
            b"left" => Ok(SwipeDirection::Left),
            other => Err(format!(
                "unknown swipe direction: {}",
                String::from_utf8_lossy(other)
            )
            .into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = swipes)]
pub struct Swipe {
    #[serde(serialize_with = "super::serialize_snowflake")]
    #[schema(value_type = String)]
    pub id: i64,
    pub user_id: String,
    pub room_id: String,
    pub movie_id: String,
    pub direction: SwipeDirection,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = swipes)]
pub struct NewSwipe<'a> {
    pub id: i64,
    pub user_id: &'a str,
    pub room_id: &'a str,
    pub movie_id: &'a str,
    pub direction: SwipeDirection,
    pub created_at: DateTime<Utc>,
}

use std::io::Write;

use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::{room_members, rooms};

/// Characters used for join codes. Omits 0/O and 1/I, which people misread.
const CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 6;

/// Lifecycle of a room. `Waiting` → `Active` is host-only and one-way.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Active,
    Finished,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Active => "active",
            RoomStatus::Finished => "finished",
        }
    }
}

impl ToSql<Text, Pg> for RoomStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for RoomStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"waiting" => Ok(RoomStatus::Waiting),
            b"active" => Ok(RoomStatus::Active),
            b"finished" => Ok(RoomStatus::Finished),
            other => Err(format!(
                "unknown room status: {}",
                String::from_utf8_lossy(other)
            )
            .into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = rooms)]
pub struct Room {
    pub id: String,
    pub code: String,
    pub host_id: String,
    pub status: RoomStatus,
    pub filter_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = rooms)]
pub struct NewRoom<'a> {
    pub id: &'a str,
    pub code: &'a str,
    pub host_id: &'a str,
    pub status: RoomStatus,
    pub filter_id: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = room_members)]
pub struct RoomMember {
    pub room_id: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = room_members)]
pub struct NewRoomMember<'a> {
    pub room_id: &'a str,
    pub user_id: &'a str,
    pub joined_at: DateTime<Utc>,
}

/// Generate a readable join code.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

/// Canonical form of a user-entered join code: trimmed and upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

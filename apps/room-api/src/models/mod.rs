pub mod filter;
pub mod movie;
pub mod room;
pub mod room_match;
pub mod swipe;
pub mod user;
pub mod user_statistics;

use serde::Serializer;

/// Serialize a 64-bit snowflake as a JSON string so JavaScript clients
/// don't lose precision.
pub fn serialize_snowflake<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(id)
}

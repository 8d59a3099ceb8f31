use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = flickpick_common::id::prefixed_ulid("room");
/// assert!(id.starts_with("room_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Returns true if `id` looks like `<prefix>_<ULID>`.
pub fn has_prefix(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|ulid| Ulid::from_string(ulid).is_ok())
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const USER: &str = "usr";
    pub const ROOM: &str = "room";
    pub const MATCH: &str = "mt";
    pub const FILTER: &str = "flt";
    pub const CONNECTION: &str = "conn";
}

//! Room event wire format.
//!
//! Join and leave go out wrapped in the generic envelope
//! `{"type":"broadcast","payload":{...},"timestamp":...}`. Match is sent as its
//! own top-level `{"type":"match","match":{...},"timestamp":...}` object so
//! clients can pick it out without unwrapping anything.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::room_match::MatchWithDetails;

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

pub const TYPE_BROADCAST: &str = "broadcast";
pub const TYPE_JOIN: &str = "join";
pub const TYPE_LEAVE: &str = "leave";
pub const TYPE_MATCH: &str = "match";
pub const TYPE_PING: &str = "ping";
pub const TYPE_PONG: &str = "pong";

/// An encoded frame, shared by every recipient of a broadcast.
pub type Frame = Arc<str>;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Generic message in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default)]
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct JoinNotification<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaveNotification<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub user_id: &'a str,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchNotification<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(rename = "match")]
    pub record: &'a MatchWithDetails,
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn now() -> i64 {
    Utc::now().timestamp()
}

fn to_frame<T: Serialize>(value: &T) -> Result<Frame, serde_json::Error> {
    serde_json::to_string(value).map(Arc::from)
}

fn wrap<T: Serialize>(payload: &T, timestamp: i64) -> Result<Frame, serde_json::Error> {
    to_frame(&Envelope {
        kind: TYPE_BROADCAST.to_string(),
        payload: Some(serde_json::to_value(payload)?),
        timestamp,
    })
}

pub fn encode_join(user_id: &str, username: Option<&str>) -> Result<Frame, serde_json::Error> {
    let timestamp = now();
    wrap(
        &JoinNotification {
            kind: TYPE_JOIN,
            user_id,
            username,
            timestamp,
        },
        timestamp,
    )
}

pub fn encode_leave(user_id: &str) -> Result<Frame, serde_json::Error> {
    let timestamp = now();
    wrap(
        &LeaveNotification {
            kind: TYPE_LEAVE,
            user_id,
            timestamp,
        },
        timestamp,
    )
}

pub fn encode_match(record: &MatchWithDetails) -> Result<Frame, serde_json::Error> {
    to_frame(&MatchNotification {
        kind: TYPE_MATCH,
        record,
        timestamp: now(),
    })
}

pub fn encode_pong() -> Result<Frame, serde_json::Error> {
    to_frame(&Envelope {
        kind: TYPE_PONG.to_string(),
        payload: None,
        timestamp: now(),
    })
}

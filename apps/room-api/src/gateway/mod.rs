//! Real-time room hub: WebSocket fan-out of join, leave and match events.

pub mod connection;
pub mod events;
pub mod hub;
pub mod registry;
pub mod server;

pub use hub::RoomHub;

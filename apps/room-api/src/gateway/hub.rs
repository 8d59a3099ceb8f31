//! The room hub: one task that owns registry mutation and fan-out.
//!
//! Connections and the REST layer talk to the hub through [`RoomHub`], which
//! only enqueues commands. The hub task applies them one at a time, so join,
//! leave and match frames reach a room in the order they were issued.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::config::HubConfig;
use crate::models::room_match::MatchWithDetails;

use super::events::{self, Frame};
use super::registry::{ClientHandle, ClientMailbox, RoomRegistry};

enum Command {
    Register(ClientHandle),
    Unregister {
        room_id: String,
        conn_id: String,
        user_id: String,
    },
    Deliver {
        room_id: String,
        frame: Frame,
    },
    /// Signal every connection to close, and close any that registers later.
    CloseAll,
}

/// Cloneable handle to the hub task.
#[derive(Clone)]
pub struct RoomHub {
    commands: mpsc::UnboundedSender<Command>,
    registry: Arc<RoomRegistry>,
    /// Connections registered and not yet unregistered.
    live: Arc<watch::Sender<usize>>,
    settings: HubConfig,
}

impl RoomHub {
    /// Spawn the hub task. Must be called inside a tokio runtime.
    pub fn spawn(settings: HubConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Arc::new(RoomRegistry::new());
        let (live, _) = watch::channel(0usize);
        let live = Arc::new(live);

        tokio::spawn(run(registry.clone(), live.clone(), rx));

        Self {
            commands: tx,
            registry,
            live,
            settings,
        }
    }

    pub fn settings(&self) -> HubConfig {
        self.settings
    }

    /// Build a client for a freshly upgraded connection.
    pub fn client(
        &self,
        room_id: &str,
        user_id: &str,
        username: Option<String>,
    ) -> (ClientHandle, ClientMailbox) {
        ClientHandle::new(room_id, user_id, username, self.settings.send_queue)
    }

    /// Add a client to its room and announce it to everyone there, itself
    /// included.
    pub fn register(&self, client: ClientHandle) {
        self.send(Command::Register(client));
    }

    /// Remove a connection and announce the leave to the rest of the room.
    ///
    /// Call exactly once per registered connection, even if the hub already
    /// dropped it for falling behind.
    pub fn unregister(&self, room_id: &str, conn_id: &str, user_id: &str) {
        self.send(Command::Unregister {
            room_id: room_id.to_string(),
            conn_id: conn_id.to_string(),
            user_id: user_id.to_string(),
        });
    }

    /// Send a match to every connection in the room.
    pub fn broadcast_match(&self, room_id: &str, details: &MatchWithDetails) {
        match events::encode_match(details) {
            Ok(frame) => self.send(Command::Deliver {
                room_id: room_id.to_string(),
                frame,
            }),
            Err(err) => {
                tracing::error!(?err, room_id = %room_id, match_id = %details.record.id, "failed to encode match");
            }
        }
    }

    pub fn online_users(&self, room_id: &str) -> Vec<String> {
        self.registry.online_users(room_id)
    }

    /// Tell every connection to close. Used at shutdown.
    ///
    /// Goes through the command queue, so registrations issued before this
    /// call are signalled too.
    pub fn close_all(&self) {
        self.send(Command::CloseAll);
    }

    /// Wait until every connection has unregistered. Returns `false` if
    /// `deadline` passed first.
    pub async fn wait_idle(&self, deadline: Duration) -> bool {
        let mut live = self.live.subscribe();
        let idle = tokio::time::timeout(deadline, live.wait_for(|n| *n == 0))
            .await
            .is_ok();
        idle
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::error!("room hub task is gone, dropping command");
        }
    }
}

async fn run(
    registry: Arc<RoomRegistry>,
    live: Arc<watch::Sender<usize>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut closing = false;
    while let Some(command) = commands.recv().await {
        match command {
            Command::Register(client) if closing => {
                tracing::info!(
                    room_id = %client.room_id,
                    user_id = %client.user_id,
                    conn_id = %client.conn_id,
                    "hub is closing, closing late registration"
                );
                registry.insert(client.clone());
                live.send_modify(|n| *n += 1);
                client.close();
            }
            Command::Register(client) => {
                let room_id = client.room_id.clone();
                tracing::info!(
                    room_id = %room_id,
                    user_id = %client.user_id,
                    conn_id = %client.conn_id,
                    "client registered"
                );
                let joined = events::encode_join(&client.user_id, client.username.as_deref());
                registry.insert(client);
                live.send_modify(|n| *n += 1);
                if let Ok(frame) = joined {
                    deliver(&registry, &room_id, frame);
                }
            }
            Command::Unregister {
                room_id,
                conn_id,
                user_id,
            } => {
                let was_registered = registry.remove(&room_id, &conn_id).is_some();
                live.send_modify(|n| *n = n.saturating_sub(1));
                tracing::info!(
                    room_id = %room_id,
                    user_id = %user_id,
                    conn_id = %conn_id,
                    was_registered,
                    "client unregistered"
                );
                if let Ok(frame) = events::encode_leave(&user_id) {
                    deliver(&registry, &room_id, frame);
                }
            }
            Command::Deliver { room_id, frame } => deliver(&registry, &room_id, frame),
            Command::CloseAll => {
                closing = true;
                let closed = registry.close_all();
                tracing::info!(connections = closed, "closing all room connections");
            }
        }
    }
}

fn deliver(registry: &RoomRegistry, room_id: &str, frame: Frame) {
    let report = registry.deliver(room_id, &frame);
    for client in &report.dropped {
        tracing::warn!(
            room_id = %room_id,
            user_id = %client.user_id,
            conn_id = %client.conn_id,
            "send queue full, dropping client"
        );
    }
    tracing::debug!(room_id = %room_id, delivered = report.delivered, "frame delivered");
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    async fn next_json(mailbox: &mut ClientMailbox) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(1), mailbox.frames.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("queue closed");
        serde_json::from_str(&frame).unwrap()
    }

    #[tokio::test]
    async fn join_reaches_the_room_including_the_newcomer() {
        let hub = RoomHub::spawn(HubConfig::default());
        let (a, mut ma) = hub.client("room_1", "u1", Some("ana".into()));
        hub.register(a);
        let v = next_json(&mut ma).await;
        assert_eq!(v["type"], "broadcast");
        assert_eq!(v["payload"]["type"], "join");
        assert_eq!(v["payload"]["username"], "ana");

        let (b, mut mb) = hub.client("room_1", "u2", None);
        hub.register(b);
        assert_eq!(next_json(&mut ma).await["payload"]["user_id"], "u2");
        assert_eq!(next_json(&mut mb).await["payload"]["user_id"], "u2");
        assert_eq!(hub.online_users("room_1"), vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn unregister_announces_leave_and_goes_idle() {
        let hub = RoomHub::spawn(HubConfig::default());
        let (a, mut ma) = hub.client("room_1", "u1", None);
        let (b, _mb) = hub.client("room_1", "u2", None);
        let (b_conn, b_user) = (b.conn_id.clone(), b.user_id.clone());
        hub.register(a.clone());
        hub.register(b);
        next_json(&mut ma).await;
        next_json(&mut ma).await;

        hub.unregister("room_1", &b_conn, &b_user);
        let v = next_json(&mut ma).await;
        assert_eq!(v["payload"]["type"], "leave");
        assert_eq!(v["payload"]["user_id"], "u2");

        assert!(!hub.wait_idle(Duration::from_millis(20)).await);
        hub.unregister("room_1", &a.conn_id, &a.user_id);
        assert!(hub.wait_idle(Duration::from_secs(1)).await);
        assert!(hub.online_users("room_1").is_empty());
    }

    #[tokio::test]
    async fn close_all_reaches_registrations_still_in_the_queue() {
        let hub = RoomHub::spawn(HubConfig::default());
        let (a, mut ma) = hub.client("room_1", "u1", None);
        hub.register(a);
        hub.close_all();

        tokio::time::timeout(Duration::from_secs(1), ma.close.wait_for(|closed| *closed))
            .await
            .expect("queued client was never told to close")
            .unwrap();
    }

    #[tokio::test]
    async fn registrations_after_close_all_are_closed_immediately() {
        let hub = RoomHub::spawn(HubConfig::default());
        hub.close_all();
        let (late, mut ml) = hub.client("room_1", "u1", None);
        let (conn_id, user_id) = (late.conn_id.clone(), late.user_id.clone());
        hub.register(late);

        tokio::time::timeout(Duration::from_secs(1), ml.close.wait_for(|closed| *closed))
            .await
            .expect("late client was never told to close")
            .unwrap();

        hub.unregister("room_1", &conn_id, &user_id);
        assert!(hub.wait_idle(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn commands_are_applied_in_order_across_rooms() {
        let hub = RoomHub::spawn(HubConfig::default());
        let (a, mut ma) = hub.client("room_1", "u1", None);
        let (other, mut mo) = hub.client("room_2", "u9", None);
        hub.register(a);
        hub.register(other);
        next_json(&mut ma).await;
        next_json(&mut mo).await;

        hub.send(Command::Deliver {
            room_id: "room_1".into(),
            frame: Arc::from(r#"{"type":"first"}"#),
        });
        hub.send(Command::Deliver {
            room_id: "room_1".into(),
            frame: Arc::from(r#"{"type":"second"}"#),
        });

        assert_eq!(next_json(&mut ma).await["type"], "first");
        assert_eq!(next_json(&mut ma).await["type"], "second");
        assert!(mo.frames.try_recv().is_err());
    }
}

//! Per-room registry of connected clients.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use flickpick_common::id::{prefix, prefixed_ulid};
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};

use super::events::Frame;

/// The registry's handle on one live WebSocket connection.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub conn_id: String,
    pub room_id: String,
    pub user_id: String,
    pub username: Option<String>,
    frames: mpsc::Sender<Frame>,
    close: Arc<watch::Sender<bool>>,
}

/// The connection's side of a [`ClientHandle`]: its outbound queue and the
/// signal telling it to close.
#[derive(Debug)]
pub struct ClientMailbox {
    pub frames: mpsc::Receiver<Frame>,
    pub close: watch::Receiver<bool>,
}

impl ClientHandle {
    pub fn new(
        room_id: impl Into<String>,
        user_id: impl Into<String>,
        username: Option<String>,
        queue: usize,
    ) -> (Self, ClientMailbox) {
        let (frames_tx, frames_rx) = mpsc::channel(queue.max(1));
        let (close_tx, close_rx) = watch::channel(false);
        let handle = Self {
            conn_id: prefixed_ulid(prefix::CONNECTION),
            room_id: room_id.into(),
            user_id: user_id.into(),
            username,
            frames: frames_tx,
            close: Arc::new(close_tx),
        };
        let mailbox = ClientMailbox {
            frames: frames_rx,
            close: close_rx,
        };
        (handle, mailbox)
    }

    /// Queue a frame without waiting. Fails when the queue is full or the
    /// connection is gone.
    pub fn try_send(&self, frame: Frame) -> Result<(), mpsc::error::TrySendError<Frame>> {
        self.frames.try_send(frame)
    }

    /// A sender into this client's own queue, for replies from its reader.
    pub fn sender(&self) -> mpsc::Sender<Frame> {
        self.frames.clone()
    }

    /// Ask the connection to close.
    pub fn close(&self) {
        self.close.send_replace(true);
    }
}

/// Outcome of delivering one frame to a room.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Clients whose queue was full or closed. Already removed and told to
    /// close.
    pub dropped: Vec<ClientHandle>,
}

/// room id → connection id → client.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, HashMap<String, ClientHandle>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, client: ClientHandle) {
        self.rooms
            .write()
            .entry(client.room_id.clone())
            .or_default()
            .insert(client.conn_id.clone(), client);
    }

    /// Remove a connection, dropping the room entry once it is empty.
    pub fn remove(&self, room_id: &str, conn_id: &str) -> Option<ClientHandle> {
        let mut rooms = self.rooms.write();
        let clients = rooms.get_mut(room_id)?;
        let removed = clients.remove(conn_id);
        if clients.is_empty() {
            rooms.remove(room_id);
        }
        removed
    }

    /// Copy of the room's clients, taken under the read lock.
    pub fn snapshot(&self, room_id: &str) -> Vec<ClientHandle> {
        self.rooms
            .read()
            .get(room_id)
            .map(|clients| clients.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Enqueue `frame` for every client in the room.
    ///
    /// Never blocks: a client that cannot take the frame right away is
    /// removed and told to close, and the remaining clients still get it.
    pub fn deliver(&self, room_id: &str, frame: &Frame) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for client in self.snapshot(room_id) {
            match client.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(_) => report.dropped.push(client),
            }
        }

        for client in &report.dropped {
            self.remove(room_id, &client.conn_id);
            client.close();
        }
        report
    }

    /// Distinct user ids with at least one connection in the room, sorted.
    pub fn online_users(&self, room_id: &str) -> Vec<String> {
        let rooms = self.rooms.read();
        let Some(clients) = rooms.get(room_id) else {
            return Vec::new();
        };
        clients
            .values()
            .map(|c| c.user_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    #[cfg(test)]
    pub(crate) fn connection_count(&self) -> usize {
        self.rooms.read().values().map(HashMap::len).sum()
    }

    /// Signal every registered connection to close.
    pub fn close_all(&self) -> usize {
        let rooms = self.rooms.read();
        let mut closed = 0;
        for client in rooms.values().flat_map(HashMap::values) {
            client.close();
            closed += 1;
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> Frame {
        Arc::from(text)
    }

    #[test]
    fn insert_and_remove_cleans_up_empty_rooms() {
        let registry = RoomRegistry::new();
        let (a, _ma) = ClientHandle::new("room_1", "u1", None, 4);
        let (b, _mb) = ClientHandle::new("room_1", "u2", None, 4);
        registry.insert(a.clone());
        registry.insert(b.clone());
        assert_eq!(registry.connection_count(), 2);

        assert!(registry.remove("room_1", &a.conn_id).is_some());
        assert_eq!(registry.room_count(), 1);
        assert!(registry.remove("room_1", &a.conn_id).is_none());

        registry.remove("room_1", &b.conn_id);
        assert_eq!(registry.room_count(), 0);
        assert!(registry.snapshot("room_1").is_empty());
    }

    #[test]
    fn delivery_is_scoped_to_the_room() {
        let registry = RoomRegistry::new();
        let (a, mut ma) = ClientHandle::new("room_1", "u1", None, 4);
        let (b, mut mb) = ClientHandle::new("room_2", "u2", None, 4);
        registry.insert(a);
        registry.insert(b);

        let report = registry.deliver("room_1", &frame("hello"));
        assert_eq!(report.delivered, 1);
        assert!(report.dropped.is_empty());
        assert_eq!(&*ma.frames.try_recv().unwrap(), "hello");
        assert!(mb.frames.try_recv().is_err());
    }

    #[test]
    fn full_queue_drops_only_that_client() {
        let registry = RoomRegistry::new();
        let (slow, mut slow_mailbox) = ClientHandle::new("room_1", "slow", None, 1);
        let (fast_a, mut ma) = ClientHandle::new("room_1", "a", None, 8);
        let (fast_b, mut mb) = ClientHandle::new("room_1", "b", None, 8);
        let slow_id = slow.conn_id.clone();
        registry.insert(slow.clone());
        registry.insert(fast_a);
        registry.insert(fast_b);

        slow.try_send(frame("backlog")).unwrap();
        let report = registry.deliver("room_1", &frame("match"));

        assert_eq!(report.delivered, 2);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].conn_id, slow_id);
        assert_eq!(&*ma.frames.try_recv().unwrap(), "match");
        assert_eq!(&*mb.frames.try_recv().unwrap(), "match");

        assert!(registry.snapshot("room_1").iter().all(|c| c.conn_id != slow_id));
        assert!(*slow_mailbox.close.borrow_and_update());
    }

    #[test]
    fn closed_receiver_counts_as_dropped() {
        let registry = RoomRegistry::new();
        let (gone, mailbox) = ClientHandle::new("room_1", "u1", None, 4);
        registry.insert(gone);
        drop(mailbox);

        let report = registry.deliver("room_1", &frame("x"));
        assert_eq!(report.delivered, 0);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn online_users_are_distinct() {
        let registry = RoomRegistry::new();
        for user in ["u2", "u1", "u2"] {
            let (client, _mailbox) = ClientHandle::new("room_1", user, None, 4);
            registry.insert(client);
        }
        assert_eq!(registry.online_users("room_1"), vec!["u1", "u2"]);
        assert!(registry.online_users("room_9").is_empty());
    }

    #[test]
    fn close_all_signals_every_connection() {
        let registry = RoomRegistry::new();
        let (a, ma) = ClientHandle::new("room_1", "u1", None, 4);
        let (b, mb) = ClientHandle::new("room_2", "u2", None, 4);
        registry.insert(a);
        registry.insert(b);

        assert_eq!(registry.close_all(), 2);
        assert!(*ma.close.borrow());
        assert!(*mb.close.borrow());
    }
}

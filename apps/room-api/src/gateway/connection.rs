//! Per-connection read and write pumps.

use std::fmt::Debug;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::config::HubConfig;

use super::events::{self, Envelope, Frame};
use super::hub::RoomHub;
use super::registry::ClientMailbox;

/// Normal closure.
const CLOSE_NORMAL: u16 = 1000;
/// Server going away (shutdown or dropped for falling behind).
const CLOSE_GOING_AWAY: u16 = 1001;

/// Who is on the other end of an upgraded socket.
#[derive(Debug, Clone)]
pub struct Peer {
    pub room_id: String,
    pub user_id: String,
    pub username: Option<String>,
}

/// Run a connection from registration to unregistration.
///
/// Both pumps run as separate tasks. Whichever finishes first (or panics)
/// ends the connection: the other is aborted and the hub is told exactly
/// once.
pub async fn serve(socket: WebSocket, hub: RoomHub, peer: Peer) {
    let (sink, stream) = socket.split();
    run_connection(sink, stream, hub, peer).await;
}

async fn run_connection<S, St, E>(sink: S, stream: St, hub: RoomHub, peer: Peer)
where
    S: Sink<Message> + Unpin + Send + 'static,
    St: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Debug + Send + 'static,
{
    let settings = hub.settings();
    let (client, mailbox) = hub.client(&peer.room_id, &peer.user_id, peer.username.clone());
    let conn_id = client.conn_id.clone();
    let replies = client.sender();
    hub.register(client);

    let mut writer = tokio::spawn(write_pump(sink, mailbox, settings));
    let mut reader = tokio::spawn(read_pump(stream, replies, settings));

    let (pump, outcome) = tokio::select! {
        res = &mut writer => {
            reader.abort();
            ("write", res)
        }
        res = &mut reader => {
            writer.abort();
            ("read", res)
        }
    };

    match outcome {
        Ok(reason) => {
            tracing::debug!(conn_id = %conn_id, user_id = %peer.user_id, pump, reason, "connection finished");
        }
        Err(err) if err.is_panic() => {
            tracing::error!(conn_id = %conn_id, user_id = %peer.user_id, pump, "connection pump panicked");
        }
        Err(err) => {
            tracing::debug!(conn_id = %conn_id, pump, ?err, "connection pump cancelled");
        }
    }

    hub.unregister(&peer.room_id, &conn_id, &peer.user_id);
}

/// Drain the outbound queue and keep the socket alive with pings.
async fn write_pump<S>(mut sink: S, mut mailbox: ClientMailbox, settings: HubConfig) -> &'static str
where
    S: Sink<Message> + Unpin,
{
    let mut ping = time::interval_at(Instant::now() + settings.ping_interval, settings.ping_interval);

    loop {
        tokio::select! {
            frame = mailbox.frames.recv() => {
                let Some(frame) = frame else {
                    send_close(&mut sink, CLOSE_NORMAL, "closing", settings).await;
                    return "queue closed";
                };
                if let Err(reason) = send(&mut sink, text(&frame), settings).await {
                    return reason;
                }
            }
            _ = ping.tick() => {
                if let Err(reason) = send(&mut sink, Message::Ping(Bytes::new()), settings).await {
                    return reason;
                }
            }
            changed = mailbox.close.changed() => {
                if changed.is_err() || *mailbox.close.borrow() {
                    send_close(&mut sink, CLOSE_GOING_AWAY, "server closing connection", settings).await;
                    return "close requested";
                }
            }
        }
    }
}

/// Read inbound frames until the peer leaves or goes quiet for longer than
/// the read timeout. Any frame, pongs included, resets the timer.
async fn read_pump<St, E>(mut stream: St, replies: mpsc::Sender<Frame>, settings: HubConfig) -> &'static str
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Debug,
{
    loop {
        let msg = match time::timeout(settings.read_timeout, stream.next()).await {
            Err(_) => return "read timeout",
            Ok(None) => return "stream ended",
            Ok(Some(Err(err))) => {
                tracing::debug!(?err, "ws read error");
                return "read error";
            }
            Ok(Some(Ok(msg))) => msg,
        };

        match msg {
            Message::Text(body) => handle_text(body.as_str(), &replies),
            Message::Close(_) => return "peer closed",
            // Protocol pings are answered by the WebSocket layer.
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }
}

fn handle_text(body: &str, replies: &mpsc::Sender<Frame>) {
    let Ok(envelope) = serde_json::from_str::<Envelope>(body) else {
        tracing::debug!("ignoring malformed client message");
        return;
    };
    if envelope.kind != events::TYPE_PING {
        return;
    }
    match events::encode_pong() {
        Ok(frame) => {
            if replies.try_send(frame).is_err() {
                tracing::debug!("send queue full, pong skipped");
            }
        }
        Err(err) => tracing::error!(?err, "failed to encode pong"),
    }
}

fn text(frame: &Frame) -> Message {
    Message::Text(frame.to_string().into())
}

async fn send<S>(sink: &mut S, msg: Message, settings: HubConfig) -> Result<(), &'static str>
where
    S: Sink<Message> + Unpin,
{
    match time::timeout(settings.write_timeout, sink.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err("write error"),
        Err(_) => Err("write timeout"),
    }
}

async fn send_close<S>(sink: &mut S, code: u16, reason: &'static str, settings: HubConfig)
where
    S: Sink<Message> + Unpin,
{
    let close = Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    let _ = send(sink, close, settings).await;
}

//! Per-room subscription management for the message stream.
//!
//! Each displayed room owns one [`RoomSubscription`]. A spawned task holds
//! the WebSocket and is the single owner of all stream I/O: commands
//! arrive over an mpsc channel, state and snapshots leave over watch
//! channels. Because the task processes one thing at a time, a resync
//! tick can never interrupt an in-flight send.
//!
//! Inbound `messages` events carry the server's full message set and
//! replace the local snapshot wholesale, which also keeps the view free
//! of duplicates across resyncs.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::StreamError;
use crate::models::Message;
use crate::protocol::{ClientCommand, ServerEvent};
use crate::session::SessionStore;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Stream lifecycle, per room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Joined,
}

/// The latest full message snapshot received from the server.
#[derive(Debug, Clone, Default)]
pub struct RoomSnapshot {
    pub messages: Vec<Message>,
    pub received_at: Option<DateTime<Utc>>,
}

enum Command {
    Send {
        text: String,
        done: oneshot::Sender<Result<(), StreamError>>,
    },
    Close,
}

enum Outcome {
    Closed,
    Lost,
}

/// Handle to one room's message stream.
///
/// Dropping the handle aborts the owning task; prefer [`close`] for an
/// orderly shutdown. Either way the resync timer is cancelled with the
/// task and late inbound events become no-ops.
///
/// [`close`]: RoomSubscription::close
pub struct RoomSubscription {
    room: String,
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    snapshot_rx: watch::Receiver<RoomSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl RoomSubscription {
    /// Spawn the connection task for a room and return its handle.
    pub fn spawn(config: ClientConfig, session: SessionStore, room: impl Into<String>) -> Self {
        let room = room.into();
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (snapshot_tx, snapshot_rx) = watch::channel(RoomSnapshot::default());
        let task = tokio::spawn(run(
            config,
            session,
            room.clone(),
            cmd_rx,
            state_tx,
            snapshot_tx,
        ));
        Self {
            room,
            cmd_tx,
            state_rx,
            snapshot_rx,
            task: Some(task),
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Watch state transitions (`Disconnected -> Connecting -> Joined`).
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Watch raw snapshot replacements.
    pub fn watch_snapshot(&self) -> watch::Receiver<RoomSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Messages for this room, newest first.
    ///
    /// The snapshot may carry messages for other rooms; they never appear
    /// in this view.
    pub fn messages(&self) -> Vec<Message> {
        room_view(&self.snapshot_rx.borrow().messages, &self.room)
    }

    pub fn last_snapshot_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot_rx.borrow().received_at
    }

    /// Send a message into the room.
    ///
    /// Fails with [`StreamError::NotJoined`] when the stream is not in the
    /// `Joined` state; the message is never silently dropped. On success
    /// the connection task has already written the message to the wire
    /// and requested a fresh snapshot on the same connection.
    pub async fn send_message(&self, text: &str) -> Result<(), StreamError> {
        if self.state() != ConnectionState::Joined {
            return Err(StreamError::NotJoined);
        }
        let (done_tx, done_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Send {
                text: text.to_string(),
                done: done_tx,
            })
            .await
            .map_err(|_| StreamError::Closed)?;
        done_rx.await.map_err(|_| StreamError::Closed)?
    }

    /// Close the stream and cancel the resync timer, waiting for the
    /// connection task to finish.
    pub async fn close(mut self) {
        let _ = self.cmd_tx.send(Command::Close).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

fn room_view(messages: &[Message], room: &str) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| m.room == room)
        .rev()
        .cloned()
        .collect()
}

async fn run(
    config: ClientConfig,
    session: SessionStore,
    room: String,
    mut cmd_rx: mpsc::Receiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    snapshot_tx: watch::Sender<RoomSnapshot>,
) {
    let url = config.ws_url();
    let mut attempt: u32 = 0;

    loop {
        let _ = state_tx.send(ConnectionState::Connecting);

        // Keep serving commands while the connect is in flight so a close
        // during a stalled connect takes effect immediately.
        let mut connect =
            std::pin::pin!(connect_and_join(&url, &room, &session, config.connect_timeout));
        let connected = loop {
            tokio::select! {
                result = &mut connect => break result,
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Close) | None => return,
                    Some(Command::Send { done, .. }) => {
                        let _ = done.send(Err(StreamError::NotJoined));
                    }
                },
            }
        };

        match connected {
            Ok(ws) => {
                attempt = 0;
                let _ = state_tx.send(ConnectionState::Joined);
                info!(room, "joined");
                let outcome = serve(ws, &room, &mut cmd_rx, &snapshot_tx, config.resync_interval).await;
                let _ = state_tx.send(ConnectionState::Disconnected);
                if matches!(outcome, Outcome::Closed) {
                    return;
                }
            }
            Err(e) => {
                warn!(room, error = %e, "connect failed");
                let _ = state_tx.send(ConnectionState::Disconnected);
            }
        }

        if config.reconnect.max_attempts > 0 && attempt >= config.reconnect.max_attempts {
            warn!(room, attempts = attempt, "giving up on reconnect");
            return;
        }
        let delay = Duration::from_millis(config.reconnect.delay_for_attempt(attempt));
        attempt += 1;

        // Stay responsive to close while waiting to reconnect
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Close) | None => return,
                Some(Command::Send { done, .. }) => {
                    let _ = done.send(Err(StreamError::NotJoined));
                }
            },
        }
    }
}

async fn connect_and_join(
    url: &str,
    room: &str,
    session: &SessionStore,
    connect_timeout: Duration,
) -> Result<WsStream, StreamError> {
    let (mut ws, _) = tokio::time::timeout(connect_timeout, connect_async(url))
        .await
        .map_err(|_| StreamError::Transport(format!("connect timed out after {connect_timeout:?}")))?
        .map_err(|e| StreamError::Transport(e.to_string()))?;
    if let Some(name) = session.user_name() {
        send_command(&mut ws, &ClientCommand::Username(name)).await?;
    }
    send_command(&mut ws, &ClientCommand::JoinRoom(room.to_string())).await?;
    Ok(ws)
}

async fn send_command(ws: &mut WsStream, cmd: &ClientCommand) -> Result<(), StreamError> {
    let json = serde_json::to_string(cmd).map_err(|e| StreamError::Transport(e.to_string()))?;
    ws.send(WsMessage::Text(json.into()))
        .await
        .map_err(|e| StreamError::Transport(e.to_string()))
}

async fn serve(
    mut ws: WsStream,
    room: &str,
    cmd_rx: &mut mpsc::Receiver<Command>,
    snapshot_tx: &watch::Sender<RoomSnapshot>,
    resync_interval: Duration,
) -> Outcome {
    let mut resync = tokio::time::interval(resync_interval);
    resync.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // the first tick completes immediately; the join already requested a snapshot
    resync.tick().await;

    loop {
        tokio::select! {
            inbound = ws.next() => match inbound {
                Some(Ok(WsMessage::Text(frame))) => {
                    match serde_json::from_str::<ServerEvent>(frame.as_str()) {
                        Ok(ServerEvent::Messages(batch)) => {
                            let messages: Vec<Message> =
                                batch.into_iter().map(Message::from).collect();
                            debug!(room, count = messages.len(), "snapshot replaced");
                            let _ = snapshot_tx.send(RoomSnapshot {
                                messages,
                                received_at: Some(Utc::now()),
                            });
                        }
                        Ok(_) => {}
                        Err(e) => debug!(room, error = %e, "ignoring unparseable frame"),
                    }
                }
                Some(Ok(WsMessage::Ping(payload))) => {
                    let _ = ws.send(WsMessage::Pong(payload)).await;
                }
                Some(Ok(WsMessage::Close(_))) | None => return Outcome::Lost,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(room, error = %e, "stream error");
                    return Outcome::Lost;
                }
            },
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Send { text, done }) => {
                    // Send, then request a fresh snapshot on the same
                    // connection. Both complete before the next command or
                    // resync tick is processed.
                    let result = async {
                        send_command(&mut ws, &ClientCommand::Send {
                            message: text,
                            room: room.to_string(),
                        })
                        .await?;
                        send_command(&mut ws, &ClientCommand::JoinRoom(room.to_string())).await
                    }
                    .await;
                    let failed = result.is_err();
                    let _ = done.send(result);
                    if failed {
                        return Outcome::Lost;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = ws.close(None).await;
                    return Outcome::Closed;
                }
            },
            _ = resync.tick() => {
                debug!(room, "resync tick");
                if send_command(&mut ws, &ClientCommand::JoinRoom(room.to_string())).await.is_err() {
                    return Outcome::Lost;
                }
            }
        }
    }
}

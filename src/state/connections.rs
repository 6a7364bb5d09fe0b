use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    dto::ws::ServerMessage,
    state::player::{PlayerId, SessionId},
};

/// Delivery seam used by the lobby and game services to reach players.
///
/// Sends are fire-and-forget: a player without a live connection simply misses the message.
pub trait Notifier: Send + Sync {
    /// Deliver `message` to one player.
    fn send(&self, player_id: PlayerId, message: &ServerMessage);

    /// Deliver `message` to every player in `recipients`.
    fn broadcast(&self, recipients: &[PlayerId], message: &ServerMessage) {
        for player_id in recipients {
            self.send(*player_id, message);
        }
    }
}

#[derive(Clone, Debug)]
/// Handle used to push frames to a connected player.
pub struct PlayerConnection {
    pub session_id: SessionId,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Live websocket connections keyed by player.
#[derive(Default)]
pub struct ConnectionHub {
    connections: DashMap<PlayerId, PlayerConnection>,
}

impl ConnectionHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a player to a connection, replacing any previous binding.
    pub fn attach(&self, player_id: PlayerId, connection: PlayerConnection) {
        self.connections.insert(player_id, connection);
    }

    /// Unbind a player, unless it has been rebound to another connection since.
    pub fn detach(&self, player_id: PlayerId, session_id: SessionId) -> bool {
        self.connections
            .remove_if(&player_id, |_, connection| connection.session_id == session_id)
            .is_some()
    }

    /// Whether the player currently has a live connection.
    pub fn is_connected(&self, player_id: PlayerId) -> bool {
        self.connections.contains_key(&player_id)
    }

    /// Number of bound connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is bound.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn sender(&self, player_id: PlayerId) -> Option<mpsc::UnboundedSender<Message>> {
        self.connections
            .get(&player_id)
            .map(|connection| connection.tx.clone())
    }
}

impl Notifier for ConnectionHub {
    fn send(&self, player_id: PlayerId, message: &ServerMessage) {
        let Some(tx) = self.sender(player_id) else {
            debug!(player_id = %player_id, "dropping message for disconnected player");
            return;
        };
        if send_message_to_websocket(&tx, message).is_err() {
            debug!(player_id = %player_id, "writer closed, dropping message");
        }
    }

    fn broadcast(&self, recipients: &[PlayerId], message: &ServerMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize broadcast `{message:?}`");
                return;
            }
        };

        for player_id in recipients {
            if let Some(tx) = self.sender(*player_id) {
                let _ = tx.send(Message::Text(payload.clone().into()));
            }
        }
    }
}

/// Error returned when the writer side of a socket is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionClosed;

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// A serialization failure is logged and swallowed since retrying cannot help.
pub fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ConnectionClosed>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::state::lobby::LobbyId;

/// Identifier of a player.
pub type PlayerId = Uuid;
/// Identifier of a transport connection.
pub type SessionId = Uuid;

/// A participant known to the server.
#[derive(Debug, Clone)]
pub struct Player {
    /// Stable identifier.
    pub id: PlayerId,
    /// Display name.
    pub nickname: String,
    /// Connection the player is currently bound to.
    pub session_id: SessionId,
    /// Readiness mirrored from the player's lobby.
    pub is_ready: bool,
    /// Lobby the player is currently a member of.
    pub current_lobby: Option<LobbyId>,
    /// Last time the player did anything.
    pub last_activity: Instant,
}

impl Player {
    fn new(session_id: SessionId, nickname: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            nickname,
            session_id,
            is_ready: false,
            current_lobby: None,
            last_activity: Instant::now(),
        }
    }
}

/// Concurrent registry of players keyed by id, with a secondary index by connection.
#[derive(Default)]
pub struct PlayerRegistry {
    players: DashMap<PlayerId, Player>,
    sessions: DashMap<SessionId, PlayerId>,
}

impl PlayerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the player bound to `session_id`, creating it on first contact.
    ///
    /// A known player gets its nickname refreshed.
    pub fn register(&self, session_id: SessionId, nickname: &str) -> Player {
        let existing = self.sessions.get(&session_id).map(|entry| *entry.value());
        if let Some(player_id) = existing {
            if let Some(mut player) = self.players.get_mut(&player_id) {
                player.nickname = nickname.to_string();
                player.last_activity = Instant::now();
                return player.clone();
            }
        }

        let player = Player::new(session_id, nickname.to_string());
        self.players.insert(player.id, player.clone());
        self.sessions.insert(session_id, player.id);
        player
    }

    /// Look up a player by id.
    pub fn get(&self, player_id: PlayerId) -> Option<Player> {
        self.players.get(&player_id).map(|entry| entry.value().clone())
    }

    /// Look up the player bound to a connection.
    pub fn by_session(&self, session_id: SessionId) -> Option<Player> {
        let player_id = self.sessions.get(&session_id).map(|entry| *entry.value())?;
        self.get(player_id)
    }

    /// Nickname of a player, if known.
    pub fn nickname(&self, player_id: PlayerId) -> Option<String> {
        self.players
            .get(&player_id)
            .map(|entry| entry.nickname.clone())
    }

    /// Record the lobby a player belongs to; leaving a lobby also clears readiness.
    pub fn set_lobby(&self, player_id: PlayerId, lobby_id: Option<LobbyId>) {
        if let Some(mut player) = self.players.get_mut(&player_id) {
            if lobby_id.is_none() {
                player.is_ready = false;
            }
            player.current_lobby = lobby_id;
            player.last_activity = Instant::now();
        }
    }

    /// Clear the lobby reference only if it still points at `lobby_id`.
    pub fn clear_lobby_if(&self, player_id: PlayerId, lobby_id: LobbyId) {
        if let Some(mut player) = self.players.get_mut(&player_id) {
            if player.current_lobby == Some(lobby_id) {
                player.current_lobby = None;
                player.is_ready = false;
            }
        }
    }

    /// Mirror a readiness flag.
    pub fn set_ready(&self, player_id: PlayerId, ready: bool) {
        if let Some(mut player) = self.players.get_mut(&player_id) {
            player.is_ready = ready;
            player.last_activity = Instant::now();
        }
    }

    /// Refresh the activity timestamp.
    pub fn touch(&self, player_id: PlayerId) {
        if let Some(mut player) = self.players.get_mut(&player_id) {
            player.last_activity = Instant::now();
        }
    }

    /// Drop a player and its connection binding.
    pub fn remove(&self, player_id: PlayerId) -> Option<Player> {
        let (_, player) = self.players.remove(&player_id)?;
        self.sessions
            .remove_if(&player.session_id, |_, bound| *bound == player_id);
        Some(player)
    }

    /// Remove players idle for longer than `timeout` for which `keep` returns false.
    pub fn sweep_stale<F>(&self, now: Instant, timeout: Duration, keep: F) -> Vec<PlayerId>
    where
        F: Fn(PlayerId) -> bool,
    {
        let stale: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.last_activity) >= timeout)
            .map(|entry| *entry.key())
            .collect();

        stale
            .into_iter()
            .filter(|player_id| !keep(*player_id))
            .filter(|player_id| self.remove(*player_id).is_some())
            .collect()
    }

    /// Number of registered players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether no player is registered.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_per_session() {
        let registry = PlayerRegistry::new();
        let session = Uuid::new_v4();

        let first = registry.register(session, "alice");
        let second = registry.register(session, "alice2");

        assert_eq!(first.id, second.id);
        assert_eq!(second.nickname, "alice2");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.by_session(session).unwrap().id, first.id);
    }

    #[test]
    fn leaving_lobby_clears_readiness() {
        let registry = PlayerRegistry::new();
        let player = registry.register(Uuid::new_v4(), "alice");
        let lobby_id = Uuid::new_v4();

        registry.set_lobby(player.id, Some(lobby_id));
        registry.set_ready(player.id, true);
        registry.set_lobby(player.id, None);

        let player = registry.get(player.id).unwrap();
        assert!(!player.is_ready);
        assert!(player.current_lobby.is_none());
    }

    #[test]
    fn clear_lobby_if_ignores_other_lobbies() {
        let registry = PlayerRegistry::new();
        let player = registry.register(Uuid::new_v4(), "alice");
        let lobby_id = Uuid::new_v4();
        registry.set_lobby(player.id, Some(lobby_id));

        registry.clear_lobby_if(player.id, Uuid::new_v4());
        assert_eq!(registry.get(player.id).unwrap().current_lobby, Some(lobby_id));

        registry.clear_lobby_if(player.id, lobby_id);
        assert!(registry.get(player.id).unwrap().current_lobby.is_none());
    }

    #[test]
    fn remove_drops_session_binding() {
        let registry = PlayerRegistry::new();
        let session = Uuid::new_v4();
        let player = registry.register(session, "alice");

        registry.remove(player.id);
        assert!(registry.by_session(session).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn sweep_keeps_connected_players() {
        let registry = PlayerRegistry::new();
        let kept = registry.register(Uuid::new_v4(), "alice");
        let dropped = registry.register(Uuid::new_v4(), "bob");
        let later = Instant::now() + Duration::from_secs(3600);

        let removed = registry.sweep_stale(later, Duration::from_secs(60), |id| id == kept.id);

        assert_eq!(removed, vec![dropped.id]);
        assert!(registry.get(kept.id).is_some());
    }
}

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::state::{
    game::{GameId, GameSession},
    lobby::{Lobby, LobbyId},
    timer::QuestionTimer,
};

/// A running game together with its auto-advance timer.
#[derive(Debug)]
pub struct ActiveGame {
    /// Game state.
    pub session: GameSession,
    /// Timer advancing the current question.
    pub timer: QuestionTimer,
}

impl ActiveGame {
    fn new(session: GameSession) -> Self {
        Self {
            session,
            timer: QuestionTimer::new(),
        }
    }
}

/// Shared, individually locked lobby.
pub type LobbyHandle = Arc<Mutex<Lobby>>;
/// Shared, individually locked game.
pub type GameHandle = Arc<Mutex<ActiveGame>>;

/// Number of entries in each registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryCounts {
    /// Registered lobbies.
    pub lobbies: usize,
    /// Registered games.
    pub games: usize,
}

/// Lookup tables for lobbies and games.
///
/// Each entry is locked on its own, so operations on different sessions never contend.
/// Registry references are never held across an await point.
#[derive(Default)]
pub struct SessionRegistry {
    lobbies: DashMap<LobbyId, LobbyHandle>,
    join_codes: DashMap<String, LobbyId>,
    games: DashMap<GameId, GameHandle>,
}

impl SessionRegistry {
    /// Create empty registries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lobby and its join code.
    pub fn insert_lobby(&self, lobby: Lobby) -> LobbyHandle {
        let id = lobby.id;
        if let Some(code) = lobby.join_code.as_deref() {
            self.join_codes.insert(code.to_ascii_uppercase(), id);
        }
        let handle = Arc::new(Mutex::new(lobby));
        self.lobbies.insert(id, handle.clone());
        handle
    }

    /// Look up a lobby.
    pub fn lobby(&self, id: LobbyId) -> Option<LobbyHandle> {
        self.lobbies.get(&id).map(|entry| entry.value().clone())
    }

    /// Resolve a private lobby from its join code, ignoring case.
    pub fn lobby_by_code(&self, code: &str) -> Option<(LobbyId, LobbyHandle)> {
        let id = self
            .join_codes
            .get(&code.trim().to_ascii_uppercase())
            .map(|entry| *entry.value())?;
        self.lobby(id).map(|handle| (id, handle))
    }

    /// Drop a lobby and its join code.
    pub fn remove_lobby(&self, id: LobbyId) -> Option<LobbyHandle> {
        self.join_codes.retain(|_, lobby_id| *lobby_id != id);
        self.lobbies.remove(&id).map(|(_, handle)| handle)
    }

    /// Every lobby currently registered.
    pub fn lobbies(&self) -> Vec<(LobbyId, LobbyHandle)> {
        self.lobbies
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Register a game.
    pub fn insert_game(&self, session: GameSession) -> GameHandle {
        let id = session.id;
        let handle = Arc::new(Mutex::new(ActiveGame::new(session)));
        self.games.insert(id, handle.clone());
        handle
    }

    /// Look up a game.
    pub fn game(&self, id: GameId) -> Option<GameHandle> {
        self.games.get(&id).map(|entry| entry.value().clone())
    }

    /// Drop a game.
    pub fn remove_game(&self, id: GameId) -> Option<GameHandle> {
        self.games.remove(&id).map(|(_, handle)| handle)
    }

    /// Every game currently registered.
    pub fn games(&self) -> Vec<(GameId, GameHandle)> {
        self.games
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Current sizes.
    pub fn counts(&self) -> RegistryCounts {
        RegistryCounts {
            lobbies: self.lobbies.len(),
            games: self.games.len(),
        }
    }
}

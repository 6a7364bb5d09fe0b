use std::time::{Duration, Instant, SystemTime};

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    game::GameId,
    player::PlayerId,
    settings::{GameSettings, SettingsUpdate},
};

/// Identifier of a lobby.
pub type LobbyId = Uuid;

/// Default member cap of a lobby.
pub const DEFAULT_MAX_MEMBERS: usize = 4;
/// Members required before a game can start.
pub const MIN_PLAYERS_TO_START: usize = 2;
/// Length of private join codes.
pub const JOIN_CODE_LENGTH: usize = 6;
/// Join code alphabet, without easily confused characters (0/O, 1/I).
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Lifecycle status of a lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LobbyStatus {
    /// Accepting members.
    Waiting,
    /// A game spawned from this lobby is running.
    InGame,
    /// The last game ended; the owner may start another one.
    Finished,
}

/// Errors raised by lobby operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LobbyError {
    /// The lobby does not exist (or was just deleted).
    #[error("lobby not found")]
    NotFound,
    /// Private lobby joined with a wrong or missing code.
    #[error("invalid join code")]
    InvalidJoinCode,
    /// Member cap reached.
    #[error("lobby is full")]
    Full,
    /// Lobby does not accept members in its current status.
    #[error("cannot join lobby while it is {0:?}")]
    NotJoinable(LobbyStatus),
    /// Player already belongs to the lobby.
    #[error("player is already in this lobby")]
    AlreadyMember,
    /// Player is not a member of the lobby.
    #[error("player is not a member of this lobby")]
    NotMember,
    /// Only the owner can perform this action.
    #[error("only the lobby owner can do this")]
    NotOwner,
    /// Too few members to start.
    #[error("at least {required} players are required to start (have {actual})")]
    NotEnoughPlayers {
        /// Members required.
        required: usize,
        /// Members present.
        actual: usize,
    },
    /// Someone is not ready yet.
    #[error("all players must be ready to start")]
    NotAllReady,
    /// A game is already running for this lobby.
    #[error("a game is already running for this lobby")]
    GameRunning,
    /// The owner tried to kick themselves.
    #[error("the lobby owner cannot kick themselves")]
    CannotKickSelf,
}

/// Membership record of a player inside a lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyMember {
    /// Nickname at join time.
    pub nickname: String,
    /// Readiness flag toggled by the member.
    pub is_ready: bool,
    /// When the member joined.
    pub joined_at: SystemTime,
}

/// Result of removing a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Members remain; carries the new owner when ownership moved.
    Remaining {
        /// New owner if the leaver owned the lobby.
        new_owner: Option<PlayerId>,
    },
    /// The last member left; the lobby must be deleted.
    Emptied,
}

/// Pre-game grouping of players.
#[derive(Debug, Clone)]
pub struct Lobby {
    /// Stable identifier.
    pub id: LobbyId,
    /// Display name.
    pub name: String,
    /// Whether joining requires the join code.
    pub is_private: bool,
    /// Join code, generated for private lobbies only.
    pub join_code: Option<String>,
    owner_id: PlayerId,
    members: IndexMap<PlayerId, LobbyMember>,
    /// Member cap.
    pub max_members: usize,
    /// Settings copied into every game started here.
    pub settings: GameSettings,
    /// Lifecycle status.
    pub status: LobbyStatus,
    /// Game currently running for this lobby.
    pub active_game: Option<GameId>,
    /// Creation time.
    pub created_at: SystemTime,
    /// Last mutation time.
    pub last_activity: Instant,
    closed: bool,
}

impl Lobby {
    /// Create a lobby with `owner_id` as sole member.
    pub fn new(
        name: impl Into<String>,
        owner_id: PlayerId,
        owner_nickname: impl Into<String>,
        is_private: bool,
        max_members: usize,
        settings: GameSettings,
    ) -> Self {
        let now = SystemTime::now();
        let mut members = IndexMap::new();
        members.insert(
            owner_id,
            LobbyMember {
                nickname: owner_nickname.into(),
                is_ready: false,
                joined_at: now,
            },
        );

        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_private,
            join_code: is_private.then(|| generate_join_code(&mut rand::rng())),
            owner_id,
            members,
            max_members: max_members.max(1),
            settings,
            status: LobbyStatus::Waiting,
            active_game: None,
            created_at: now,
            last_activity: Instant::now(),
            closed: false,
        }
    }

    /// Current owner, always a member.
    pub fn owner_id(&self) -> PlayerId {
        self.owner_id
    }

    /// Members in join order.
    pub fn members(&self) -> &IndexMap<PlayerId, LobbyMember> {
        &self.members
    }

    /// Member ids in join order.
    pub fn member_ids(&self) -> Vec<PlayerId> {
        self.members.keys().copied().collect()
    }

    /// Whether `player_id` is a member.
    pub fn is_member(&self, player_id: PlayerId) -> bool {
        self.members.contains_key(&player_id)
    }

    /// Whether the lobby was emptied and is awaiting removal from the registry.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Check every join rule without mutating anything.
    pub fn check_join(&self, player_id: PlayerId, supplied_code: Option<&str>) -> Result<(), LobbyError> {
        if self.closed {
            return Err(LobbyError::NotFound);
        }
        if self.is_private && !self.code_matches(supplied_code) {
            return Err(LobbyError::InvalidJoinCode);
        }
        if self.members.contains_key(&player_id) {
            return Err(LobbyError::AlreadyMember);
        }
        if self.members.len() >= self.max_members {
            return Err(LobbyError::Full);
        }
        if self.status != LobbyStatus::Waiting {
            return Err(LobbyError::NotJoinable(self.status));
        }
        Ok(())
    }

    /// Append a member after checking the join rules.
    pub fn join(
        &mut self,
        player_id: PlayerId,
        nickname: impl Into<String>,
        supplied_code: Option<&str>,
    ) -> Result<(), LobbyError> {
        self.check_join(player_id, supplied_code)?;
        self.members.insert(
            player_id,
            LobbyMember {
                nickname: nickname.into(),
                is_ready: false,
                joined_at: SystemTime::now(),
            },
        );
        self.touch();
        Ok(())
    }

    /// Remove a member, moving ownership to the earliest remaining member when needed.
    pub fn leave(&mut self, player_id: PlayerId) -> Result<LeaveOutcome, LobbyError> {
        if self.closed {
            return Err(LobbyError::NotFound);
        }
        if self.members.shift_remove(&player_id).is_none() {
            return Err(LobbyError::NotMember);
        }
        self.touch();

        let Some(next_owner) = self.members.keys().next().copied() else {
            self.closed = true;
            return Ok(LeaveOutcome::Emptied);
        };

        if self.owner_id == player_id {
            self.owner_id = next_owner;
            return Ok(LeaveOutcome::Remaining {
                new_owner: Some(next_owner),
            });
        }

        Ok(LeaveOutcome::Remaining { new_owner: None })
    }

    /// Remove `target` on behalf of the owner.
    pub fn kick(&mut self, owner_id: PlayerId, target: PlayerId) -> Result<LeaveOutcome, LobbyError> {
        self.ensure_owner(owner_id)?;
        if owner_id == target {
            return Err(LobbyError::CannotKickSelf);
        }
        self.leave(target)
    }

    /// Flip a member's readiness, returning the new value.
    pub fn toggle_ready(&mut self, player_id: PlayerId) -> Result<bool, LobbyError> {
        let member = self
            .members
            .get_mut(&player_id)
            .ok_or(LobbyError::NotMember)?;
        member.is_ready = !member.is_ready;
        let ready = member.is_ready;
        self.touch();
        Ok(ready)
    }

    /// Apply an owner's settings change while the lobby is not running a game.
    pub fn update_settings(
        &mut self,
        player_id: PlayerId,
        update: &SettingsUpdate,
    ) -> Result<(), LobbyError> {
        self.ensure_owner(player_id)?;
        if self.status == LobbyStatus::InGame {
            return Err(LobbyError::GameRunning);
        }
        self.settings.apply(update);
        self.touch();
        Ok(())
    }

    /// Check that `player_id` may start a game right now.
    pub fn ensure_can_start(&self, player_id: PlayerId) -> Result<(), LobbyError> {
        self.ensure_owner(player_id)?;
        if self.status == LobbyStatus::InGame {
            return Err(LobbyError::GameRunning);
        }
        if self.members.len() < MIN_PLAYERS_TO_START {
            return Err(LobbyError::NotEnoughPlayers {
                required: MIN_PLAYERS_TO_START,
                actual: self.members.len(),
            });
        }
        if !self.members.values().all(|member| member.is_ready) {
            return Err(LobbyError::NotAllReady);
        }
        Ok(())
    }

    /// Fail unless `player_id` owns the lobby.
    pub fn ensure_owner(&self, player_id: PlayerId) -> Result<(), LobbyError> {
        if self.owner_id != player_id {
            return Err(LobbyError::NotOwner);
        }
        Ok(())
    }

    /// Lock the lobby for a game being created.
    pub fn begin_game(&mut self) {
        self.status = LobbyStatus::InGame;
        self.touch();
    }

    /// Undo [`Lobby::begin_game`] when the game could not be created.
    pub fn abort_game(&mut self, previous: LobbyStatus) {
        self.status = previous;
        self.active_game = None;
        self.touch();
    }

    /// Attach the created game.
    pub fn attach_game(&mut self, game_id: GameId) {
        self.active_game = Some(game_id);
        self.touch();
    }

    /// Mark the running game as over and require everyone to ready up again.
    pub fn finish_game(&mut self) {
        self.status = LobbyStatus::Finished;
        self.active_game = None;
        for member in self.members.values_mut() {
            member.is_ready = false;
        }
        self.touch();
    }

    /// Whether the lobby has been idle for longer than `timeout`.
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= timeout
    }

    /// Mark the lobby as removed so concurrent holders stop using it.
    pub fn close(&mut self) {
        self.closed = true;
    }

    fn code_matches(&self, supplied: Option<&str>) -> bool {
        match (&self.join_code, supplied) {
            (Some(expected), Some(given)) => expected.eq_ignore_ascii_case(given.trim()),
            _ => false,
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Generate a random join code from the unambiguous alphabet.
pub fn generate_join_code<R: Rng>(rng: &mut R) -> String {
    (0..JOIN_CODE_LENGTH)
        .map(|_| {
            let index = rng.random_range(0..JOIN_CODE_ALPHABET.len());
            char::from(JOIN_CODE_ALPHABET[index])
        })
        .collect()
}

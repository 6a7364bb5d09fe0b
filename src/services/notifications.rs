//! Decides who hears about what: fan-out helpers shared by the lobby and game services.

use tracing::warn;

use crate::{
    dto::{
        lobby::{LobbyListResponse, LobbySummary, LobbyView},
        sse::{LOBBIES_UPDATED, ServerEvent},
        ws::ServerMessage,
    },
    state::{
        SharedState,
        game::GameSession,
        lobby::{Lobby, LobbyStatus},
        player::PlayerId,
    },
};

/// Send a message to one player.
pub fn to_player(state: &SharedState, player_id: PlayerId, message: &ServerMessage) {
    state.notifier().send(player_id, message);
}

/// Send a message to every member of a lobby.
pub fn to_lobby(state: &SharedState, lobby: &Lobby, message: &ServerMessage) {
    state.notifier().broadcast(&lobby.member_ids(), message);
}

/// Send a message to every member of a lobby except `skip`.
pub fn to_lobby_except(state: &SharedState, lobby: &Lobby, skip: PlayerId, message: &ServerMessage) {
    let recipients: Vec<PlayerId> = lobby
        .member_ids()
        .into_iter()
        .filter(|player_id| *player_id != skip)
        .collect();
    state.notifier().broadcast(&recipients, message);
}

/// Push the member view of a lobby to its members.
pub fn lobby_updated(state: &SharedState, lobby: &Lobby) {
    to_lobby(
        state,
        lobby,
        &ServerMessage::LobbyUpdated(LobbyView::from_lobby(lobby, true)),
    );
}

/// Send a message to the active participants of a game.
pub fn to_game(state: &SharedState, game: &GameSession, message: &ServerMessage) {
    state
        .notifier()
        .broadcast(&game.active_participants(), message);
}

/// Whether a lobby belongs in the public browser.
pub fn is_listed(lobby: &Lobby) -> bool {
    !lobby.is_private && !lobby.is_closed() && lobby.status == LobbyStatus::Waiting
}

/// Public lobbies accepting members, oldest first.
///
/// Locks each lobby in turn; callers must not hold any lobby lock.
pub async fn public_lobbies(state: &SharedState) -> Vec<LobbySummary> {
    let mut listed = Vec::new();
    for (_, handle) in state.sessions().lobbies() {
        let lobby = handle.lock().await;
        if is_listed(&lobby) {
            listed.push((lobby.created_at, LobbySummary::from(&*lobby)));
        }
    }
    listed.sort_by_key(|(created_at, _)| *created_at);
    listed.into_iter().map(|(_, summary)| summary).collect()
}

/// Broadcast the public lobby list on the SSE feed.
///
/// Callers must not hold any lobby lock.
pub async fn publish_lobby_list(state: &SharedState) {
    if state.lobby_feed().subscriber_count() == 0 {
        return;
    }

    let payload = LobbyListResponse {
        lobbies: public_lobbies(state).await,
    };
    match ServerEvent::json(LOBBIES_UPDATED.to_string(), &payload) {
        Ok(event) => state.lobby_feed().broadcast(event),
        Err(err) => warn!(error = %err, "failed to serialize lobby list"),
    }
}

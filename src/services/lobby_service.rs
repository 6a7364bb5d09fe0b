use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        game::PlayerRef,
        lobby::{JoinCheckResponse, LobbySummary, LobbyView},
        ws::ServerMessage,
    },
    error::ServiceError,
    services::{
        notifications::{self, lobby_updated, publish_lobby_list, to_lobby, to_player},
        question_provider::fetch_topics,
    },
    state::{
        SharedState,
        game::{GameId, GameSession},
        lobby::{LeaveOutcome, Lobby, LobbyError, LobbyId, LobbyStatus, MIN_PLAYERS_TO_START},
        player::PlayerId,
        registry::LobbyHandle,
        settings::SettingsUpdate,
    },
};

/// How a player designates the lobby to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyRef {
    /// Lobby id, for public lobbies or when the code is supplied separately.
    Id(LobbyId),
    /// Join code of a private lobby.
    Code(String),
}

fn lobby_handle(state: &SharedState, lobby_id: LobbyId) -> Result<LobbyHandle, ServiceError> {
    state
        .sessions()
        .lobby(lobby_id)
        .ok_or_else(|| LobbyError::NotFound.into())
}

fn nickname_of(state: &SharedState, player_id: PlayerId) -> Result<String, ServiceError> {
    state
        .players()
        .nickname(player_id)
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}` not found")))
}

/// Leave whatever lobby the player currently sits in, unless it is `keep`.
async fn leave_current_lobby(state: &SharedState, player_id: PlayerId, keep: Option<LobbyId>) {
    let current = state
        .players()
        .get(player_id)
        .and_then(|player| player.current_lobby);
    if let Some(lobby_id) = current.filter(|id| Some(*id) != keep) {
        if let Err(err) = leave_lobby(state, player_id, lobby_id).await {
            warn!(player_id = %player_id, lobby_id = %lobby_id, error = %err, "failed to leave previous lobby");
            state.players().clear_lobby_if(player_id, lobby_id);
        }
    }
}

/// Create a lobby owned by `player_id`.
pub async fn create_lobby(
    state: &SharedState,
    player_id: PlayerId,
    name: &str,
    is_private: bool,
    settings: Option<SettingsUpdate>,
) -> Result<LobbyView, ServiceError> {
    let nickname = nickname_of(state, player_id)?;
    leave_current_lobby(state, player_id, None).await;

    let config = state.config();
    let mut game_settings = config.game_settings.clone();
    if let Some(update) = settings.as_ref() {
        game_settings.apply(update);
    }

    let lobby = Lobby::new(
        name.trim(),
        player_id,
        nickname.trim(),
        is_private,
        config.max_lobby_members,
        game_settings,
    );
    let view = LobbyView::from_lobby(&lobby, true);
    state.sessions().insert_lobby(lobby);
    state.players().set_lobby(player_id, Some(view.id));

    info!(lobby_id = %view.id, owner = %player_id, is_private, "lobby created");
    to_player(state, player_id, &ServerMessage::LobbyCreated(view.clone()));
    publish_lobby_list(state).await;
    Ok(view)
}

/// Add `player_id` to a lobby.
pub async fn join_lobby(
    state: &SharedState,
    player_id: PlayerId,
    target: LobbyRef,
    join_code: Option<&str>,
) -> Result<LobbyView, ServiceError> {
    let nickname = nickname_of(state, player_id)?;
    let (lobby_id, handle, code) = match &target {
        LobbyRef::Id(id) => (*id, lobby_handle(state, *id)?, join_code),
        LobbyRef::Code(code) => {
            let (id, handle) = state
                .sessions()
                .lobby_by_code(code)
                .ok_or(LobbyError::NotFound)?;
            (id, handle, Some(code.as_str()))
        }
    };
    leave_current_lobby(state, player_id, Some(lobby_id)).await;

    let view = {
        let mut lobby = handle.lock().await;
        lobby.join(player_id, nickname.trim(), code)?;

        let joined = ServerMessage::PlayerJoined {
            lobby_id,
            player: PlayerRef::from((player_id, nickname.trim().to_string())),
        };
        notifications::to_lobby_except(state, &lobby, player_id, &joined);
        lobby_updated(state, &lobby);
        LobbyView::from_lobby(&lobby, true)
    };
    state.players().set_lobby(player_id, Some(lobby_id));

    info!(lobby_id = %lobby_id, player_id = %player_id, "player joined lobby");
    publish_lobby_list(state).await;
    Ok(view)
}

/// Remove `player_id` from a lobby, deleting it once empty.
pub async fn leave_lobby(
    state: &SharedState,
    player_id: PlayerId,
    lobby_id: LobbyId,
) -> Result<(), ServiceError> {
    let handle = lobby_handle(state, lobby_id)?;
    let nickname = state.players().nickname(player_id).unwrap_or_default();

    {
        let mut lobby = handle.lock().await;
        let outcome = lobby.leave(player_id)?;
        let left = ServerMessage::PlayerLeft {
            lobby_id,
            player: PlayerRef::from((player_id, nickname)),
            kicked: false,
        };
        to_player(state, player_id, &left);

        match outcome {
            LeaveOutcome::Emptied => {
                state.sessions().remove_lobby(lobby_id);
                to_player(
                    state,
                    player_id,
                    &ServerMessage::LobbyDeleted {
                        lobby_id,
                        reason: "lobby is empty".into(),
                    },
                );
                info!(lobby_id = %lobby_id, "lobby deleted after last member left");
            }
            LeaveOutcome::Remaining { new_owner } => {
                if let Some(owner) = new_owner {
                    info!(lobby_id = %lobby_id, new_owner = %owner, "lobby ownership transferred");
                }
                to_lobby(state, &lobby, &left);
                lobby_updated(state, &lobby);
            }
        }
    }
    state.players().clear_lobby_if(player_id, lobby_id);

    publish_lobby_list(state).await;
    Ok(())
}

/// Remove `target` from a lobby on behalf of its owner.
pub async fn kick_player(
    state: &SharedState,
    owner_id: PlayerId,
    lobby_id: LobbyId,
    target: PlayerId,
) -> Result<(), ServiceError> {
    let handle = lobby_handle(state, lobby_id)?;
    let nickname = state.players().nickname(target).unwrap_or_default();

    {
        let mut lobby = handle.lock().await;
        lobby.kick(owner_id, target)?;
        let left = ServerMessage::PlayerLeft {
            lobby_id,
            player: PlayerRef::from((target, nickname)),
            kicked: true,
        };
        to_player(state, target, &left);
        to_lobby(state, &lobby, &left);
        lobby_updated(state, &lobby);
    }
    state.players().clear_lobby_if(target, lobby_id);

    info!(lobby_id = %lobby_id, player_id = %target, "player kicked from lobby");
    publish_lobby_list(state).await;
    Ok(())
}

/// Flip a member's readiness, returning the new flag.
pub async fn toggle_ready(
    state: &SharedState,
    player_id: PlayerId,
    lobby_id: LobbyId,
) -> Result<bool, ServiceError> {
    let handle = lobby_handle(state, lobby_id)?;
    let mut lobby = handle.lock().await;
    let ready = lobby.toggle_ready(player_id)?;
    state.players().set_ready(player_id, ready);
    lobby_updated(state, &lobby);
    Ok(ready)
}

/// Apply an owner's settings change.
pub async fn update_settings(
    state: &SharedState,
    player_id: PlayerId,
    lobby_id: LobbyId,
    update: &SettingsUpdate,
) -> Result<LobbyView, ServiceError> {
    let handle = lobby_handle(state, lobby_id)?;
    let mut lobby = handle.lock().await;
    lobby.update_settings(player_id, update)?;
    lobby_updated(state, &lobby);
    Ok(LobbyView::from_lobby(&lobby, true))
}

/// Delete a lobby on behalf of its owner.
pub async fn delete_lobby(
    state: &SharedState,
    player_id: PlayerId,
    lobby_id: LobbyId,
) -> Result<(), ServiceError> {
    let handle = lobby_handle(state, lobby_id)?;
    let members = {
        let mut lobby = handle.lock().await;
        if lobby.is_closed() {
            return Err(LobbyError::NotFound.into());
        }
        lobby.ensure_owner(player_id)?;
        if lobby.status == LobbyStatus::InGame {
            return Err(LobbyError::GameRunning.into());
        }
        lobby.close();
        state.sessions().remove_lobby(lobby_id);
        to_lobby(
            state,
            &lobby,
            &ServerMessage::LobbyDeleted {
                lobby_id,
                reason: "deleted by owner".into(),
            },
        );
        lobby.member_ids()
    };

    for member in members {
        state.players().clear_lobby_if(member, lobby_id);
    }
    info!(lobby_id = %lobby_id, "lobby deleted by owner");
    publish_lobby_list(state).await;
    Ok(())
}

/// Start a game from a lobby whose members are all ready.
///
/// The lobby is flagged in-game before the topics are fetched, so concurrent starts are rejected.
/// Only players still in the lobby once the topics arrive take part.
pub async fn start_game(
    state: &SharedState,
    player_id: PlayerId,
    lobby_id: LobbyId,
) -> Result<GameId, ServiceError> {
    let handle = lobby_handle(state, lobby_id)?;
    let (previous, participants, settings) = {
        let mut lobby = handle.lock().await;
        lobby.ensure_can_start(player_id)?;
        let previous = lobby.status;
        lobby.begin_game();
        let participants: Vec<(PlayerId, String)> = lobby
            .members()
            .iter()
            .map(|(id, member)| (*id, member.nickname.clone()))
            .collect();
        (previous, participants, lobby.settings.clone())
    };

    let config = state.config();
    let topics = fetch_topics(
        state.provider().as_ref(),
        config.topic_count,
        config.provider_timeout,
    )
    .await;

    let mut lobby = handle.lock().await;
    if lobby.is_closed() {
        return Err(LobbyError::NotFound.into());
    }

    // Members may have left while the topics were fetched.
    let participants: Vec<(PlayerId, String)> = participants
        .into_iter()
        .filter(|(id, _)| lobby.is_member(*id))
        .collect();
    if participants.len() < MIN_PLAYERS_TO_START {
        lobby.abort_game(previous);
        lobby_updated(state, &lobby);
        drop(lobby);
        warn!(
            lobby_id = %lobby_id,
            remaining = participants.len(),
            "game start aborted, members left"
        );
        publish_lobby_list(state).await;
        return Err(LobbyError::NotEnoughPlayers {
            required: MIN_PLAYERS_TO_START,
            actual: participants.len(),
        }
        .into());
    }

    let mut session = GameSession::new(lobby_id, participants.clone(), settings, topics);
    let game_id = session.id;
    if let Err(err) = session.start() {
        lobby.abort_game(previous);
        lobby_updated(state, &lobby);
        drop(lobby);
        publish_lobby_list(state).await;
        return Err(err.into());
    }
    lobby.attach_game(game_id);

    let participant_refs: Vec<PlayerRef> = participants.into_iter().map(PlayerRef::from).collect();
    let game_started = ServerMessage::GameStarted {
        game_id,
        total_rounds: session.total_rounds(),
        settings: session.settings().clone(),
    };
    let topic_selection = ServerMessage::TopicSelection {
        game_id,
        round_number: 1,
        available_topics: session.available_topics().to_vec(),
    };
    state.sessions().insert_game(session);

    to_lobby(
        state,
        &lobby,
        &ServerMessage::GameCreated {
            game_id,
            lobby_id,
            participants: participant_refs,
        },
    );
    to_lobby(state, &lobby, &game_started);
    to_lobby(state, &lobby, &topic_selection);
    lobby_updated(state, &lobby);
    drop(lobby);

    info!(lobby_id = %lobby_id, game_id = %game_id, "game started");
    publish_lobby_list(state).await;
    Ok(game_id)
}

/// Release a lobby whose game completed or was cancelled.
pub async fn finish_game(state: &SharedState, lobby_id: LobbyId, game_id: GameId) {
    let Some(handle) = state.sessions().lobby(lobby_id) else {
        return;
    };

    {
        let mut lobby = handle.lock().await;
        if lobby.is_closed() || lobby.active_game != Some(game_id) {
            return;
        }
        lobby.finish_game();
        for member in lobby.member_ids() {
            state.players().set_ready(member, false);
        }
        lobby_updated(state, &lobby);
    }

    info!(lobby_id = %lobby_id, game_id = %game_id, "lobby released after game");
    publish_lobby_list(state).await;
}

/// Check the join rules for a prospective player without joining.
pub async fn join_check(
    state: &SharedState,
    lobby_id: LobbyId,
    join_code: Option<&str>,
) -> Result<JoinCheckResponse, ServiceError> {
    let handle = lobby_handle(state, lobby_id)?;
    let lobby = handle.lock().await;
    let verdict = lobby.check_join(Uuid::new_v4(), join_code);
    Ok(JoinCheckResponse {
        lobby_id,
        can_join: verdict.is_ok(),
        reason: verdict.err().map(|err| err.to_string()),
    })
}

/// Public view of a lobby.
pub async fn lobby_view(state: &SharedState, lobby_id: LobbyId) -> Result<LobbyView, ServiceError> {
    let handle = lobby_handle(state, lobby_id)?;
    let lobby = handle.lock().await;
    if lobby.is_closed() {
        return Err(LobbyError::NotFound.into());
    }
    Ok(LobbyView::from_lobby(&lobby, false))
}

/// Public lobbies accepting members.
pub async fn list_public(state: &SharedState) -> Vec<LobbySummary> {
    notifications::public_lobbies(state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        services::game_service,
        test_support::{ScriptedProvider, TestHarness},
    };

    async fn lobby_with_two(harness: &TestHarness) -> (LobbyId, PlayerId, PlayerId) {
        let alice = harness.register("alice");
        let bob = harness.register("bob");
        let view = create_lobby(&harness.state, alice, "Quiz night", false, None)
            .await
            .unwrap();
        join_lobby(&harness.state, bob, LobbyRef::Id(view.id), None)
            .await
            .unwrap();
        (view.id, alice, bob)
    }

    #[tokio::test]
    async fn create_makes_owner_sole_member() {
        let harness = TestHarness::new();
        let alice = harness.register("alice");

        let view = create_lobby(&harness.state, alice, "  Quiz night ", true, None)
            .await
            .unwrap();

        assert_eq!(view.name, "Quiz night");
        assert_eq!(view.owner_id, alice);
        assert_eq!(view.members.len(), 1);
        assert_eq!(view.join_code.as_ref().map(String::len), Some(6));
        assert_eq!(
            harness.state.players().get(alice).unwrap().current_lobby,
            Some(view.id)
        );
        assert_eq!(harness.notifier.types_for(alice), vec!["lobby_created"]);
    }

    #[tokio::test]
    async fn create_applies_settings_patch() {
        let harness = TestHarness::new();
        let alice = harness.register("alice");
        let update = SettingsUpdate {
            max_rounds: Some(3),
            ..SettingsUpdate::default()
        };

        let view = create_lobby(&harness.state, alice, "Quiz night", false, Some(update))
            .await
            .unwrap();
        assert_eq!(view.settings.max_rounds, 3);
    }

    #[tokio::test]
    async fn private_lobby_requires_code() {
        let harness = TestHarness::new();
        let alice = harness.register("alice");
        let bob = harness.register("bob");
        let view = create_lobby(&harness.state, alice, "Secret", true, None)
            .await
            .unwrap();

        let err = join_lobby(&harness.state, bob, LobbyRef::Id(view.id), Some("WRONG1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let code = view.join_code.clone().unwrap().to_lowercase();
        let joined = join_lobby(&harness.state, bob, LobbyRef::Code(code), None)
            .await
            .unwrap();
        assert_eq!(joined.members.len(), 2);
    }

    #[tokio::test]
    async fn join_notifies_existing_members() {
        let harness = TestHarness::new();
        let (_, alice, bob) = lobby_with_two(&harness).await;

        let alice_types = harness.notifier.types_for(alice);
        assert!(alice_types.contains(&"player_joined".to_string()));
        assert!(alice_types.contains(&"lobby_updated".to_string()));
        assert!(!harness
            .notifier
            .types_for(bob)
            .contains(&"player_joined".to_string()));
    }

    #[tokio::test]
    async fn full_lobby_rejects_join() {
        let harness = TestHarness::new();
        let (lobby_id, _, _) = lobby_with_two(&harness).await;
        for name in ["carol", "dave"] {
            let player = harness.register(name);
            join_lobby(&harness.state, player, LobbyRef::Id(lobby_id), None)
                .await
                .unwrap();
        }

        let eve = harness.register("eve");
        let err = join_lobby(&harness.state, eve, LobbyRef::Id(lobby_id), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn last_member_leaving_deletes_lobby() {
        let harness = TestHarness::new();
        let alice = harness.register("alice");
        let view = create_lobby(&harness.state, alice, "Solo", false, None)
            .await
            .unwrap();

        leave_lobby(&harness.state, alice, view.id).await.unwrap();

        assert!(harness.state.sessions().lobby(view.id).is_none());
        assert!(harness.notifier.types_for(alice).contains(&"lobby_deleted".to_string()));
        assert_eq!(harness.state.players().get(alice).unwrap().current_lobby, None);
    }

    #[tokio::test]
    async fn owner_leaving_hands_over_ownership() {
        let harness = TestHarness::new();
        let (lobby_id, alice, bob) = lobby_with_two(&harness).await;

        leave_lobby(&harness.state, alice, lobby_id).await.unwrap();

        let view = lobby_view(&harness.state, lobby_id).await.unwrap();
        assert_eq!(view.owner_id, bob);
        assert_eq!(view.members.len(), 1);
    }

    #[tokio::test]
    async fn creating_a_lobby_leaves_the_previous_one() {
        let harness = TestHarness::new();
        let (first, _, bob) = lobby_with_two(&harness).await;

        let second = create_lobby(&harness.state, bob, "Bob's table", false, None)
            .await
            .unwrap();

        let first_view = lobby_view(&harness.state, first).await.unwrap();
        assert_eq!(first_view.members.len(), 1);
        assert_eq!(
            harness.state.players().get(bob).unwrap().current_lobby,
            Some(second.id)
        );
    }

    #[tokio::test]
    async fn kick_removes_target_and_notifies_it() {
        let harness = TestHarness::new();
        let (lobby_id, alice, bob) = lobby_with_two(&harness).await;

        let err = kick_player(&harness.state, bob, lobby_id, alice)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        kick_player(&harness.state, alice, lobby_id, bob).await.unwrap();
        assert!(harness.notifier.types_for(bob).contains(&"player_left".to_string()));
        assert_eq!(
            lobby_view(&harness.state, lobby_id).await.unwrap().members.len(),
            1
        );
    }

    #[tokio::test]
    async fn start_requires_everyone_ready() {
        let harness = TestHarness::new();
        let (lobby_id, alice, bob) = lobby_with_two(&harness).await;

        toggle_ready(&harness.state, alice, lobby_id).await.unwrap();
        let err = start_game(&harness.state, alice, lobby_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        toggle_ready(&harness.state, bob, lobby_id).await.unwrap();
        let err = start_game(&harness.state, bob, lobby_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let game_id = start_game(&harness.state, alice, lobby_id).await.unwrap();
        assert!(harness.state.sessions().game(game_id).is_some());

        let types = harness.notifier.types_for(bob);
        let created = types.iter().position(|t| t == "game_created").unwrap();
        let started = types.iter().position(|t| t == "game_started").unwrap();
        let topics = types.iter().position(|t| t == "topic_selection").unwrap();
        assert!(created < started && started < topics);

        let view = lobby_view(&harness.state, lobby_id).await.unwrap();
        assert_eq!(view.status, LobbyStatus::InGame);
        assert_eq!(view.active_game_id, Some(game_id));
    }

    /// Spawn a start whose topic fetch stalls until the provider timeout.
    async fn pending_start(
        harness: &TestHarness,
        owner: PlayerId,
        lobby_id: LobbyId,
    ) -> tokio::task::JoinHandle<Result<GameId, ServiceError>> {
        let state = harness.state.clone();
        let start = tokio::spawn(async move { start_game(&state, owner, lobby_id).await });
        while lobby_view(&harness.state, lobby_id).await.unwrap().status != LobbyStatus::InGame {
            tokio::task::yield_now().await;
        }
        start
    }

    #[tokio::test(start_paused = true)]
    async fn member_leaving_during_topic_fetch_aborts_start() {
        let harness = TestHarness::with_config(AppConfig::default(), ScriptedProvider::stalled());
        let (lobby_id, alice, bob) = lobby_with_two(&harness).await;
        toggle_ready(&harness.state, alice, lobby_id).await.unwrap();
        toggle_ready(&harness.state, bob, lobby_id).await.unwrap();

        let start = pending_start(&harness, alice, lobby_id).await;
        leave_lobby(&harness.state, bob, lobby_id).await.unwrap();
        let err = start.await.unwrap().unwrap_err();

        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(harness.state.sessions().counts().games, 0);
        let view = lobby_view(&harness.state, lobby_id).await.unwrap();
        assert_eq!(view.status, LobbyStatus::Waiting);
        assert_eq!(view.active_game_id, None);
    }

    #[tokio::test(start_paused = true)]
    async fn only_remaining_members_join_the_game() {
        let harness = TestHarness::with_config(AppConfig::default(), ScriptedProvider::stalled());
        let (lobby_id, alice, bob) = lobby_with_two(&harness).await;
        let carol = harness.register("carol");
        join_lobby(&harness.state, carol, LobbyRef::Id(lobby_id), None)
            .await
            .unwrap();
        for player in [alice, bob, carol] {
            toggle_ready(&harness.state, player, lobby_id).await.unwrap();
        }

        let start = pending_start(&harness, alice, lobby_id).await;
        leave_lobby(&harness.state, bob, lobby_id).await.unwrap();
        let game_id = start.await.unwrap().unwrap();

        let snapshot = game_service::snapshot(&harness.state, game_id).await.unwrap();
        assert_eq!(snapshot.participants, vec![alice, carol]);
        assert!(snapshot.scores.iter().all(|score| score.player_id != bob));
        assert!(!harness.notifier.types_for(bob).contains(&"game_started".to_string()));
    }

    #[tokio::test]
    async fn finish_game_reopens_lobby_for_another_round() {
        let harness = TestHarness::new();
        let (lobby_id, alice, bob) = lobby_with_two(&harness).await;
        toggle_ready(&harness.state, alice, lobby_id).await.unwrap();
        toggle_ready(&harness.state, bob, lobby_id).await.unwrap();
        let game_id = start_game(&harness.state, alice, lobby_id).await.unwrap();

        finish_game(&harness.state, lobby_id, game_id).await;

        let view = lobby_view(&harness.state, lobby_id).await.unwrap();
        assert_eq!(view.status, LobbyStatus::Finished);
        assert!(view.members.iter().all(|member| !member.is_ready));
    }

    #[tokio::test]
    async fn settings_update_is_owner_only() {
        let harness = TestHarness::new();
        let (lobby_id, alice, bob) = lobby_with_two(&harness).await;
        let update = SettingsUpdate {
            questions_per_round: Some(5),
            ..SettingsUpdate::default()
        };

        assert!(update_settings(&harness.state, bob, lobby_id, &update).await.is_err());
        let view = update_settings(&harness.state, alice, lobby_id, &update)
            .await
            .unwrap();
        assert_eq!(view.settings.questions_per_round, 5);
    }

    #[tokio::test]
    async fn delete_notifies_members() {
        let harness = TestHarness::new();
        let (lobby_id, alice, bob) = lobby_with_two(&harness).await;

        assert!(delete_lobby(&harness.state, bob, lobby_id).await.is_err());
        delete_lobby(&harness.state, alice, lobby_id).await.unwrap();

        assert!(harness.state.sessions().lobby(lobby_id).is_none());
        assert!(harness.notifier.types_for(bob).contains(&"lobby_deleted".to_string()));
        assert_eq!(harness.state.players().get(bob).unwrap().current_lobby, None);
    }

    #[tokio::test]
    async fn join_check_does_not_mutate() {
        let harness = TestHarness::new();
        let alice = harness.register("alice");
        let view = create_lobby(&harness.state, alice, "Secret", true, None)
            .await
            .unwrap();

        let denied = join_check(&harness.state, view.id, None).await.unwrap();
        assert!(!denied.can_join);
        assert_eq!(denied.reason.as_deref(), Some("invalid join code"));

        let allowed = join_check(&harness.state, view.id, view.join_code.as_deref())
            .await
            .unwrap();
        assert!(allowed.can_join);
        assert_eq!(
            lobby_view(&harness.state, view.id).await.unwrap().members.len(),
            1
        );
    }
}

//! Game progression: topic selection, answers, question advancement and the per-game timer.
//!
//! Every mutation happens under the game's own lock. Notifications produced by a mutation are
//! emitted before the lock is released so that players observe them in order.

use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::{
    dto::{
        game::{
            EndCheckResponse, GameSnapshot, GameStatsView, QuestionDisplay, QuestionEndedView,
            RoundSummaryView, RoundView, score_views,
        },
        ws::ServerMessage,
    },
    error::ServiceError,
    services::{
        lobby_service,
        notifications::{to_game, to_player},
        question_provider::{QuestionRequest, fetch_questions},
    },
    state::{
        SharedState,
        game::{Advance, GameError, GameId, GameSession},
        lobby::LobbyId,
        player::PlayerId,
        registry::{ActiveGame, GameHandle},
        state_machine::GameStatus,
    },
};

fn game_handle(state: &SharedState, game_id: GameId) -> Result<GameHandle, ServiceError> {
    state
        .sessions()
        .game(game_id)
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))
}

fn ensure_participant(game: &GameSession, player_id: PlayerId) -> Result<(), GameError> {
    game.score_of(player_id)
        .ok_or(GameError::NotParticipant)
        .map(|_| ())
}

fn ensure_active_participant(game: &GameSession, player_id: PlayerId) -> Result<(), GameError> {
    match game.score_of(player_id) {
        None => Err(GameError::NotParticipant),
        Some(score) if !score.is_active => Err(GameError::PlayerInactive),
        Some(_) => Ok(()),
    }
}

/// Arm the question timer for `delay`, replacing any pending one.
fn arm_question_timer(state: &SharedState, active: &mut ActiveGame, delay: Duration) {
    let game_id = active.session.id;
    let timer_state = state.clone();
    let generation = active.timer.arm(delay, move |generation| {
        on_question_timeout(timer_state, game_id, generation)
    });
    debug!(game_id = %game_id, generation, delay_ms = delay.as_millis() as u64, "question timer armed");
}

fn question_displayed(game: &GameSession) -> Option<(ServerMessage, Duration)> {
    let round = game.round()?;
    let question = QuestionDisplay::current(round)?;
    let time_limit = round.current_question()?.time_limit;
    Some((
        ServerMessage::QuestionDisplayed {
            game_id: game.id,
            question,
            time_remaining_ms: time_limit.as_millis() as u64,
        },
        time_limit,
    ))
}

fn snapshot_of(active: &ActiveGame) -> GameSnapshot {
    GameSnapshot::new(&active.session, active.timer.remaining())
}

/// Pick the topic of the next round, fetch its questions and display the first one.
///
/// The game is not locked while the provider works; the round is reserved beforehand so a
/// concurrent selection is rejected.
pub async fn select_topic(
    state: &SharedState,
    player_id: PlayerId,
    game_id: GameId,
    topic: &str,
) -> Result<(), ServiceError> {
    let handle = game_handle(state, game_id)?;
    let topic = topic.trim().to_string();

    let request = {
        let mut active = handle.lock().await;
        ensure_active_participant(&active.session, player_id)?;
        active.session.plan_round()?
    };
    debug!(game_id = %game_id, round = request.round_number, topic = %topic, "round reserved");

    let config = state.config();
    let questions = fetch_questions(
        state.provider().as_ref(),
        QuestionRequest {
            topic: topic.clone(),
            difficulty: request.difficulty,
            count: request.count,
            exclude_texts: request.exclude_texts.clone(),
        },
        config.provider_timeout,
    )
    .await;

    let mut active = handle.lock().await;
    let round_view = active
        .session
        .install_round(request.plan_id, topic.as_str(), questions, Instant::now())
        .map(RoundView::from)?;

    info!(game_id = %game_id, round = round_view.round_number, topic = %topic, "round started");
    to_game(
        state,
        &active.session,
        &ServerMessage::RoundStarted {
            game_id,
            round: round_view,
        },
    );
    if let Some((message, time_limit)) = question_displayed(&active.session) {
        to_game(state, &active.session, &message);
        arm_question_timer(state, &mut active, time_limit);
    }
    Ok(())
}

/// Record an answer to the current question.
pub async fn submit_answer(
    state: &SharedState,
    player_id: PlayerId,
    game_id: GameId,
    answer_index: usize,
) -> Result<(), ServiceError> {
    let handle = game_handle(state, game_id)?;
    let mut active = handle.lock().await;
    let submitted = active
        .session
        .submit_answer(player_id, answer_index, Instant::now())?;
    state.players().touch(player_id);

    to_player(
        state,
        player_id,
        &ServerMessage::AnswerSubmitted {
            game_id,
            player_id,
            is_correct: Some(submitted.is_correct),
            points: Some(submitted.points),
        },
    );
    let others: Vec<PlayerId> = active
        .session
        .active_participants()
        .into_iter()
        .filter(|other| *other != player_id)
        .collect();
    state.notifier().broadcast(
        &others,
        &ServerMessage::AnswerSubmitted {
            game_id,
            player_id,
            is_correct: None,
            points: None,
        },
    );
    Ok(())
}

/// End the current question on a player's request.
pub async fn request_next_question(
    state: &SharedState,
    player_id: PlayerId,
    game_id: GameId,
) -> Result<(), ServiceError> {
    let handle = game_handle(state, game_id)?;
    let finished_lobby = {
        let mut active = handle.lock().await;
        ensure_active_participant(&active.session, player_id)?;
        if active.session.status() != GameStatus::InProgress {
            return Err(GameError::NotInProgress(active.session.status()).into());
        }
        if !active.session.has_active_round() {
            return Err(GameError::NoActiveRound.into());
        }
        advance(state, &mut active)
    };

    release_lobby(state, finished_lobby, game_id).await;
    Ok(())
}

/// Callback of the question timer.
///
/// A stale generation, or a game that is no longer in progress, makes this a no-op.
pub fn on_question_timeout(
    state: SharedState,
    game_id: GameId,
    generation: u64,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let Some(handle) = state.sessions().game(game_id) else {
            debug!(game_id = %game_id, "question timer fired for a removed game");
            return;
        };

        let finished_lobby = {
            let mut active = handle.lock().await;
            if !active.timer.claim(generation) {
                debug!(game_id = %game_id, generation, "ignoring stale question timer");
                return;
            }
            if active.session.status() != GameStatus::InProgress {
                debug!(game_id = %game_id, status = ?active.session.status(), "question timer fired after game end");
                return;
            }
            advance(&state, &mut active)
        };

        release_lobby(&state, finished_lobby, game_id).await;
    })
}

/// Advance past the current question, emitting the reveal first.
///
/// Returns the lobby to release when the game completed.
fn advance(state: &SharedState, active: &mut ActiveGame) -> Option<LobbyId> {
    active.timer.cancel();
    let game_id = active.session.id;

    match active.session.next_question(Instant::now()) {
        Advance::Idle => None,
        Advance::Question { reveal, .. } => {
            to_game(
                state,
                &active.session,
                &ServerMessage::QuestionEnded(QuestionEndedView::new(game_id, &reveal)),
            );
            if let Some((message, time_limit)) = question_displayed(&active.session) {
                to_game(state, &active.session, &message);
                arm_question_timer(state, active, time_limit);
            }
            None
        }
        Advance::RoundComplete { reveal, completion } => {
            let session = &active.session;
            to_game(
                state,
                session,
                &ServerMessage::QuestionEnded(QuestionEndedView::new(game_id, &reveal)),
            );
            to_game(
                state,
                session,
                &ServerMessage::RoundEnded {
                    game_id,
                    summary: RoundSummaryView::from(&completion.summary),
                    is_game_complete: completion.stats.is_some(),
                },
            );
            info!(game_id = %game_id, round = completion.summary.round_number, "round ended");

            match completion.stats.as_ref() {
                Some(stats) => {
                    to_game(
                        state,
                        session,
                        &ServerMessage::GameCompleted {
                            game_id,
                            stats: GameStatsView::from(stats),
                            final_scores: score_views(session.scores()),
                        },
                    );
                    info!(game_id = %game_id, "game completed");
                    Some(session.lobby_id)
                }
                None => {
                    to_game(
                        state,
                        session,
                        &ServerMessage::TopicSelection {
                            game_id,
                            round_number: session.current_round() + 1,
                            available_topics: session.available_topics().to_vec(),
                        },
                    );
                    None
                }
            }
        }
    }
}

async fn release_lobby(state: &SharedState, lobby_id: Option<LobbyId>, game_id: GameId) {
    if let Some(lobby_id) = lobby_id {
        lobby_service::finish_game(state, lobby_id, game_id).await;
    }
}

/// Withdraw a player from a game, cancelling it when too few players remain.
pub async fn quit_game(
    state: &SharedState,
    player_id: PlayerId,
    game_id: GameId,
) -> Result<(), ServiceError> {
    let handle = game_handle(state, game_id)?;
    let finished_lobby = {
        let mut active = handle.lock().await;
        ensure_active_participant(&active.session, player_id)?;
        let removal = active.session.remove_player(player_id)?;

        if removal.cancelled {
            active.timer.cancel();
            info!(game_id = %game_id, active_players = removal.active_players, "game cancelled");
        } else {
            info!(game_id = %game_id, player_id = %player_id, "player quit game");
        }

        let update = ServerMessage::GameStateUpdated(snapshot_of(&active));
        to_player(state, player_id, &update);
        to_game(state, &active.session, &update);
        removal.cancelled.then_some(active.session.lobby_id)
    };

    release_lobby(state, finished_lobby, game_id).await;
    Ok(())
}

/// Withdraw a player from every game they are still active in.
pub async fn leave_all_games(state: &SharedState, player_id: PlayerId) {
    for (game_id, handle) in state.sessions().games() {
        let playing = {
            let active = handle.lock().await;
            !active.session.status().is_terminal()
                && active
                    .session
                    .score_of(player_id)
                    .is_some_and(|score| score.is_active)
        };
        if playing {
            if let Err(err) = quit_game(state, player_id, game_id).await {
                debug!(game_id = %game_id, player_id = %player_id, error = %err, "could not withdraw player");
            }
        }
    }
}

/// Send the full game state to a participant.
pub async fn send_game_state(
    state: &SharedState,
    player_id: PlayerId,
    game_id: GameId,
) -> Result<(), ServiceError> {
    let handle = game_handle(state, game_id)?;
    let active = handle.lock().await;
    ensure_participant(&active.session, player_id)?;
    to_player(
        state,
        player_id,
        &ServerMessage::GameStateUpdated(snapshot_of(&active)),
    );
    Ok(())
}

/// Double the player's points for the rest of the current round.
pub async fn activate_point_doubling(
    state: &SharedState,
    player_id: PlayerId,
    game_id: GameId,
) -> Result<u32, ServiceError> {
    let handle = game_handle(state, game_id)?;
    let mut active = handle.lock().await;
    let activations_used = active.session.activate_point_doubling(player_id)?;
    to_game(
        state,
        &active.session,
        &ServerMessage::PointDoublingActivated {
            game_id,
            player_id,
            round_number: active.session.current_round(),
            activations_used,
        },
    );
    Ok(activations_used)
}

/// Spin the bonus wheel for the final round.
pub async fn spin_bonus_wheel(
    state: &SharedState,
    player_id: PlayerId,
    game_id: GameId,
) -> Result<(), ServiceError> {
    let handle = game_handle(state, game_id)?;
    let mut active = handle.lock().await;
    let spin = active
        .session
        .spin_bonus_wheel(player_id, &mut rand::rng())?;
    info!(game_id = %game_id, player_id = %player_id, multiplier = spin.multiplier, "bonus wheel spun");
    to_game(
        state,
        &active.session,
        &ServerMessage::BonusWheelSpun {
            game_id,
            player_id,
            multiplier: spin.multiplier,
            message: spin.message.to_string(),
            delta: spin.delta,
            round_score: spin.round_score,
            total_score: spin.total_score,
        },
    );
    Ok(())
}

/// Snapshot of a game.
pub async fn snapshot(state: &SharedState, game_id: GameId) -> Result<GameSnapshot, ServiceError> {
    let handle = game_handle(state, game_id)?;
    let active = handle.lock().await;
    Ok(snapshot_of(&active))
}

/// Advisory evaluation of the end conditions of a game.
pub async fn end_check(
    state: &SharedState,
    game_id: GameId,
) -> Result<EndCheckResponse, ServiceError> {
    let handle = game_handle(state, game_id)?;
    let active = handle.lock().await;
    Ok(EndCheckResponse::new(
        game_id,
        active.session.check_end_conditions(),
    ))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dto::lobby::LobbyView,
        services::lobby_service,
        state::{lobby::LobbyStatus, question::Difficulty},
        test_support::{ScriptedProvider, TestHarness},
    };

    fn short_game_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.game_settings.max_rounds = 2;
        config.game_settings.questions_per_round = 2;
        config
    }

    async fn game_with(harness: &TestHarness, count: usize) -> (GameId, Vec<PlayerId>) {
        harness.started_game(count).await
    }

    async fn time_limit(harness: &TestHarness, game_id: GameId) -> Duration {
        let handle = harness.state.sessions().game(game_id).unwrap();
        let active = handle.lock().await;
        active
            .session
            .round()
            .and_then(|round| round.current_question())
            .map(|question| question.time_limit)
            .unwrap()
    }

    async fn let_timers_run(limit: Duration) {
        tokio::time::sleep(limit + Duration::from_millis(50)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_a_topic_starts_the_round() {
        let harness = TestHarness::with_config(short_game_config(), ScriptedProvider::healthy());
        let (game_id, players) = game_with(&harness, 2).await;

        select_topic(&harness.state, players[1], game_id, " Space ")
            .await
            .unwrap();

        let requests = harness.provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].topic, "Space");
        assert_eq!(requests[0].count, 2);
        assert_eq!(requests[0].difficulty, Difficulty::Hard);

        let types = harness.notifier.types_for(players[0]);
        assert!(types.ends_with(&["round_started".to_string(), "question_displayed".to_string()]));

        let handle = harness.state.sessions().game(game_id).unwrap();
        assert!(handle.lock().await.timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn second_selection_is_rejected_while_round_runs() {
        let harness = TestHarness::with_config(short_game_config(), ScriptedProvider::healthy());
        let (game_id, players) = game_with(&harness, 2).await;
        select_topic(&harness.state, players[0], game_id, "Space")
            .await
            .unwrap();

        let err = select_topic(&harness.state, players[1], game_id, "Jazz")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn provider_failure_still_starts_the_round() {
        let harness = TestHarness::with_config(short_game_config(), ScriptedProvider::failing());
        let (game_id, players) = game_with(&harness, 2).await;

        select_topic(&harness.state, players[0], game_id, "Space")
            .await
            .unwrap();

        let handle = harness.state.sessions().game(game_id).unwrap();
        let active = handle.lock().await;
        let round = active.session.round().unwrap();
        assert_eq!(round.questions().len(), 2);
        assert_eq!(round.questions()[0].answers[0].text, "This is a fallback question");
    }

    #[tokio::test(start_paused = true)]
    async fn answer_outcome_is_private_to_the_submitter() {
        let harness = TestHarness::with_config(short_game_config(), ScriptedProvider::healthy());
        let (game_id, players) = game_with(&harness, 2).await;
        select_topic(&harness.state, players[0], game_id, "Space")
            .await
            .unwrap();
        harness.notifier.clear();

        submit_answer(&harness.state, players[0], game_id, 0)
            .await
            .unwrap();

        let mine = harness.notifier.messages_for(players[0]);
        assert!(matches!(
            mine.as_slice(),
            [ServerMessage::AnswerSubmitted {
                is_correct: Some(true),
                points: Some(points),
                ..
            }] if *points > 0
        ));
        let theirs = harness.notifier.messages_for(players[1]);
        assert!(matches!(
            theirs.as_slice(),
            [ServerMessage::AnswerSubmitted {
                is_correct: None,
                points: None,
                ..
            }]
        ));

        let err = submit_answer(&harness.state, players[0], game_id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_precedes_next_question() {
        let harness = TestHarness::with_config(short_game_config(), ScriptedProvider::healthy());
        let (game_id, players) = game_with(&harness, 2).await;
        select_topic(&harness.state, players[0], game_id, "Space")
            .await
            .unwrap();
        harness.notifier.clear();

        request_next_question(&harness.state, players[1], game_id)
            .await
            .unwrap();

        assert_eq!(
            harness.notifier.types_for(players[0]),
            vec!["question_ended", "question_displayed"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timer_advances_unanswered_question() {
        let harness = TestHarness::with_config(short_game_config(), ScriptedProvider::healthy());
        let (game_id, players) = game_with(&harness, 2).await;
        select_topic(&harness.state, players[0], game_id, "Space")
            .await
            .unwrap();
        let limit = time_limit(&harness, game_id).await;
        harness.notifier.clear();

        let_timers_run(limit).await;

        assert_eq!(
            harness.notifier.types_for(players[0]),
            vec!["question_ended", "question_displayed"]
        );
        let handle = harness.state.sessions().game(game_id).unwrap();
        let active = handle.lock().await;
        assert_eq!(active.session.round().unwrap().current_question_index(), 1);
        assert!(active.timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_generation_is_ignored() {
        let harness = TestHarness::with_config(short_game_config(), ScriptedProvider::healthy());
        let (game_id, players) = game_with(&harness, 2).await;
        select_topic(&harness.state, players[0], game_id, "Space")
            .await
            .unwrap();
        let stale = {
            let handle = harness.state.sessions().game(game_id).unwrap();
            let generation = handle.lock().await.timer.generation();
            generation
        };
        request_next_question(&harness.state, players[0], game_id)
            .await
            .unwrap();
        harness.notifier.clear();

        on_question_timeout(harness.state.clone(), game_id, stale).await;

        assert!(harness.notifier.types_for(players[0]).is_empty());
        let handle = harness.state.sessions().game(game_id).unwrap();
        assert_eq!(
            handle
                .lock()
                .await
                .session
                .round()
                .unwrap()
                .current_question_index(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn last_question_ends_round_and_offers_topics() {
        let harness = TestHarness::with_config(short_game_config(), ScriptedProvider::healthy());
        let (game_id, players) = game_with(&harness, 2).await;
        select_topic(&harness.state, players[0], game_id, "Space")
            .await
            .unwrap();
        request_next_question(&harness.state, players[0], game_id)
            .await
            .unwrap();
        harness.notifier.clear();

        request_next_question(&harness.state, players[0], game_id)
            .await
            .unwrap();

        assert_eq!(
            harness.notifier.types_for(players[1]),
            vec!["question_ended", "round_ended", "topic_selection"]
        );
        let handle = harness.state.sessions().game(game_id).unwrap();
        assert!(!handle.lock().await.timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn completing_the_last_round_releases_the_lobby() {
        let harness = TestHarness::with_config(short_game_config(), ScriptedProvider::healthy());
        let (game_id, players) = game_with(&harness, 2).await;

        for topic in ["Space", "Jazz"] {
            select_topic(&harness.state, players[0], game_id, topic)
                .await
                .unwrap();
            submit_answer(&harness.state, players[0], game_id, 0)
                .await
                .unwrap();
            request_next_question(&harness.state, players[0], game_id)
                .await
                .unwrap();
            request_next_question(&harness.state, players[0], game_id)
                .await
                .unwrap();
        }

        let types = harness.notifier.types_for(players[1]);
        assert!(types.ends_with(&[
            "question_ended".to_string(),
            "round_ended".to_string(),
            "game_completed".to_string(),
            "lobby_updated".to_string(),
        ]));

        let snapshot = snapshot(&harness.state, game_id).await.unwrap();
        assert_eq!(snapshot.status, GameStatus::Completed);
        assert!(snapshot.scores[0].total_score > 0);

        let lobby_id = snapshot.lobby_id;
        let view: LobbyView = lobby_service::lobby_view(&harness.state, lobby_id)
            .await
            .unwrap();
        assert_eq!(view.status, LobbyStatus::Finished);
        assert_eq!(view.active_game_id, None);

        let check = end_check(&harness.state, game_id).await.unwrap();
        assert!(check.should_end);
    }

    #[tokio::test(start_paused = true)]
    async fn quitting_down_to_one_player_cancels_the_game() {
        let harness = TestHarness::with_config(short_game_config(), ScriptedProvider::healthy());
        let (game_id, players) = game_with(&harness, 3).await;
        select_topic(&harness.state, players[0], game_id, "Space")
            .await
            .unwrap();
        let limit = time_limit(&harness, game_id).await;

        quit_game(&harness.state, players[1], game_id).await.unwrap();
        let handle = harness.state.sessions().game(game_id).unwrap();
        assert_eq!(handle.lock().await.session.status(), GameStatus::InProgress);

        quit_game(&harness.state, players[2], game_id).await.unwrap();
        {
            let active = handle.lock().await;
            assert_eq!(active.session.status(), GameStatus::Cancelled);
            assert!(!active.timer.is_armed());
        }
        harness.notifier.clear();

        let_timers_run(limit).await;
        assert!(
            !harness
                .notifier
                .types_for(players[0])
                .contains(&"question_displayed".to_string())
        );

        let err = quit_game(&harness.state, players[2], game_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn wheel_is_reserved_for_the_final_round() {
        let harness = TestHarness::with_config(short_game_config(), ScriptedProvider::healthy());
        let (game_id, players) = game_with(&harness, 2).await;
        select_topic(&harness.state, players[0], game_id, "Space")
            .await
            .unwrap();

        let err = spin_bonus_wheel(&harness.state, players[0], game_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let used = activate_point_doubling(&harness.state, players[0], game_id)
            .await
            .unwrap();
        assert_eq!(used, 1);
        assert!(
            activate_point_doubling(&harness.state, players[0], game_id)
                .await
                .is_err()
        );
        assert!(
            harness
                .notifier
                .types_for(players[1])
                .contains(&"point_doubling_activated".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn game_state_is_sent_to_the_requester() {
        let harness = TestHarness::with_config(short_game_config(), ScriptedProvider::healthy());
        let (game_id, players) = game_with(&harness, 2).await;
        harness.notifier.clear();

        send_game_state(&harness.state, players[0], game_id)
            .await
            .unwrap();
        assert_eq!(harness.notifier.types_for(players[0]), vec!["game_state_updated"]);
        assert!(harness.notifier.types_for(players[1]).is_empty());

        let outsider = harness.register("mallory");
        assert!(send_game_state(&harness.state, outsider, game_id).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn leave_all_games_withdraws_the_player() {
        let harness = TestHarness::with_config(short_game_config(), ScriptedProvider::healthy());
        let (game_id, players) = game_with(&harness, 3).await;

        leave_all_games(&harness.state, players[2]).await;

        let snapshot = snapshot(&harness.state, game_id).await.unwrap();
        assert!(!snapshot.scores[2].is_active);
        assert_eq!(snapshot.status, GameStatus::InProgress);
    }
}

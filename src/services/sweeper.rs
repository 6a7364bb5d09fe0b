use std::{sync::Arc, time::Instant};

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info};

use crate::{
    dto::ws::ServerMessage,
    services::{
        lobby_service,
        notifications::{publish_lobby_list, to_lobby},
    },
    state::{SharedState, game::GameId, lobby::LobbyId},
};

/// What a sweep removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Lobbies reaped.
    pub lobbies: usize,
    /// Games reaped.
    pub games: usize,
    /// Players forgotten.
    pub players: usize,
}

impl SweepReport {
    fn is_empty(&self) -> bool {
        self.lobbies == 0 && self.games == 0 && self.players == 0
    }
}

/// Spawn the periodic sweep; the task ends once the state is dropped.
pub fn spawn(state: &SharedState) -> JoinHandle<()> {
    let weak = Arc::downgrade(state);
    let period = state.config().sweep_interval;

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(state) = weak.upgrade() else {
                break;
            };
            let report = sweep_at(&state, Instant::now()).await;
            if !report.is_empty() {
                info!(
                    lobbies = report.lobbies,
                    games = report.games,
                    players = report.players,
                    "stale sessions reaped"
                );
            }
        }
    })
}

/// Reap games, lobbies and players idle for longer than the configured timeout as of `now`.
///
/// Sessions whose lock is held, and games waiting for round questions, are skipped until the
/// next sweep.
pub async fn sweep_at(state: &SharedState, now: Instant) -> SweepReport {
    let timeout = state.config().stale_timeout;
    let mut report = SweepReport::default();

    let mut released: Vec<(LobbyId, GameId)> = Vec::new();
    for (game_id, handle) in state.sessions().games() {
        let Ok(mut active) = handle.try_lock() else {
            debug!(game_id = %game_id, "game busy, skipping sweep");
            continue;
        };
        if active.session.has_pending_round() || !active.session.is_stale(now, timeout) {
            continue;
        }
        active.timer.cancel();
        if !active.session.status().is_terminal() {
            released.push((active.session.lobby_id, game_id));
        }
        drop(active);
        state.sessions().remove_game(game_id);
        report.games += 1;
        info!(game_id = %game_id, "stale game removed");
    }
    for (lobby_id, game_id) in released {
        lobby_service::finish_game(state, lobby_id, game_id).await;
    }

    for (lobby_id, handle) in state.sessions().lobbies() {
        let Ok(mut lobby) = handle.try_lock() else {
            debug!(lobby_id = %lobby_id, "lobby busy, skipping sweep");
            continue;
        };
        let game_running = lobby
            .active_game
            .is_some_and(|game_id| state.sessions().game(game_id).is_some());
        if game_running || !lobby.is_stale(now, timeout) {
            continue;
        }

        lobby.close();
        for member in lobby.member_ids() {
            state.players().clear_lobby_if(member, lobby_id);
        }
        to_lobby(
            state,
            &lobby,
            &ServerMessage::LobbyDeleted {
                lobby_id,
                reason: "lobby expired".into(),
            },
        );
        drop(lobby);
        state.sessions().remove_lobby(lobby_id);
        report.lobbies += 1;
        info!(lobby_id = %lobby_id, "stale lobby removed");
    }

    let connections = state.connections();
    report.players = state
        .players()
        .sweep_stale(now, timeout, |player_id| connections.is_connected(player_id))
        .len();

    if report.lobbies > 0 {
        publish_lobby_list(state).await;
    }
    report
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{services::lobby_service, state::lobby::LobbyStatus, test_support::TestHarness};

    fn later(harness: &TestHarness) -> Instant {
        Instant::now() + harness.state.config().stale_timeout + Duration::from_secs(1)
    }

    #[tokio::test]
    async fn fresh_sessions_survive() {
        let harness = TestHarness::new();
        let alice = harness.register("alice");
        lobby_service::create_lobby(&harness.state, alice, "Quiz night", false, None)
            .await
            .unwrap();

        let report = sweep_at(&harness.state, Instant::now()).await;
        assert_eq!(report, SweepReport::default());
        assert_eq!(harness.state.sessions().counts().lobbies, 1);
    }

    #[tokio::test]
    async fn idle_lobby_and_players_are_reaped() {
        let harness = TestHarness::new();
        let alice = harness.register("alice");
        let view = lobby_service::create_lobby(&harness.state, alice, "Quiz night", false, None)
            .await
            .unwrap();

        let report = sweep_at(&harness.state, later(&harness)).await;

        assert_eq!(report.lobbies, 1);
        assert_eq!(report.players, 1);
        assert!(harness.state.sessions().lobby(view.id).is_none());
        assert!(harness.state.players().get(alice).is_none());
        assert!(
            harness
                .notifier
                .types_for(alice)
                .contains(&"lobby_deleted".to_string())
        );
    }

    #[tokio::test]
    async fn idle_game_is_reaped_and_lobby_released() {
        let harness = TestHarness::new();
        let (game_id, players) = harness.started_game(2).await;
        let lobby_id = harness
            .state
            .players()
            .get(players[0])
            .unwrap()
            .current_lobby
            .unwrap();
        let handle = harness.state.sessions().lobby(lobby_id).unwrap();

        let report = sweep_at(&harness.state, later(&harness)).await;

        assert_eq!(report.games, 1);
        assert!(harness.state.sessions().game(game_id).is_none());
        // The lobby went back to idle and was reaped in the same pass.
        assert_eq!(report.lobbies, 1);
        let lobby = handle.lock().await;
        assert_eq!(lobby.status, LobbyStatus::Finished);
        assert!(lobby.is_closed());
    }

    #[tokio::test]
    async fn busy_game_is_skipped() {
        let harness = TestHarness::new();
        let (game_id, _) = harness.started_game(2).await;
        let handle = harness.state.sessions().game(game_id).unwrap();
        let _guard = handle.lock().await;

        let report = sweep_at(&harness.state, later(&harness)).await;

        assert_eq!(report.games, 0);
        assert_eq!(report.lobbies, 0);
        assert!(harness.state.sessions().game(game_id).is_some());
    }
}

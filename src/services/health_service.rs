use crate::{dto::health::HealthResponse, state::SharedState, state::state_machine::GameStatus};

/// Report liveness together with registry statistics.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let counts = state.sessions().counts();

    let mut active_games = 0;
    for (_, handle) in state.sessions().games() {
        if handle.lock().await.session.status() == GameStatus::InProgress {
            active_games += 1;
        }
    }

    HealthResponse {
        status: "ok".into(),
        uptime_secs: state.started_at().elapsed().as_secs(),
        players: state.players().len(),
        connections: state.connections().len(),
        lobbies: counts.lobbies,
        games: counts.games,
        active_games,
    }
}

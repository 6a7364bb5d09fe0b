use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status, always "ok" while the process serves requests.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered player identities.
    pub players: usize,
    /// Open WebSocket connections.
    pub connections: usize,
    /// Live lobbies.
    pub lobbies: usize,
    /// Live games, running or not yet reaped.
    pub games: usize,
    /// Games currently in progress.
    pub active_games: usize,
}

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::lobby::{
        DeleteLobbyRequest, JoinCheckRequest, JoinCheckResponse, LobbyListResponse, LobbyView,
    },
    error::AppError,
    services::lobby_service,
    state::SharedState,
};

/// Lobby browsing and management endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/lobbies", get(list_lobbies))
        .route("/lobbies/{id}", get(get_lobby).delete(delete_lobby))
        .route("/lobbies/{id}/join-check", post(join_check))
}

/// List public lobbies waiting for players.
#[utoipa::path(
    get,
    path = "/lobbies",
    tag = "lobbies",
    responses((status = 200, description = "Public lobbies, oldest first", body = LobbyListResponse))
)]
pub async fn list_lobbies(State(state): State<SharedState>) -> Json<LobbyListResponse> {
    Json(LobbyListResponse {
        lobbies: lobby_service::list_public(&state).await,
    })
}

/// Fetch a lobby. The join code is never exposed here.
#[utoipa::path(
    get,
    path = "/lobbies/{id}",
    tag = "lobbies",
    params(("id" = String, Path, description = "Identifier of the lobby")),
    responses(
        (status = 200, description = "Lobby", body = LobbyView),
        (status = 404, description = "Unknown lobby")
    )
)]
pub async fn get_lobby(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LobbyView>, AppError> {
    Ok(Json(lobby_service::lobby_view(&state, id).await?))
}

/// Check whether a player could join, without joining.
#[utoipa::path(
    post,
    path = "/lobbies/{id}/join-check",
    tag = "lobbies",
    params(("id" = String, Path, description = "Identifier of the lobby")),
    request_body = JoinCheckRequest,
    responses(
        (status = 200, description = "Join verdict", body = JoinCheckResponse),
        (status = 400, description = "Invalid nickname"),
        (status = 404, description = "Unknown lobby")
    )
)]
pub async fn join_check(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<JoinCheckRequest>>,
) -> Result<Json<JoinCheckResponse>, AppError> {
    let verdict = lobby_service::join_check(&state, id, payload.join_code.as_deref()).await?;
    Ok(Json(verdict))
}

/// Delete a lobby on behalf of its owner.
#[utoipa::path(
    delete,
    path = "/lobbies/{id}",
    tag = "lobbies",
    params(("id" = String, Path, description = "Identifier of the lobby")),
    request_body = DeleteLobbyRequest,
    responses(
        (status = 204, description = "Lobby deleted"),
        (status = 403, description = "Caller does not own the lobby"),
        (status = 409, description = "A game is running in the lobby")
    )
)]
pub async fn delete_lobby(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeleteLobbyRequest>,
) -> Result<StatusCode, AppError> {
    lobby_service::delete_lobby(&state, payload.player_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

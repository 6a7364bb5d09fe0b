use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::game::{EndCheckResponse, GameSnapshot},
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Read-only game inspection endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/end-check", get(end_check))
}

/// Full snapshot of a game.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(("id" = String, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Game snapshot", body = GameSnapshot),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSnapshot>, AppError> {
    Ok(Json(game_service::snapshot(&state, id).await?))
}

/// Evaluate whether a game should end. Advisory only; nothing is mutated.
#[utoipa::path(
    get,
    path = "/games/{id}/end-check",
    tag = "games",
    params(("id" = String, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "End-condition verdict", body = EndCheckResponse),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn end_check(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EndCheckResponse>, AppError> {
    Ok(Json(game_service::end_check(&state, id).await?))
}

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::state::{game::GameError, lobby::LobbyError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The caller is not allowed to act on the target.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}

impl From<LobbyError> for ServiceError {
    fn from(err: LobbyError) -> Self {
        let message = err.to_string();
        match err {
            LobbyError::NotFound => ServiceError::NotFound(message),
            LobbyError::InvalidJoinCode | LobbyError::NotOwner | LobbyError::NotMember => {
                ServiceError::Unauthorized(message)
            }
            LobbyError::CannotKickSelf => ServiceError::InvalidInput(message),
            LobbyError::Full
            | LobbyError::NotJoinable(_)
            | LobbyError::AlreadyMember
            | LobbyError::NotEnoughPlayers { .. }
            | LobbyError::NotAllReady
            | LobbyError::GameRunning => ServiceError::InvalidState(message),
        }
    }
}

impl From<GameError> for ServiceError {
    fn from(err: GameError) -> Self {
        let message = err.to_string();
        match err {
            GameError::InvalidAnswerIndex(_) => ServiceError::InvalidInput(message),
            GameError::NotParticipant | GameError::PlayerInactive => {
                ServiceError::Unauthorized(message)
            }
            GameError::InvalidTransition(_)
            | GameError::Plan(_)
            | GameError::Apply(_)
            | GameError::NotInProgress(_)
            | GameError::NoActiveRound
            | GameError::RoundInProgress
            | GameError::NoRoundsLeft
            | GameError::NoQuestions
            | GameError::AlreadyAnswered
            | GameError::PointDoublingUnavailable
            | GameError::BonusWheelNotFinalRound
            | GameError::BonusWheelAlreadyUsed => ServiceError::InvalidState(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The caller may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthorized(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

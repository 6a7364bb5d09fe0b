use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/lobbies",
    tag = "sse",
    responses((status = 200, description = "Public lobby list stream, event `lobbies.updated`", content_type = "text/event-stream", body = String))
)]
/// Stream the public lobby list, starting with its current content.
pub async fn lobbies_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let (receiver, initial) = sse_service::subscribe_lobbies(&state).await;
    info!("New lobby SSE connection");
    sse_service::to_sse_stream(receiver, initial)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/lobbies", get(lobbies_stream))
}

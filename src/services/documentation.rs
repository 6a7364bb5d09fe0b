use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Trivai Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::lobbies::list_lobbies,
        crate::routes::lobbies::get_lobby,
        crate::routes::lobbies::join_check,
        crate::routes::lobbies::delete_lobby,
        crate::routes::games::get_game,
        crate::routes::games::end_check,
        crate::routes::sse::lobbies_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::lobby::LobbyView,
            crate::dto::lobby::LobbySummary,
            crate::dto::lobby::LobbyListResponse,
            crate::dto::lobby::JoinCheckRequest,
            crate::dto::lobby::JoinCheckResponse,
            crate::dto::lobby::DeleteLobbyRequest,
            crate::dto::game::GameSnapshot,
            crate::dto::game::EndCheckResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::SettingsPatch,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "lobbies", description = "Lobby browsing and management"),
        (name = "games", description = "Game inspection"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "players", description = "WebSocket session for players"),
    )
)]
pub struct ApiDoc;

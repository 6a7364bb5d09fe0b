/// OpenAPI documentation generation.
pub mod documentation;
/// Round flow, answers and the question timer.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Lobby membership, readiness, settings and game start.
pub mod lobby_service;
/// Notification fan-out to players and the lobby feed.
pub mod notifications;
/// Question generator seam and fallback content.
pub mod question_provider;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Periodic removal of idle lobbies, games and players.
pub mod sweeper;
/// WebSocket connection and message handling service.
pub mod websocket_service;

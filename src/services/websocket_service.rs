use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    services::{
        game_service,
        lobby_service::{self, LobbyRef},
    },
    state::{
        PlayerConnection, SharedState,
        connections::{ConnectionClosed, send_message_to_websocket},
        player::{PlayerId, SessionId},
    },
};

/// One websocket connection and the player it is bound to, once known.
struct ConnectionSession {
    id: SessionId,
    player_id: Option<PlayerId>,
    tx: mpsc::UnboundedSender<Message>,
}

impl ConnectionSession {
    fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_id: None,
            tx,
        }
    }

    /// Create or refresh the player behind this connection and bind it for notifications.
    fn register(&mut self, state: &SharedState, nickname: &str) -> PlayerId {
        let player = state.players().register(self.id, nickname.trim());
        if self.player_id != Some(player.id) {
            state.connections().attach(
                player.id,
                PlayerConnection {
                    session_id: self.id,
                    tx: self.tx.clone(),
                },
            );
            info!(player_id = %player.id, session_id = %self.id, "player bound to connection");
        }
        self.player_id = Some(player.id);
        player.id
    }

    fn player(&self) -> Result<PlayerId, ServiceError> {
        self.player_id.ok_or_else(|| {
            ServiceError::Unauthorized("create or join a lobby before sending this intent".into())
        })
    }

    fn reply(&self, message: &ServerMessage) -> Result<(), ConnectionClosed> {
        send_message_to_websocket(&self.tx, message)
    }
}

/// Handle the full lifecycle of a player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut session = ConnectionSession::new(outbound_tx.clone());
    info!(session_id = %session.id, "websocket connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if handle_text(&state, &mut session, text.as_str()).await.is_err() {
                    info!(session_id = %session.id, "connection closed while replying, terminating");
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(session_id = %session.id, error = %err, "websocket error");
                break;
            }
        }
    }

    disconnect(&state, &session).await;
    drop(session);
    finalize(writer_task, outbound_tx).await;
}

/// Parse one text frame, run the intent and report any failure to this connection only.
async fn handle_text(
    state: &SharedState,
    session: &mut ConnectionSession,
    text: &str,
) -> Result<(), ConnectionClosed> {
    let message = match ClientMessage::from_json_str(text) {
        Ok(message) => message,
        Err(err) => {
            debug!(session_id = %session.id, error = %err, "rejected client message");
            return session.reply(&ServerMessage::error(&err, None));
        }
    };

    let kind = message.kind();
    match dispatch(state, session, message).await {
        Ok(()) => Ok(()),
        Err(err) => {
            debug!(session_id = %session.id, intent = kind, error = %err, "intent failed");
            session.reply(&ServerMessage::error(&err, Some(kind)))
        }
    }
}

async fn dispatch(
    state: &SharedState,
    session: &mut ConnectionSession,
    message: ClientMessage,
) -> Result<(), ServiceError> {
    if let Some(player_id) = session.player_id {
        state.players().touch(player_id);
    }

    match message {
        ClientMessage::CreateLobby {
            nickname,
            lobby_name,
            is_private,
            settings,
        } => {
            let player_id = session.register(state, &nickname);
            let update = settings.as_ref().map(Into::into);
            lobby_service::create_lobby(state, player_id, &lobby_name, is_private, update).await?;
        }
        ClientMessage::JoinLobby {
            nickname,
            lobby_id,
            join_code,
        } => {
            let player_id = session.register(state, &nickname);
            let code = join_code
                .map(|code| code.trim().to_string())
                .filter(|code| !code.is_empty());
            let (target, code) = match (lobby_id, code) {
                (Some(lobby_id), code) => (LobbyRef::Id(lobby_id), code),
                (None, Some(code)) => (LobbyRef::Code(code), None),
                (None, None) => {
                    return Err(ServiceError::InvalidInput(
                        "either a lobby id or a join code is required".into(),
                    ));
                }
            };
            lobby_service::join_lobby(state, player_id, target, code.as_deref()).await?;
        }
        ClientMessage::LeaveLobby { lobby_id } => {
            lobby_service::leave_lobby(state, session.player()?, lobby_id).await?;
        }
        ClientMessage::ToggleReady { lobby_id } => {
            lobby_service::toggle_ready(state, session.player()?, lobby_id).await?;
        }
        ClientMessage::UpdateSettings { lobby_id, settings } => {
            lobby_service::update_settings(state, session.player()?, lobby_id, &(&settings).into())
                .await?;
        }
        ClientMessage::KickPlayer {
            lobby_id,
            player_id,
        } => {
            lobby_service::kick_player(state, session.player()?, lobby_id, player_id).await?;
        }
        ClientMessage::StartGame { lobby_id } => {
            lobby_service::start_game(state, session.player()?, lobby_id).await?;
        }
        ClientMessage::SelectTopic { game_id, topic } => {
            game_service::select_topic(state, session.player()?, game_id, &topic).await?;
        }
        ClientMessage::SubmitAnswer {
            game_id,
            answer_index,
        } => {
            let index = usize::try_from(answer_index)
                .map_err(|_| ServiceError::InvalidInput("answer index out of range".into()))?;
            game_service::submit_answer(state, session.player()?, game_id, index).await?;
        }
        ClientMessage::RequestNextQuestion { game_id } => {
            game_service::request_next_question(state, session.player()?, game_id).await?;
        }
        ClientMessage::QuitGame { game_id } => {
            game_service::quit_game(state, session.player()?, game_id).await?;
        }
        ClientMessage::GetGameState { game_id } => {
            game_service::send_game_state(state, session.player()?, game_id).await?;
        }
        ClientMessage::ActivatePointDoubling { game_id } => {
            game_service::activate_point_doubling(state, session.player()?, game_id).await?;
        }
        ClientMessage::SpinBonusWheel { game_id } => {
            game_service::spin_bonus_wheel(state, session.player()?, game_id).await?;
        }
        ClientMessage::Ping => {
            if session.reply(&ServerMessage::Pong).is_err() {
                debug!(session_id = %session.id, "pong dropped, writer closed");
            }
        }
        ClientMessage::Unknown => {
            return Err(ServiceError::InvalidInput("unknown message type".into()));
        }
    }
    Ok(())
}

/// Withdraw the connection's player from its games and lobby, then forget it.
async fn disconnect(state: &SharedState, session: &ConnectionSession) {
    let Some(player_id) = session.player_id else {
        info!(session_id = %session.id, "anonymous websocket disconnected");
        return;
    };

    // Lobby first, so a game started from it concurrently is registered before games are left.
    let lobby_id = state
        .players()
        .get(player_id)
        .and_then(|player| player.current_lobby);
    if let Some(lobby_id) = lobby_id {
        if let Err(err) = lobby_service::leave_lobby(state, player_id, lobby_id).await {
            debug!(player_id = %player_id, lobby_id = %lobby_id, error = %err, "leave on disconnect failed");
        }
    }

    game_service::leave_all_games(state, player_id).await;

    state.connections().detach(player_id, session.id);
    state.players().remove(player_id);
    info!(player_id = %player_id, session_id = %session.id, "player disconnected");
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestHarness;

    fn session() -> (ConnectionSession, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionSession::new(tx), rx)
    }

    fn replies(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<serde_json::Value> {
        let mut values = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            values.push(serde_json::from_str(text.as_str()).unwrap());
        }
        values
    }

    #[tokio::test]
    async fn ping_is_answered_on_the_connection() {
        let harness = TestHarness::new();
        let (mut session, mut rx) = session();

        handle_text(&harness.state, &mut session, r#"{"type":"ping"}"#)
            .await
            .unwrap();

        assert_eq!(replies(&mut rx)[0]["type"], "pong");
    }

    #[tokio::test]
    async fn malformed_and_unknown_frames_get_errors() {
        let harness = TestHarness::new();
        let (mut session, mut rx) = session();

        handle_text(&harness.state, &mut session, "not json").await.unwrap();
        handle_text(&harness.state, &mut session, r#"{"type":"dance"}"#)
            .await
            .unwrap();

        let replies = replies(&mut rx);
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|reply| reply["type"] == "error"));
    }

    #[tokio::test]
    async fn intents_require_a_bound_player() {
        let harness = TestHarness::new();
        let (mut session, mut rx) = session();
        let frame = format!(r#"{{"type":"toggle_ready","lobby_id":"{}"}}"#, Uuid::new_v4());

        handle_text(&harness.state, &mut session, &frame).await.unwrap();

        let replies = replies(&mut rx);
        assert_eq!(replies[0]["type"], "error");
        assert_eq!(replies[0]["data"]["context"], "toggle_ready");
    }

    #[tokio::test]
    async fn create_lobby_binds_the_player() {
        let harness = TestHarness::new();
        let (mut session, _rx) = session();

        handle_text(
            &harness.state,
            &mut session,
            r#"{"type":"create_lobby","nickname":"alice","lobby_name":"Quiz night"}"#,
        )
        .await
        .unwrap();

        let player_id = session.player_id.unwrap();
        assert!(harness.state.connections().is_connected(player_id));
        assert_eq!(harness.notifier.types_for(player_id), vec!["lobby_created"]);
        assert!(
            harness
                .state
                .players()
                .get(player_id)
                .unwrap()
                .current_lobby
                .is_some()
        );
    }

    #[tokio::test]
    async fn disconnect_cleans_up_player_and_lobby() {
        let harness = TestHarness::new();
        let (mut session, _rx) = session();
        handle_text(
            &harness.state,
            &mut session,
            r#"{"type":"create_lobby","nickname":"alice","lobby_name":"Quiz night"}"#,
        )
        .await
        .unwrap();
        let player_id = session.player_id.unwrap();
        let lobby_id = harness
            .state
            .players()
            .get(player_id)
            .unwrap()
            .current_lobby
            .unwrap();

        disconnect(&harness.state, &session).await;

        assert!(harness.state.players().get(player_id).is_none());
        assert!(!harness.state.connections().is_connected(player_id));
        assert!(harness.state.sessions().lobby(lobby_id).is_none());
    }

    #[tokio::test]
    async fn disconnect_withdraws_from_running_game() {
        let harness = TestHarness::new();
        let (game_id, players) = harness.started_game(3).await;
        let (mut session, _rx) = session();
        session.player_id = Some(players[2]);

        disconnect(&harness.state, &session).await;

        let snapshot = game_service::snapshot(&harness.state, game_id).await.unwrap();
        assert!(!snapshot.scores[2].is_active);
        assert!(harness.state.players().get(players[2]).is_none());
    }
}

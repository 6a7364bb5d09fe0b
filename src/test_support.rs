//! Fixtures shared by the service tests.

use std::sync::{Arc, Mutex};

use futures::future::{self, BoxFuture};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::ws::ServerMessage,
    services::{
        lobby_service::{self, LobbyRef},
        question_provider::{ProviderError, ProviderResult, QuestionProvider, QuestionRequest},
    },
    state::{
        AppState, Notifier, SharedState,
        game::GameId,
        player::PlayerId,
        question::{Answer, Difficulty, Question},
    },
};

/// Notifier that records every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(PlayerId, ServerMessage)>>,
}

impl RecordingNotifier {
    pub fn messages_for(&self, player_id: PlayerId) -> Vec<ServerMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(recipient, _)| *recipient == player_id)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Wire `type` of every message delivered to `player_id`, in order.
    pub fn types_for(&self, player_id: PlayerId) -> Vec<String> {
        self.messages_for(player_id)
            .iter()
            .map(|message| {
                let value = serde_json::to_value(message).unwrap();
                value["type"].as_str().unwrap().to_string()
            })
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, player_id: PlayerId, message: &ServerMessage) {
        self.sent.lock().unwrap().push((player_id, message.clone()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Healthy,
    Failing,
    Malformed,
    Stalled,
}

/// Provider with a fixed behaviour that remembers the question requests it received.
pub struct ScriptedProvider {
    behaviour: Behaviour,
    requests: Mutex<Vec<QuestionRequest>>,
}

impl ScriptedProvider {
    fn with(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn healthy() -> Self {
        Self::with(Behaviour::Healthy)
    }

    pub fn failing() -> Self {
        Self::with(Behaviour::Failing)
    }

    /// Returns questions with three answers.
    pub fn malformed() -> Self {
        Self::with(Behaviour::Malformed)
    }

    /// Never answers.
    pub fn stalled() -> Self {
        Self::with(Behaviour::Stalled)
    }

    pub fn requests(&self) -> Vec<QuestionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl QuestionProvider for ScriptedProvider {
    fn generate_questions(
        &self,
        request: QuestionRequest,
    ) -> BoxFuture<'static, ProviderResult<Vec<Question>>> {
        self.requests.lock().unwrap().push(request.clone());
        match self.behaviour {
            Behaviour::Healthy => {
                let mut questions = sample_questions(&request.topic, request.count);
                for question in &mut questions {
                    question.difficulty = request.difficulty;
                    question.time_limit = request.difficulty.time_limit();
                }
                Box::pin(future::ready(Ok(questions)))
            }
            Behaviour::Failing => Box::pin(future::ready(Err(ProviderError::Unavailable(
                "connection refused".into(),
            )))),
            Behaviour::Malformed => {
                let mut questions = sample_questions(&request.topic, request.count);
                for question in &mut questions {
                    question.answers.pop();
                }
                Box::pin(future::ready(Ok(questions)))
            }
            Behaviour::Stalled => Box::pin(future::pending()),
        }
    }

    fn generate_topics(&self, count: usize) -> BoxFuture<'static, ProviderResult<Vec<String>>> {
        let outcome = match self.behaviour {
            Behaviour::Healthy => Ok(["Space", "Jazz", "Rivers", "Chess", "Volcanoes"]
                .into_iter()
                .take(count)
                .map(str::to_string)
                .collect()),
            Behaviour::Failing | Behaviour::Malformed => {
                Err(ProviderError::Unavailable("connection refused".into()))
            }
            Behaviour::Stalled => return Box::pin(future::pending()),
        };
        Box::pin(future::ready(outcome))
    }
}

/// `count` distinct questions about `topic` whose first answer is correct.
pub fn sample_questions(topic: &str, count: usize) -> Vec<Question> {
    (0..count)
        .map(|n| {
            Question::new(
                format!("{topic} question #{n}"),
                (0..4)
                    .map(|index| Answer {
                        text: format!("{topic} answer {index}"),
                        is_correct: index == 0,
                    })
                    .collect(),
                format!("The first answer about {topic} is right."),
                Difficulty::Medium,
                topic,
            )
        })
        .collect()
}

/// Application state wired to a recording notifier and a scripted provider.
pub struct TestHarness {
    pub state: SharedState,
    pub notifier: Arc<RecordingNotifier>,
    pub provider: Arc<ScriptedProvider>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), ScriptedProvider::healthy())
    }

    pub fn with_config(config: AppConfig, provider: ScriptedProvider) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let provider = Arc::new(provider);
        let state = AppState::with_components(config, provider.clone(), notifier.clone());
        Self {
            state,
            notifier,
            provider,
        }
    }

    /// Register a player under a fresh session.
    pub fn register(&self, nickname: &str) -> PlayerId {
        self.state.players().register(Uuid::new_v4(), nickname).id
    }

    /// Start a game with `count` ready players; the first one owns the lobby.
    pub async fn started_game(&self, count: usize) -> (GameId, Vec<PlayerId>) {
        let names = ["alice", "bob", "carol", "dave", "erin", "frank"];
        let players: Vec<PlayerId> = names
            .iter()
            .take(count)
            .map(|name| self.register(name))
            .collect();

        let view = lobby_service::create_lobby(&self.state, players[0], "Quiz night", false, None)
            .await
            .unwrap();
        for player in &players[1..] {
            lobby_service::join_lobby(&self.state, *player, LobbyRef::Id(view.id), None)
                .await
                .unwrap();
        }
        for player in &players {
            lobby_service::toggle_ready(&self.state, *player, view.id)
                .await
                .unwrap();
        }
        let game_id = lobby_service::start_game(&self.state, players[0], view.id)
            .await
            .unwrap();
        (game_id, players)
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::{
        game::{
            EndCheckResponse, GameSnapshot, GameStatsView, PlayerRef, PlayerScoreView,
            QuestionDisplay, QuestionEndedView, RoundSummaryView, RoundView,
        },
        lobby::LobbyView,
        validation::{validate_lobby_name, validate_nickname, validate_topic},
    },
    error::ServiceError,
    state::{
        question::ANSWERS_PER_QUESTION,
        settings::{GameSettings, SettingsUpdate},
    },
};

/// Partial settings update sent by a lobby owner.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct SettingsPatch {
    #[validate(range(min = 1, max = 10))]
    pub max_rounds: Option<u32>,
    #[validate(range(min = 5, max = 20))]
    pub questions_per_round: Option<u32>,
    /// Reference time limit in milliseconds.
    #[validate(range(min = 10_000, max = 120_000))]
    pub question_time_limit: Option<u64>,
    pub time_bonus: Option<bool>,
}

impl From<&SettingsPatch> for SettingsUpdate {
    fn from(patch: &SettingsPatch) -> Self {
        Self {
            max_rounds: patch.max_rounds,
            questions_per_round: patch.questions_per_round,
            question_time_limit: patch.question_time_limit.map(Duration::from_millis),
            time_bonus: patch.time_bonus,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
/// Intents accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateLobby {
        nickname: String,
        lobby_name: String,
        #[serde(default)]
        is_private: bool,
        #[serde(default)]
        settings: Option<SettingsPatch>,
    },
    JoinLobby {
        nickname: String,
        #[serde(default)]
        lobby_id: Option<Uuid>,
        #[serde(default)]
        join_code: Option<String>,
    },
    LeaveLobby {
        lobby_id: Uuid,
    },
    ToggleReady {
        lobby_id: Uuid,
    },
    UpdateSettings {
        lobby_id: Uuid,
        settings: SettingsPatch,
    },
    KickPlayer {
        lobby_id: Uuid,
        player_id: Uuid,
    },
    StartGame {
        lobby_id: Uuid,
    },
    SelectTopic {
        game_id: Uuid,
        topic: String,
    },
    SubmitAnswer {
        game_id: Uuid,
        answer_index: i64,
    },
    RequestNextQuestion {
        game_id: Uuid,
    },
    QuitGame {
        game_id: Uuid,
    },
    GetGameState {
        game_id: Uuid,
    },
    ActivatePointDoubling {
        game_id: Uuid,
    },
    SpinBonusWheel {
        game_id: Uuid,
    },
    Ping,
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse and validate a text frame.
    pub fn from_json_str(text: &str) -> Result<Self, ServiceError> {
        let message: Self = serde_json::from_str(text)
            .map_err(|err| ServiceError::InvalidInput(format!("malformed message: {err}")))?;
        message.validate()?;
        if let Some(patch) = message.settings_patch() {
            patch.validate()?;
        }
        Ok(message)
    }

    fn settings_patch(&self) -> Option<&SettingsPatch> {
        match self {
            Self::CreateLobby { settings, .. } => settings.as_ref(),
            Self::UpdateSettings { settings, .. } => Some(settings),
            _ => None,
        }
    }

    /// Intent name used as error context.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateLobby { .. } => "create_lobby",
            Self::JoinLobby { .. } => "join_lobby",
            Self::LeaveLobby { .. } => "leave_lobby",
            Self::ToggleReady { .. } => "toggle_ready",
            Self::UpdateSettings { .. } => "update_settings",
            Self::KickPlayer { .. } => "kick_player",
            Self::StartGame { .. } => "start_game",
            Self::SelectTopic { .. } => "select_topic",
            Self::SubmitAnswer { .. } => "submit_answer",
            Self::RequestNextQuestion { .. } => "request_next_question",
            Self::QuitGame { .. } => "quit_game",
            Self::GetGameState { .. } => "get_game_state",
            Self::ActivatePointDoubling { .. } => "activate_point_doubling",
            Self::SpinBonusWheel { .. } => "spin_bonus_wheel",
            Self::Ping => "ping",
            Self::Unknown => "unknown",
        }
    }
}

impl Validate for ClientMessage {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match self {
            Self::CreateLobby {
                nickname,
                lobby_name,
                ..
            } => {
                if let Err(e) = validate_nickname(nickname) {
                    errors.add("nickname", e);
                }
                if let Err(e) = validate_lobby_name(lobby_name) {
                    errors.add("lobby_name", e);
                }
            }
            Self::JoinLobby {
                nickname,
                lobby_id,
                join_code,
            } => {
                if let Err(e) = validate_nickname(nickname) {
                    errors.add("nickname", e);
                }
                let has_code = join_code
                    .as_deref()
                    .is_some_and(|code| !code.trim().is_empty());
                if lobby_id.is_none() && !has_code {
                    let mut err = ValidationError::new("lobby_reference");
                    err.message = Some("Either a lobby id or a join code is required".into());
                    errors.add("lobby_id", err);
                }
            }
            Self::SelectTopic { topic, .. } => {
                if let Err(e) = validate_topic(topic) {
                    errors.add("topic", e);
                }
            }
            Self::SubmitAnswer { answer_index, .. } => {
                if !(0..ANSWERS_PER_QUESTION as i64).contains(answer_index) {
                    let mut err = ValidationError::new("answer_index_range");
                    err.message = Some("Answer index must be between 0 and 3".into());
                    errors.add("answer_index", err);
                }
            }
            Self::Unknown => {
                let mut err = ValidationError::new("unknown_type");
                err.message = Some("Unknown message type".into());
                errors.add("type", err);
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
/// Notifications pushed to player WebSocket clients.
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    LobbyCreated(LobbyView),
    LobbyUpdated(LobbyView),
    LobbyDeleted {
        lobby_id: Uuid,
        reason: String,
    },
    PlayerJoined {
        lobby_id: Uuid,
        player: PlayerRef,
    },
    PlayerLeft {
        lobby_id: Uuid,
        player: PlayerRef,
        kicked: bool,
    },
    GameCreated {
        game_id: Uuid,
        lobby_id: Uuid,
        participants: Vec<PlayerRef>,
    },
    GameStarted {
        game_id: Uuid,
        total_rounds: u32,
        settings: GameSettings,
    },
    TopicSelection {
        game_id: Uuid,
        round_number: u32,
        available_topics: Vec<String>,
    },
    RoundStarted {
        game_id: Uuid,
        round: RoundView,
    },
    QuestionDisplayed {
        game_id: Uuid,
        question: QuestionDisplay,
        time_remaining_ms: u64,
    },
    /// `is_correct` and `points` are only filled for the submitter.
    AnswerSubmitted {
        game_id: Uuid,
        player_id: Uuid,
        is_correct: Option<bool>,
        points: Option<i64>,
    },
    QuestionEnded(QuestionEndedView),
    RoundEnded {
        game_id: Uuid,
        summary: RoundSummaryView,
        is_game_complete: bool,
    },
    GameCompleted {
        game_id: Uuid,
        stats: GameStatsView,
        final_scores: Vec<PlayerScoreView>,
    },
    GameStateUpdated(GameSnapshot),
    GameEndCheck(EndCheckResponse),
    PointDoublingActivated {
        game_id: Uuid,
        player_id: Uuid,
        round_number: u32,
        activations_used: u32,
    },
    BonusWheelSpun {
        game_id: Uuid,
        player_id: Uuid,
        multiplier: f64,
        message: String,
        delta: i64,
        round_score: i64,
        total_score: i64,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },
    Pong,
}

impl ServerMessage {
    /// Error notification for the intent named by `context`.
    pub fn error(err: &ServiceError, context: Option<&str>) -> Self {
        Self::Error {
            message: err.to_string(),
            context: context.map(str::to_string),
        }
    }
}

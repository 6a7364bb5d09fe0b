use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::format_system_time,
    state::{
        game::{
            AnswerRecord, EndCheck, EndReason, GameSession, GameStats, QuestionReveal, RoundState,
            RoundSummary,
        },
        question::{Difficulty, Question},
        scoring::PlayerScore,
        settings::GameSettings,
        state_machine::GameStatus,
    },
};

/// Player reference with display name.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PlayerRef {
    pub player_id: Uuid,
    pub nickname: String,
}

impl From<(Uuid, String)> for PlayerRef {
    fn from((player_id, nickname): (Uuid, String)) -> Self {
        Self {
            player_id,
            nickname,
        }
    }
}

/// Public projection of a scoreboard entry.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PlayerScoreView {
    pub player_id: Uuid,
    pub nickname: String,
    pub total_score: i64,
    pub round_scores: Vec<i64>,
    pub correct_answers: u32,
    pub average_response_time_ms: f64,
    pub streak: u32,
    pub is_active: bool,
    pub points_doubled: u32,
    pub bonus_wheel_spins: u32,
}

impl From<&PlayerScore> for PlayerScoreView {
    fn from(score: &PlayerScore) -> Self {
        Self {
            player_id: score.player_id,
            nickname: score.nickname.clone(),
            total_score: score.total_score(),
            round_scores: score.round_scores().to_vec(),
            correct_answers: score.correct_answers,
            average_response_time_ms: score.average_response_time_ms,
            streak: score.streak,
            is_active: score.is_active,
            points_doubled: score.points_doubled,
            bonus_wheel_spins: score.bonus_wheel_spins,
        }
    }
}

/// Scoreboard projection.
pub fn score_views(scores: &[PlayerScore]) -> Vec<PlayerScoreView> {
    scores.iter().map(PlayerScoreView::from).collect()
}

/// Question as broadcast to players, without correctness.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct QuestionDisplay {
    pub id: Uuid,
    pub round_number: u32,
    /// Position in the round (1-based).
    pub question_number: usize,
    pub total_questions: usize,
    pub text: String,
    pub answers: Vec<String>,
    pub difficulty: Difficulty,
    pub topic: String,
    pub time_limit_ms: u64,
}

impl QuestionDisplay {
    /// Strip correctness from the question currently asked in `round`.
    pub fn current(round: &RoundState) -> Option<Self> {
        let question = round.current_question()?;
        Some(Self::new(
            question,
            round.round_number,
            round.current_question_index() + 1,
            round.questions().len(),
        ))
    }

    fn new(
        question: &Question,
        round_number: u32,
        question_number: usize,
        total_questions: usize,
    ) -> Self {
        Self {
            id: question.id,
            round_number,
            question_number,
            total_questions,
            text: question.text.clone(),
            answers: question
                .answers
                .iter()
                .map(|answer| answer.text.clone())
                .collect(),
            difficulty: question.difficulty,
            topic: question.topic.clone(),
            time_limit_ms: question.time_limit.as_millis() as u64,
        }
    }
}

/// Answer with its correctness, revealed when a question ends.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RevealedAnswer {
    pub text: String,
    pub is_correct: bool,
}

/// Answer submitted by a player for the revealed question.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PlayerAnswerView {
    pub player_id: Uuid,
    pub answer_index: usize,
    pub is_correct: bool,
    pub response_time_ms: u64,
    pub points: i64,
}

impl From<(Uuid, AnswerRecord)> for PlayerAnswerView {
    fn from((player_id, record): (Uuid, AnswerRecord)) -> Self {
        Self {
            player_id,
            answer_index: record.answer_index,
            is_correct: record.is_correct,
            response_time_ms: record.response_time.as_millis() as u64,
            points: record.points,
        }
    }
}

/// Payload of the question-ended notification.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct QuestionEndedView {
    pub game_id: Uuid,
    pub round_number: u32,
    pub question_number: usize,
    pub question_id: Uuid,
    pub text: String,
    pub answers: Vec<RevealedAnswer>,
    pub correct_answer_index: usize,
    pub explanation: String,
    pub player_answers: Vec<PlayerAnswerView>,
    pub scores: Vec<PlayerScoreView>,
}

impl QuestionEndedView {
    /// Build the reveal payload for `game_id`.
    pub fn new(game_id: Uuid, reveal: &QuestionReveal) -> Self {
        let question = &reveal.question;
        Self {
            game_id,
            round_number: reveal.round_number,
            question_number: reveal.question_number,
            question_id: question.id,
            text: question.text.clone(),
            answers: question
                .answers
                .iter()
                .map(|answer| RevealedAnswer {
                    text: answer.text.clone(),
                    is_correct: answer.is_correct,
                })
                .collect(),
            correct_answer_index: question.correct_answer_index,
            explanation: question.explanation.clone(),
            player_answers: reveal
                .answers
                .iter()
                .copied()
                .map(PlayerAnswerView::from)
                .collect(),
            scores: score_views(&reveal.scores),
        }
    }
}

/// Round metadata without the question batch.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RoundView {
    pub round_number: u32,
    pub topic: String,
    pub difficulty: Difficulty,
    pub round_multiplier: u32,
    pub current_question_index: usize,
    pub total_questions: usize,
    pub answers_received: usize,
    pub is_complete: bool,
}

impl From<&RoundState> for RoundView {
    fn from(round: &RoundState) -> Self {
        Self {
            round_number: round.round_number,
            topic: round.topic.clone(),
            difficulty: round.difficulty,
            round_multiplier: round.round_multiplier,
            current_question_index: round.current_question_index(),
            total_questions: round.questions().len(),
            answers_received: round.player_answers().len(),
            is_complete: round.is_complete(),
        }
    }
}

/// Summary of a completed round.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RoundSummaryView {
    pub round_number: u32,
    pub topic: String,
    pub difficulty: Difficulty,
    pub questions_answered: usize,
    pub scores: Vec<PlayerScoreView>,
    pub top_player: Option<PlayerRef>,
    pub duration_ms: u64,
}

impl From<&RoundSummary> for RoundSummaryView {
    fn from(summary: &RoundSummary) -> Self {
        Self {
            round_number: summary.round_number,
            topic: summary.topic.clone(),
            difficulty: summary.difficulty,
            questions_answered: summary.questions_answered,
            scores: score_views(&summary.scores),
            top_player: summary.top_player.clone().map(PlayerRef::from),
            duration_ms: summary.duration.as_millis() as u64,
        }
    }
}

/// Statistics of a completed game.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct GameStatsView {
    pub total_questions: u32,
    pub questions_generated: usize,
    pub total_correct_answers: u32,
    pub average_response_time_ms: f64,
    pub players_joined: usize,
    pub players_completed: usize,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_ms: u64,
}

impl From<&GameStats> for GameStatsView {
    fn from(stats: &GameStats) -> Self {
        Self {
            total_questions: stats.total_questions,
            questions_generated: stats.questions_generated,
            total_correct_answers: stats.total_correct_answers,
            average_response_time_ms: stats.average_response_time_ms,
            players_joined: stats.players_joined,
            players_completed: stats.players_completed,
            started_at: stats.started_at.map(format_system_time),
            ended_at: stats.ended_at.map(format_system_time),
            duration_ms: stats.duration.as_millis() as u64,
        }
    }
}

/// Full game snapshot returned on request.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct GameSnapshot {
    pub id: Uuid,
    pub lobby_id: Uuid,
    pub status: GameStatus,
    pub current_round: u32,
    pub total_rounds: u32,
    pub participants: Vec<Uuid>,
    pub scores: Vec<PlayerScoreView>,
    pub round: Option<RoundView>,
    /// Question being asked, without correctness.
    pub current_question: Option<QuestionDisplay>,
    pub time_remaining_ms: Option<u64>,
    pub available_topics: Vec<String>,
    pub settings: GameSettings,
    pub created_at: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}

impl GameSnapshot {
    /// Project `game`; `time_remaining` comes from its question timer.
    pub fn new(game: &GameSession, time_remaining: Option<std::time::Duration>) -> Self {
        let round = game.round();
        Self {
            id: game.id,
            lobby_id: game.lobby_id,
            status: game.status(),
            current_round: game.current_round(),
            total_rounds: game.total_rounds(),
            participants: game.participants().to_vec(),
            scores: score_views(game.scores()),
            round: round.map(RoundView::from),
            current_question: round
                .filter(|round| !round.is_complete())
                .and_then(QuestionDisplay::current),
            time_remaining_ms: time_remaining.map(|left| left.as_millis() as u64),
            available_topics: game.available_topics().to_vec(),
            settings: game.settings().clone(),
            created_at: format_system_time(game.created_at()),
            started_at: game.started_at().map(format_system_time),
            ended_at: game.ended_at().map(format_system_time),
        }
    }
}

/// Advisory end-of-game evaluation.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct EndCheckResponse {
    pub game_id: Uuid,
    pub should_end: bool,
    pub reason: EndReason,
    pub winner: Option<PlayerRef>,
}

impl EndCheckResponse {
    /// Wrap a domain end check.
    pub fn new(game_id: Uuid, check: EndCheck) -> Self {
        Self {
            game_id,
            should_end: check.should_end,
            reason: check.reason,
            winner: check.winner.map(PlayerRef::from),
        }
    }
}

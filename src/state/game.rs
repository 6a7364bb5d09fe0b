use std::time::{Duration, Instant, SystemTime};

use indexmap::IndexMap;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    bonus_wheel,
    lobby::LobbyId,
    player::PlayerId,
    question::{ANSWERS_PER_QUESTION, Difficulty, Question},
    scoring::{AnswerContext, PlayerScore, round_half_up},
    settings::GameSettings,
    state_machine::{
        ApplyError, GameEvent, GameStateMachine, GameStatus, InvalidTransition, PlanError, PlanId,
    },
};

/// Identifier of a game session.
pub type GameId = Uuid;

/// Point doubling can be activated at most this many times per game.
pub const MAX_POINT_DOUBLING: u32 = 3;
/// Spins of the bonus wheel allowed per player per game.
pub const MAX_BONUS_WHEEL_SPINS: u32 = 1;
/// Minimum number of active players for a game to keep running.
pub const MIN_ACTIVE_PLAYERS: usize = 2;
/// A leader must exceed the runner-up by this ratio to be decisive.
const DECISIVE_LEAD_RATIO: f64 = 1.5;
/// Share of the rough maximum score the lead must also exceed.
const DECISIVE_MARGIN_SHARE: f64 = 0.3;

/// Errors raised by game session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// The status machine refused the event.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// The next round could not be reserved.
    #[error(transparent)]
    Plan(#[from] PlanError),
    /// The reserved round could not be installed.
    #[error(transparent)]
    Apply(#[from] ApplyError),
    /// The action requires a game in progress.
    #[error("game is {0:?}")]
    NotInProgress(GameStatus),
    /// The player does not take part in this game.
    #[error("player is not part of this game")]
    NotParticipant,
    /// The player quit or disconnected.
    #[error("player is no longer active in this game")]
    PlayerInactive,
    /// No round is being played.
    #[error("no round is active")]
    NoActiveRound,
    /// A round is still being played.
    #[error("a round is already in progress")]
    RoundInProgress,
    /// Every round was already played.
    #[error("all rounds have been played")]
    NoRoundsLeft,
    /// A round cannot start without questions.
    #[error("no questions were supplied for the round")]
    NoQuestions,
    /// Answer index outside the four answers.
    #[error("answer index {0} is out of range")]
    InvalidAnswerIndex(usize),
    /// The player already answered the current question.
    #[error("answer already submitted for this question")]
    AlreadyAnswered,
    /// Point doubling was already used this round or the cap was reached.
    #[error("point doubling is not available")]
    PointDoublingUnavailable,
    /// The wheel only spins during the final round.
    #[error("the bonus wheel is only available during the final round")]
    BonusWheelNotFinalRound,
    /// The player already spun the wheel.
    #[error("the bonus wheel was already used")]
    BonusWheelAlreadyUsed,
}

/// Answer recorded for the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerRecord {
    /// Index chosen by the player.
    pub answer_index: usize,
    /// Time taken to answer.
    pub response_time: Duration,
    /// Whether the answer was correct.
    pub is_correct: bool,
    /// Points awarded for the answer.
    pub points: i64,
}

/// State of the round being played.
#[derive(Debug, Clone)]
pub struct RoundState {
    /// Round number (1-based).
    pub round_number: u32,
    /// Topic chosen for the round.
    pub topic: String,
    /// Difficulty from the ladder.
    pub difficulty: Difficulty,
    /// Score multiplier, equal to the round number.
    pub round_multiplier: u32,
    questions: Vec<Question>,
    current_question_index: usize,
    question_started_at: Instant,
    round_started_at: Instant,
    player_answers: IndexMap<PlayerId, AnswerRecord>,
    is_complete: bool,
}

impl RoundState {
    fn new(
        round_number: u32,
        topic: String,
        difficulty: Difficulty,
        questions: Vec<Question>,
        now: Instant,
    ) -> Self {
        Self {
            round_number,
            topic,
            difficulty,
            round_multiplier: round_number,
            questions,
            current_question_index: 0,
            question_started_at: now,
            round_started_at: now,
            player_answers: IndexMap::new(),
            is_complete: false,
        }
    }

    /// Every question of the round.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Index of the question being asked (0-based).
    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    /// Question being asked, if any.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    /// Answers recorded for the current question, in submission order.
    pub fn player_answers(&self) -> &IndexMap<PlayerId, AnswerRecord> {
        &self.player_answers
    }

    /// When the current question was displayed.
    pub fn question_started_at(&self) -> Instant {
        self.question_started_at
    }

    /// Whether the round is over.
    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    fn questions_answered(&self) -> usize {
        (self.current_question_index + 1).min(self.questions.len())
    }
}

/// Parameters for fetching the questions of a reserved round.
#[derive(Debug, Clone)]
pub struct RoundRequest {
    /// Reservation to hand back to [`GameSession::install_round`].
    pub plan_id: PlanId,
    /// Round being prepared.
    pub round_number: u32,
    /// Difficulty from the ladder.
    pub difficulty: Difficulty,
    /// Number of questions to fetch.
    pub count: usize,
    /// Question texts already used in this game.
    pub exclude_texts: Vec<String>,
}

/// Outcome of an accepted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedAnswer {
    /// Who answered.
    pub player_id: PlayerId,
    /// Whether the answer was correct.
    pub is_correct: bool,
    /// Points awarded.
    pub points: i64,
}

/// Everything revealed when a question ends.
#[derive(Debug, Clone)]
pub struct QuestionReveal {
    /// Round the question belonged to.
    pub round_number: u32,
    /// Position of the question in the round (1-based).
    pub question_number: usize,
    /// The question, including correctness.
    pub question: Question,
    /// Answers recorded for the question.
    pub answers: Vec<(PlayerId, AnswerRecord)>,
    /// Scoreboard after the question.
    pub scores: Vec<PlayerScore>,
}

/// Summary produced when a round completes.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    /// Round number.
    pub round_number: u32,
    /// Topic of the round.
    pub topic: String,
    /// Difficulty of the round.
    pub difficulty: Difficulty,
    /// Number of questions asked.
    pub questions_answered: usize,
    /// Scoreboard snapshot.
    pub scores: Vec<PlayerScore>,
    /// Highest total score, earliest participant on ties.
    pub top_player: Option<(PlayerId, String)>,
    /// Time since the round started.
    pub duration: Duration,
}

/// Aggregated statistics produced when a game completes.
#[derive(Debug, Clone)]
pub struct GameStats {
    /// Questions actually displayed.
    pub total_questions: u32,
    /// Questions generated across every round.
    pub questions_generated: usize,
    /// Correct answers across all players.
    pub total_correct_answers: u32,
    /// Mean of the players' average response times.
    pub average_response_time_ms: f64,
    /// When the game started.
    pub started_at: Option<SystemTime>,
    /// When the game ended.
    pub ended_at: Option<SystemTime>,
    /// Time between start and end.
    pub duration: Duration,
    /// Participants at creation.
    pub players_joined: usize,
    /// Participants still active at the end.
    pub players_completed: usize,
}

/// A completed round, plus the game statistics when it was the last one.
#[derive(Debug, Clone)]
pub struct RoundCompletion {
    /// Summary of the round.
    pub summary: RoundSummary,
    /// Present when the game completed with this round.
    pub stats: Option<GameStats>,
}

/// Result of advancing past the current question.
#[derive(Debug, Clone)]
pub enum Advance {
    /// Nothing to advance; nothing was mutated.
    Idle,
    /// The next question is now being asked.
    Question {
        /// The question that just ended.
        reveal: Box<QuestionReveal>,
        /// The question now displayed.
        next: Box<Question>,
    },
    /// The round ran out of questions.
    RoundComplete {
        /// The question that just ended.
        reveal: Box<QuestionReveal>,
        /// Round summary and, for the last round, game statistics.
        completion: Box<RoundCompletion>,
    },
}

/// Result of removing a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// Whether the removal cancelled the game.
    pub cancelled: bool,
    /// Active players left.
    pub active_players: usize,
}

/// Why [`GameSession::check_end_conditions`] recommends ending or continuing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Nobody is active anymore.
    AllPlayersDisconnected,
    /// A single active player remains.
    OnlyOnePlayerRemaining,
    /// The last round is over.
    MaximumRoundsCompleted,
    /// The leader cannot realistically be caught.
    DecisiveLeader,
    /// Nothing warrants ending the game.
    GameContinues,
}

/// Advisory evaluation of whether the game should end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndCheck {
    /// Whether ending is recommended.
    pub should_end: bool,
    /// Reason for the recommendation.
    pub reason: EndReason,
    /// Winner, when one can be named.
    pub winner: Option<(PlayerId, String)>,
}

/// Outcome of a bonus wheel spin.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelSpin {
    /// Multiplier landed on.
    pub multiplier: f64,
    /// Message for the player.
    pub message: &'static str,
    /// Points added to (or removed from) the round score.
    pub delta: i64,
    /// Final round score after the spin.
    pub round_score: i64,
    /// Total score after the spin.
    pub total_score: i64,
}

/// One match spawned from a lobby.
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Stable identifier.
    pub id: GameId,
    /// Lobby the game was started from.
    pub lobby_id: LobbyId,
    participants: Vec<PlayerId>,
    scores: Vec<PlayerScore>,
    current_round: u32,
    total_rounds: u32,
    machine: GameStateMachine,
    question_history: Vec<String>,
    round: Option<RoundState>,
    settings: GameSettings,
    available_topics: Vec<String>,
    questions_asked: u32,
    created_at: SystemTime,
    started_at: Option<SystemTime>,
    ended_at: Option<SystemTime>,
    last_activity: Instant,
}

impl GameSession {
    /// Create a waiting game for a fixed participant list.
    pub fn new(
        lobby_id: LobbyId,
        participants: Vec<(PlayerId, String)>,
        settings: GameSettings,
        available_topics: Vec<String>,
    ) -> Self {
        let total_rounds = settings.max_rounds.max(1);
        let scores = participants
            .iter()
            .map(|(player_id, nickname)| PlayerScore::new(*player_id, nickname.clone(), total_rounds))
            .collect();

        Self {
            id: Uuid::new_v4(),
            lobby_id,
            participants: participants.into_iter().map(|(id, _)| id).collect(),
            scores,
            current_round: 0,
            total_rounds,
            machine: GameStateMachine::new(),
            question_history: Vec::new(),
            round: None,
            settings,
            available_topics,
            questions_asked: 0,
            created_at: SystemTime::now(),
            started_at: None,
            ended_at: None,
            last_activity: Instant::now(),
        }
    }

    /// Participants in creation order; never shrinks.
    pub fn participants(&self) -> &[PlayerId] {
        &self.participants
    }

    /// Scoreboard, index-aligned with [`Self::participants`].
    pub fn scores(&self) -> &[PlayerScore] {
        &self.scores
    }

    /// Score entry of a participant.
    pub fn score_of(&self, player_id: PlayerId) -> Option<&PlayerScore> {
        self.score_index(player_id).map(|index| &self.scores[index])
    }

    /// Participants still active.
    pub fn active_participants(&self) -> Vec<PlayerId> {
        self.scores
            .iter()
            .filter(|score| score.is_active)
            .map(|score| score.player_id)
            .collect()
    }

    /// Current status.
    pub fn status(&self) -> GameStatus {
        self.machine.status()
    }

    /// Last round started (0 before the first).
    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    /// Number of rounds in the game.
    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    /// Round being played, or the last one played.
    pub fn round(&self) -> Option<&RoundState> {
        self.round.as_ref()
    }

    /// Whether an incomplete round is installed.
    pub fn has_active_round(&self) -> bool {
        self.round.as_ref().is_some_and(|round| !round.is_complete)
    }

    /// Whether a round is being prepared.
    pub fn has_pending_round(&self) -> bool {
        self.machine.has_pending_round()
    }

    /// Question texts used so far.
    pub fn question_history(&self) -> &[String] {
        &self.question_history
    }

    /// Settings copied from the lobby.
    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// Topics players can pick from.
    pub fn available_topics(&self) -> &[String] {
        &self.available_topics
    }

    /// When the game was created.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// When the game started.
    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    /// When the game ended.
    pub fn ended_at(&self) -> Option<SystemTime> {
        self.ended_at
    }

    /// Whether the game has been idle for longer than `timeout`.
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= timeout
    }

    /// Start the game.
    pub fn start(&mut self) -> Result<(), GameError> {
        self.machine.apply(GameEvent::Start)?;
        self.started_at = Some(SystemTime::now());
        self.last_activity = Instant::now();
        Ok(())
    }

    /// Reserve the next round; its questions are fetched by the caller without holding the session.
    pub fn plan_round(&mut self) -> Result<RoundRequest, GameError> {
        if self.status() != GameStatus::InProgress {
            return Err(GameError::NotInProgress(self.status()));
        }
        if self.has_active_round() {
            return Err(GameError::RoundInProgress);
        }
        if self.current_round >= self.total_rounds {
            return Err(GameError::NoRoundsLeft);
        }

        let round_number = self.current_round + 1;
        let plan = self.machine.plan_round(round_number)?;
        Ok(RoundRequest {
            plan_id: plan.id,
            round_number,
            difficulty: Difficulty::for_round(round_number, self.total_rounds),
            count: self.settings.questions_per_round.max(1) as usize,
            exclude_texts: self.question_history.clone(),
        })
    }

    /// Drop a reservation whose questions will not be installed.
    pub fn abort_round(&mut self, plan_id: PlanId) {
        let _ = self.machine.abort_round(plan_id);
    }

    /// Install the questions of a reserved round and display its first question.
    pub fn install_round(
        &mut self,
        plan_id: PlanId,
        topic: impl Into<String>,
        questions: Vec<Question>,
        now: Instant,
    ) -> Result<&RoundState, GameError> {
        if questions.is_empty() {
            self.abort_round(plan_id);
            return Err(GameError::NoQuestions);
        }

        let plan = self.machine.commit_round(plan_id)?;
        let round_number = plan.round_number;
        let difficulty = Difficulty::for_round(round_number, self.total_rounds);

        self.current_round = round_number;
        self.question_history
            .extend(questions.iter().map(|question| question.text.clone()));
        self.questions_asked += 1;
        self.last_activity = now;

        let round = self
            .round
            .insert(RoundState::new(round_number, topic.into(), difficulty, questions, now));
        Ok(round)
    }

    /// Record a player's answer to the current question and score it.
    ///
    /// A player answers each question once; later submissions are rejected.
    pub fn submit_answer(
        &mut self,
        player_id: PlayerId,
        answer_index: usize,
        now: Instant,
    ) -> Result<SubmittedAnswer, GameError> {
        if answer_index >= ANSWERS_PER_QUESTION {
            return Err(GameError::InvalidAnswerIndex(answer_index));
        }
        if self.status() != GameStatus::InProgress {
            return Err(GameError::NotInProgress(self.status()));
        }

        let index = self
            .score_index(player_id)
            .ok_or(GameError::NotParticipant)?;
        if !self.scores[index].is_active {
            return Err(GameError::PlayerInactive);
        }

        let round = self
            .round
            .as_mut()
            .filter(|round| !round.is_complete)
            .ok_or(GameError::NoActiveRound)?;
        let question = round
            .questions
            .get(round.current_question_index)
            .ok_or(GameError::NoActiveRound)?;
        if round.player_answers.contains_key(&player_id) {
            return Err(GameError::AlreadyAnswered);
        }

        let response_time = now.saturating_duration_since(round.question_started_at);
        let is_correct = question.is_correct(answer_index);
        let context = AnswerContext {
            round_number: round.round_number,
            round_multiplier: round.round_multiplier,
            difficulty: round.difficulty,
            response_time,
            is_correct,
        };
        let points = self.scores[index].apply_answer(&self.settings, &context);

        round.player_answers.insert(
            player_id,
            AnswerRecord {
                answer_index,
                response_time,
                is_correct,
                points,
            },
        );
        self.last_activity = now;

        Ok(SubmittedAnswer {
            player_id,
            is_correct,
            points,
        })
    }

    /// End the current question and move to the next one, completing the round when exhausted.
    pub fn next_question(&mut self, now: Instant) -> Advance {
        if self.status() != GameStatus::InProgress || !self.has_active_round() {
            return Advance::Idle;
        }
        if let Some(round) = self.round.as_ref() {
            for score in self.scores.iter_mut().filter(|score| score.is_active) {
                if !round.player_answers.contains_key(&score.player_id) {
                    score.miss();
                }
            }
        }
        let Some(reveal) = self.current_reveal().map(Box::new) else {
            return Advance::Idle;
        };

        self.last_activity = now;
        let Some(round) = self.round.as_mut() else {
            return Advance::Idle;
        };
        let next_index = round.current_question_index + 1;
        let Some(next) = round.questions.get(next_index).cloned() else {
            return match self.complete_round(now) {
                Ok(completion) => Advance::RoundComplete {
                    reveal,
                    completion: Box::new(completion),
                },
                Err(_) => Advance::Idle,
            };
        };

        round.current_question_index = next_index;
        round.player_answers.clear();
        round.question_started_at = now;
        self.questions_asked += 1;

        Advance::Question {
            reveal,
            next: Box::new(next),
        }
    }

    /// Mark the current round complete and, after the last round, complete the game.
    pub fn complete_round(&mut self, now: Instant) -> Result<RoundCompletion, GameError> {
        let top_player = self.top_player();
        let round = self
            .round
            .as_mut()
            .filter(|round| !round.is_complete)
            .ok_or(GameError::NoActiveRound)?;
        round.is_complete = true;

        let summary = RoundSummary {
            round_number: round.round_number,
            topic: round.topic.clone(),
            difficulty: round.difficulty,
            questions_answered: round.questions_answered(),
            scores: self.scores.clone(),
            top_player,
            duration: now.saturating_duration_since(round.round_started_at),
        };
        self.last_activity = now;

        let stats = if self.current_round >= self.total_rounds {
            Some(self.complete_game()?)
        } else {
            None
        };

        Ok(RoundCompletion { summary, stats })
    }

    /// Complete the game and compute its statistics.
    pub fn complete_game(&mut self) -> Result<GameStats, GameError> {
        self.machine.apply(GameEvent::Complete)?;
        if let Some(round) = self.round.as_mut() {
            round.is_complete = true;
        }
        self.ended_at = Some(SystemTime::now());
        self.last_activity = Instant::now();
        Ok(self.stats())
    }

    /// Statistics of the game so far.
    pub fn stats(&self) -> GameStats {
        let players_joined = self.scores.len();
        let average_response_time_ms = if players_joined == 0 {
            0.0
        } else {
            self.scores
                .iter()
                .map(|score| score.average_response_time_ms)
                .sum::<f64>()
                / players_joined as f64
        };
        let duration = match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => end.duration_since(start).unwrap_or_default(),
            _ => Duration::ZERO,
        };

        GameStats {
            total_questions: self.questions_asked,
            questions_generated: self.question_history.len(),
            total_correct_answers: self.scores.iter().map(|score| score.correct_answers).sum(),
            average_response_time_ms,
            started_at: self.started_at,
            ended_at: self.ended_at,
            duration,
            players_joined,
            players_completed: self.scores.iter().filter(|score| score.is_active).count(),
        }
    }

    /// Flag a participant inactive, cancelling the game when too few remain.
    pub fn remove_player(&mut self, player_id: PlayerId) -> Result<Removal, GameError> {
        let index = self
            .score_index(player_id)
            .ok_or(GameError::NotParticipant)?;
        self.scores[index].is_active = false;
        self.last_activity = Instant::now();

        let active_players = self.scores.iter().filter(|score| score.is_active).count();
        let cancelled = active_players < MIN_ACTIVE_PLAYERS && !self.status().is_terminal();
        if cancelled {
            self.machine.apply(GameEvent::Cancel)?;
            self.ended_at = Some(SystemTime::now());
        }

        Ok(Removal {
            cancelled,
            active_players,
        })
    }

    /// Evaluate whether the game should end; callers decide whether to act.
    pub fn check_end_conditions(&self) -> EndCheck {
        let active: Vec<&PlayerScore> = self.scores.iter().filter(|score| score.is_active).collect();

        match active.as_slice() {
            [] => {
                return EndCheck {
                    should_end: true,
                    reason: EndReason::AllPlayersDisconnected,
                    winner: None,
                };
            }
            [only] => {
                return EndCheck {
                    should_end: true,
                    reason: EndReason::OnlyOnePlayerRemaining,
                    winner: Some((only.player_id, only.nickname.clone())),
                };
            }
            _ => {}
        }

        let last_round_done = self.current_round >= self.total_rounds
            && self.round.as_ref().is_some_and(|round| round.is_complete);
        if last_round_done {
            return EndCheck {
                should_end: true,
                reason: EndReason::MaximumRoundsCompleted,
                winner: self.top_player(),
            };
        }

        let mut ranking: Vec<&PlayerScore> = self.scores.iter().collect();
        ranking.sort_by(|a, b| b.total_score().cmp(&a.total_score()));
        if let [leader, runner_up, ..] = ranking.as_slice() {
            let lead = leader.total_score() as f64;
            let second = runner_up.total_score() as f64;
            let max_estimate =
                f64::from(self.settings.base_points) * f64::from(self.total_rounds) * 3.0;
            if lead > second * DECISIVE_LEAD_RATIO
                && lead - second > max_estimate * DECISIVE_MARGIN_SHARE
            {
                return EndCheck {
                    should_end: true,
                    reason: EndReason::DecisiveLeader,
                    winner: Some((leader.player_id, leader.nickname.clone())),
                };
            }
        }

        EndCheck {
            should_end: false,
            reason: EndReason::GameContinues,
            winner: None,
        }
    }

    /// Activate point doubling for the current round, returning the activations used.
    pub fn activate_point_doubling(&mut self, player_id: PlayerId) -> Result<u32, GameError> {
        self.ensure_active_player(player_id)?;
        if !self.has_active_round() {
            return Err(GameError::NoActiveRound);
        }

        let current_round = self.current_round;
        let index = self
            .score_index(player_id)
            .ok_or(GameError::NotParticipant)?;
        let score = &mut self.scores[index];
        let used_this_round = score.last_doubling_round == Some(current_round);
        if used_this_round || score.points_doubled >= MAX_POINT_DOUBLING.min(current_round) {
            return Err(GameError::PointDoublingUnavailable);
        }

        score.points_doubled += 1;
        score.last_doubling_round = Some(current_round);
        self.last_activity = Instant::now();
        Ok(score.points_doubled)
    }

    /// Spin the bonus wheel during the final round, once per player.
    pub fn spin_bonus_wheel<R: Rng>(
        &mut self,
        player_id: PlayerId,
        rng: &mut R,
    ) -> Result<WheelSpin, GameError> {
        self.ensure_active_player(player_id)?;
        if self.current_round != self.total_rounds || self.round.is_none() {
            return Err(GameError::BonusWheelNotFinalRound);
        }

        let current_round = self.current_round;
        let index = self
            .score_index(player_id)
            .ok_or(GameError::NotParticipant)?;
        let score = &mut self.scores[index];
        if score.bonus_wheel_spins >= MAX_BONUS_WHEEL_SPINS {
            return Err(GameError::BonusWheelAlreadyUsed);
        }

        let segment = bonus_wheel::spin(rng);
        let round_score = score.round_score(current_round);
        let delta = round_half_up(round_score as f64 * (segment.multiplier - 1.0));
        score.add_to_round(current_round, delta);
        score.bonus_wheel_spins += 1;
        self.last_activity = Instant::now();

        Ok(WheelSpin {
            multiplier: segment.multiplier,
            message: segment.message,
            delta,
            round_score: score.round_score(current_round),
            total_score: score.total_score(),
        })
    }

    /// Reveal data for the question currently asked, without advancing.
    pub fn current_reveal(&self) -> Option<QuestionReveal> {
        let round = self.round.as_ref()?;
        let question = round.current_question()?.clone();
        Some(QuestionReveal {
            round_number: round.round_number,
            question_number: round.current_question_index + 1,
            question,
            answers: round
                .player_answers
                .iter()
                .map(|(player_id, record)| (*player_id, *record))
                .collect(),
            scores: self.scores.clone(),
        })
    }

    fn ensure_active_player(&self, player_id: PlayerId) -> Result<(), GameError> {
        if self.status() != GameStatus::InProgress {
            return Err(GameError::NotInProgress(self.status()));
        }
        match self.score_of(player_id) {
            None => Err(GameError::NotParticipant),
            Some(score) if !score.is_active => Err(GameError::PlayerInactive),
            Some(_) => Ok(()),
        }
    }

    fn score_index(&self, player_id: PlayerId) -> Option<usize> {
        self.participants.iter().position(|id| *id == player_id)
    }

    fn top_player(&self) -> Option<(PlayerId, String)> {
        self.scores
            .iter()
            .fold(None::<&PlayerScore>, |best, score| match best {
                Some(current) if score.total_score() <= current.total_score() => Some(current),
                _ => Some(score),
            })
            .map(|score| (score.player_id, score.nickname.clone()))
    }
}

use std::time::Duration;

use crate::state::{player::PlayerId, question::Difficulty, settings::GameSettings};

/// Every third consecutive correct answer earns this multiplier.
pub const STREAK_BONUS: f64 = 1.25;
/// Streak length that triggers [`STREAK_BONUS`].
pub const STREAK_BONUS_EVERY: u32 = 3;
/// Largest extra share a time bonus can add to a correct answer.
pub const MAX_TIME_BONUS: f64 = 0.5;

/// Per-player scoreboard entry living inside a game session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerScore {
    /// Player the entry belongs to.
    pub player_id: PlayerId,
    /// Nickname captured when the game was created.
    pub nickname: String,
    /// Points earned per round, index is `round_number - 1`.
    round_scores: Vec<i64>,
    /// Sum of `round_scores`, never adjusted incrementally.
    total_score: i64,
    /// Number of correct answers.
    pub correct_answers: u32,
    /// Number of answers submitted, correct or not.
    pub answers_given: u32,
    /// Running average response time over every submitted answer.
    pub average_response_time_ms: f64,
    /// Consecutive correct answers.
    pub streak: u32,
    /// False once the player quit or disconnected.
    pub is_active: bool,
    /// Point-doubling activations used.
    pub points_doubled: u32,
    /// Round of the latest point-doubling activation.
    pub last_doubling_round: Option<u32>,
    /// Bonus wheel spins used.
    pub bonus_wheel_spins: u32,
}

/// Everything the scoring rules need to know about one submitted answer.
#[derive(Debug, Clone, Copy)]
pub struct AnswerContext {
    /// Round the answer belongs to (1-based).
    pub round_number: u32,
    /// Multiplier of the round, equal to the round number.
    pub round_multiplier: u32,
    /// Difficulty of the round.
    pub difficulty: Difficulty,
    /// Time between question display and submission.
    pub response_time: Duration,
    /// Whether the submitted answer was correct.
    pub is_correct: bool,
}

impl PlayerScore {
    /// Fresh, zeroed entry for a participant.
    pub fn new(player_id: PlayerId, nickname: impl Into<String>, total_rounds: u32) -> Self {
        Self {
            player_id,
            nickname: nickname.into(),
            round_scores: vec![0; total_rounds as usize],
            total_score: 0,
            correct_answers: 0,
            answers_given: 0,
            average_response_time_ms: 0.0,
            streak: 0,
            is_active: true,
            points_doubled: 0,
            last_doubling_round: None,
            bonus_wheel_spins: 0,
        }
    }

    /// Points earned per round.
    pub fn round_scores(&self) -> &[i64] {
        &self.round_scores
    }

    /// Score for one round (1-based), zero when the round was never played.
    pub fn round_score(&self, round_number: u32) -> i64 {
        round_number
            .checked_sub(1)
            .and_then(|index| self.round_scores.get(index as usize))
            .copied()
            .unwrap_or_default()
    }

    /// Total across every round.
    pub fn total_score(&self) -> i64 {
        self.total_score
    }

    /// Whether point doubling covers `round_number`.
    pub fn has_point_doubling(&self, round_number: u32) -> bool {
        self.points_doubled >= round_number && round_number > 0
    }

    /// Apply the scoring rules for one submitted answer, returning the points awarded.
    pub fn apply_answer(&mut self, settings: &GameSettings, answer: &AnswerContext) -> i64 {
        self.record_response_time(answer.response_time);

        if !answer.is_correct {
            self.streak = 0;
            return 0;
        }

        self.correct_answers += 1;
        let points = correct_answer_points(
            settings,
            answer,
            self.has_point_doubling(answer.round_number),
            (self.streak + 1) % STREAK_BONUS_EVERY == 0,
        );
        self.add_to_round(answer.round_number, points);
        self.streak += 1;
        points
    }

    /// Reset the streak after a question went unanswered.
    pub fn miss(&mut self) {
        self.streak = 0;
    }

    /// Add `delta` to one round's score and resum the total.
    pub fn add_to_round(&mut self, round_number: u32, delta: i64) {
        let Some(index) = round_number.checked_sub(1).map(|index| index as usize) else {
            return;
        };
        if self.round_scores.len() <= index {
            self.round_scores.resize(index + 1, 0);
        }
        self.round_scores[index] += delta;
        self.total_score = self.round_scores.iter().sum();
    }

    fn record_response_time(&mut self, response_time: Duration) {
        self.answers_given += 1;
        let sample = response_time.as_secs_f64() * 1000.0;
        let count = f64::from(self.answers_given);
        self.average_response_time_ms += (sample - self.average_response_time_ms) / count;
    }
}

/// Points for a correct answer, before it is added to the round score.
pub fn correct_answer_points(
    settings: &GameSettings,
    answer: &AnswerContext,
    point_doubling: bool,
    streak_bonus: bool,
) -> i64 {
    let mut points = f64::from(settings.base_points) * f64::from(answer.round_multiplier);

    if settings.time_bonus {
        let limit = settings.question_time_limit.as_secs_f64();
        let bonus = if limit > 0.0 {
            (1.0 - answer.response_time.as_secs_f64() / limit).max(0.0)
        } else {
            0.0
        };
        points *= 1.0 + bonus * MAX_TIME_BONUS;
    }

    points *= settings
        .difficulty_multiplier
        .for_difficulty(answer.difficulty);

    if point_doubling {
        points *= 2.0;
    }

    if streak_bonus {
        points *= STREAK_BONUS;
    }

    round_half_up(points)
}

/// Round to the nearest integer, halves going up.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

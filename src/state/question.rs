use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Number of answers every question must carry.
pub const ANSWERS_PER_QUESTION: usize = 4;

/// Difficulty tier of a round, which also drives the per-question time limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Opening rounds.
    Easy,
    /// Rounds at or past the midpoint of the game.
    Medium,
    /// Second-to-last round.
    Hard,
    /// Final round.
    Extreme,
}

impl Difficulty {
    /// Pick the difficulty for `round` out of `total_rounds` (both 1-based).
    ///
    /// The ladder is monotonic: earlier rounds are never harder than later ones.
    pub fn for_round(round: u32, total_rounds: u32) -> Self {
        if round >= total_rounds {
            Difficulty::Extreme
        } else if round >= total_rounds.saturating_sub(1) {
            Difficulty::Hard
        } else if round * 2 >= total_rounds {
            Difficulty::Medium
        } else {
            Difficulty::Easy
        }
    }

    /// Time players get to answer a question of this difficulty.
    pub fn time_limit(self) -> Duration {
        match self {
            Difficulty::Easy => Duration::from_secs(20),
            Difficulty::Medium => Duration::from_secs(30),
            Difficulty::Hard => Duration::from_secs(45),
            Difficulty::Extreme => Duration::from_secs(60),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Extreme => "extreme",
        };
        f.write_str(label)
    }
}

/// One of the four answers offered for a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Text shown to players.
    pub text: String,
    /// Whether this is the correct answer.
    pub is_correct: bool,
}

/// Question supplied by the question provider for one round.
#[derive(Debug, Clone)]
pub struct Question {
    /// Stable identifier of the question.
    pub id: Uuid,
    /// Question prompt.
    pub text: String,
    /// Exactly four answers, exactly one of them correct.
    pub answers: Vec<Answer>,
    /// Index of the correct entry in `answers`.
    pub correct_answer_index: usize,
    /// Explanation revealed once the question ends.
    pub explanation: String,
    /// Difficulty the question was generated for.
    pub difficulty: Difficulty,
    /// Topic the question belongs to.
    pub topic: String,
    /// Time players get to answer.
    pub time_limit: Duration,
}

impl Question {
    /// Build a question, deriving the correct index and time limit from the inputs.
    pub fn new(
        text: impl Into<String>,
        answers: Vec<Answer>,
        explanation: impl Into<String>,
        difficulty: Difficulty,
        topic: impl Into<String>,
    ) -> Self {
        let correct_answer_index = answers
            .iter()
            .position(|answer| answer.is_correct)
            .unwrap_or_default();
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            answers,
            correct_answer_index,
            explanation: explanation.into(),
            difficulty,
            topic: topic.into(),
            time_limit: difficulty.time_limit(),
        }
    }

    /// Whether `index` designates the correct answer.
    pub fn is_correct(&self, index: usize) -> bool {
        index == self.correct_answer_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_for_five_rounds() {
        let ladder: Vec<_> = (1..=5).map(|round| Difficulty::for_round(round, 5)).collect();
        assert_eq!(
            ladder,
            vec![
                Difficulty::Easy,
                Difficulty::Easy,
                Difficulty::Medium,
                Difficulty::Hard,
                Difficulty::Extreme,
            ]
        );
    }

    #[test]
    fn single_round_game_is_extreme() {
        assert_eq!(Difficulty::for_round(1, 1), Difficulty::Extreme);
    }

    #[test]
    fn two_round_game_goes_hard_then_extreme() {
        assert_eq!(Difficulty::for_round(1, 2), Difficulty::Hard);
        assert_eq!(Difficulty::for_round(2, 2), Difficulty::Extreme);
    }

    #[test]
    fn time_limits_follow_difficulty() {
        assert_eq!(Difficulty::Easy.time_limit(), Duration::from_millis(20_000));
        assert_eq!(Difficulty::Medium.time_limit(), Duration::from_millis(30_000));
        assert_eq!(Difficulty::Hard.time_limit(), Duration::from_millis(45_000));
        assert_eq!(Difficulty::Extreme.time_limit(), Duration::from_millis(60_000));
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use utoipa::ToSchema;

use crate::state::question::Difficulty;

/// Per-difficulty score multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct DifficultyMultipliers {
    /// Multiplier applied during easy rounds.
    pub easy: f64,
    /// Multiplier applied during medium rounds.
    pub medium: f64,
    /// Multiplier applied during hard rounds.
    pub hard: f64,
    /// Multiplier applied during the extreme round.
    pub extreme: f64,
}

impl DifficultyMultipliers {
    /// Multiplier for the given difficulty.
    pub fn for_difficulty(&self, difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
            Difficulty::Extreme => self.extreme,
        }
    }
}

impl Default for DifficultyMultipliers {
    fn default() -> Self {
        Self {
            easy: 1.0,
            medium: 1.5,
            hard: 2.0,
            extreme: 3.0,
        }
    }
}

/// Inclusive range used for the final round multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MultiplierRange {
    /// Lower bound.
    pub min: u32,
    /// Upper bound.
    pub max: u32,
}

impl Default for MultiplierRange {
    fn default() -> Self {
        Self { min: 1, max: 10 }
    }
}

/// Tunables copied from a lobby into each game it spawns.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct GameSettings {
    /// Number of rounds in a game.
    pub max_rounds: u32,
    /// Questions generated for each round.
    pub questions_per_round: u32,
    /// Reference time limit used by the time bonus.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[schema(value_type = u64)]
    pub question_time_limit: Duration,
    /// Pause between rounds shown by clients.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[schema(value_type = u64)]
    pub round_break_duration: Duration,
    /// Points for a correct answer before multipliers.
    pub base_points: u32,
    /// Whether fast answers earn up to 50% more.
    pub time_bonus: bool,
    /// Score multiplier per difficulty.
    pub difficulty_multiplier: DifficultyMultipliers,
    /// Range advertised for the final round multiplier.
    pub final_round_multiplier: MultiplierRange,
    /// Cool-down applied to players quitting a game.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[schema(value_type = u64)]
    pub quit_game_penalty: Duration,
    /// Grace period for reconnecting players.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[schema(value_type = u64)]
    pub reconnection_timeout: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            questions_per_round: 10,
            question_time_limit: Duration::from_secs(30),
            round_break_duration: Duration::from_secs(15),
            base_points: 100,
            time_bonus: true,
            difficulty_multiplier: DifficultyMultipliers::default(),
            final_round_multiplier: MultiplierRange::default(),
            quit_game_penalty: Duration::from_secs(300),
            reconnection_timeout: Duration::from_secs(60),
        }
    }
}

/// Partial update applied by a lobby owner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    /// New number of rounds.
    pub max_rounds: Option<u32>,
    /// New number of questions per round.
    pub questions_per_round: Option<u32>,
    /// New reference time limit.
    pub question_time_limit: Option<Duration>,
    /// Enable or disable the time bonus.
    pub time_bonus: Option<bool>,
}

impl GameSettings {
    /// Apply the fields present in `update`.
    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(max_rounds) = update.max_rounds {
            self.max_rounds = max_rounds;
        }
        if let Some(count) = update.questions_per_round {
            self.questions_per_round = count;
        }
        if let Some(limit) = update.question_time_limit {
            self.question_time_limit = limit;
        }
        if let Some(time_bonus) = update.time_bonus {
            self.time_bonus = time_bonus;
        }
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Created, waiting to be started.
    Waiting,
    /// Rounds are being played.
    InProgress,
    /// Reserved; no event currently leads here.
    Paused,
    /// All rounds were played.
    Completed,
    /// Fewer than two players remained active.
    Cancelled,
}

impl GameStatus {
    /// Whether no further gameplay can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Completed | GameStatus::Cancelled)
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// The game starts right after creation.
    Start,
    /// The final round completed.
    Complete,
    /// Too few active players remain.
    Cancel,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// The status the state machine was in when the invalid event was received.
    pub from: GameStatus,
    /// The event that cannot be applied from this status.
    pub event: GameEvent,
}

/// Errors that can occur when reserving a round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A round is already being prepared.
    #[error("a round is already being prepared")]
    AlreadyPending,
    /// Rounds can only start while the game is in progress.
    #[error("rounds cannot start while the game is {0:?}")]
    NotInProgress(GameStatus),
}

/// Errors that can occur when installing a reserved round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// No round is currently reserved.
    #[error("no round is pending")]
    NoPending,
    /// Plan ID does not match the pending plan.
    #[error("pending round does not match")]
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// Status changed since the round was reserved.
    #[error("game status changed while preparing the round (now {actual:?})")]
    StatusMismatch {
        /// Current status.
        actual: GameStatus,
    },
    /// State machine version changed since the round was reserved.
    #[error("game changed while preparing the round (expected version {expected}, got {actual})")]
    VersionMismatch {
        /// Version when the plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a reserved round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbortError {
    /// No round is currently reserved.
    #[error("no round is pending")]
    NoPending,
    /// Plan ID does not match the pending plan.
    #[error("pending round does not match")]
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a round reservation.
pub type PlanId = Uuid;

/// A round reserved while its questions are being fetched.
#[derive(Debug, Clone)]
pub struct RoundPlan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Round number that will be installed.
    pub round_number: u32,
    /// Version the machine had when the plan was created.
    pub version: usize,
}

/// Status machine of a single game session.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    status: GameStatus,
    version: usize,
    pending: Option<RoundPlan>,
}

impl Default for GameStateMachine {
    fn default() -> Self {
        Self {
            status: GameStatus::Waiting,
            version: 0,
            pending: None,
        }
    }
}

impl GameStateMachine {
    /// Create a new state machine in the waiting status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Whether a round reservation is outstanding.
    pub fn has_pending_round(&self) -> bool {
        self.pending.is_some()
    }

    /// Apply a status event, returning the new status.
    ///
    /// Terminal transitions drop any outstanding round reservation.
    pub fn apply(&mut self, event: GameEvent) -> Result<GameStatus, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.status = next;
        self.version += 1;
        if next.is_terminal() {
            self.pending = None;
        }
        Ok(next)
    }

    /// Reserve the next round so its questions can be fetched without holding the session.
    pub fn plan_round(&mut self, round_number: u32) -> Result<RoundPlan, PlanError> {
        if self.status != GameStatus::InProgress {
            return Err(PlanError::NotInProgress(self.status));
        }
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let plan = RoundPlan {
            id: Uuid::new_v4(),
            round_number,
            version: self.version,
        };
        self.pending = Some(plan.clone());
        Ok(plan)
    }

    /// Consume a reservation, checking that nothing changed since it was made.
    pub fn commit_round(&mut self, plan_id: PlanId) -> Result<RoundPlan, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        if self.status != GameStatus::InProgress {
            return Err(ApplyError::StatusMismatch {
                actual: self.status,
            });
        }

        if self.version != plan.version {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version,
                actual: self.version,
            });
        }

        self.version += 1;
        Ok(plan)
    }

    /// Drop a reservation without installing a round.
    pub fn abort_round(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(&self, event: GameEvent) -> Result<GameStatus, InvalidTransition> {
        let next = match (self.status, event) {
            (GameStatus::Waiting, GameEvent::Start) => GameStatus::InProgress,
            (GameStatus::InProgress, GameEvent::Complete) => GameStatus::Completed,
            (GameStatus::Waiting | GameStatus::InProgress | GameStatus::Paused, GameEvent::Cancel) => {
                GameStatus::Cancelled
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> GameStateMachine {
        let mut sm = GameStateMachine::new();
        sm.apply(GameEvent::Start).unwrap();
        sm
    }

    #[test]
    fn initial_state_is_waiting() {
        let sm = GameStateMachine::new();
        assert_eq!(sm.status(), GameStatus::Waiting);
        assert!(!sm.has_pending_round());
    }

    #[test]
    fn full_happy_path_through_game() {
        let mut sm = GameStateMachine::new();
        assert_eq!(sm.apply(GameEvent::Start).unwrap(), GameStatus::InProgress);

        let plan = sm.plan_round(1).unwrap();
        sm.commit_round(plan.id).unwrap();

        assert_eq!(sm.apply(GameEvent::Complete).unwrap(), GameStatus::Completed);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut sm = started();
        let err = sm.apply(GameEvent::Start).unwrap_err();
        assert_eq!(err.from, GameStatus::InProgress);
        assert_eq!(err.event, GameEvent::Start);
    }

    #[test]
    fn completed_game_cannot_be_cancelled() {
        let mut sm = started();
        sm.apply(GameEvent::Complete).unwrap();
        assert!(sm.apply(GameEvent::Cancel).is_err());
    }

    #[test]
    fn paused_is_unreachable() {
        let mut sm = GameStateMachine::new();
        for event in [GameEvent::Start, GameEvent::Complete, GameEvent::Cancel] {
            let _ = sm.apply(event);
            assert_ne!(sm.status(), GameStatus::Paused);
        }
    }

    #[test]
    fn round_cannot_be_planned_twice() {
        let mut sm = started();
        sm.plan_round(1).unwrap();
        assert_eq!(sm.plan_round(1).unwrap_err(), PlanError::AlreadyPending);
    }

    #[test]
    fn round_cannot_be_planned_before_start() {
        let mut sm = GameStateMachine::new();
        assert_eq!(
            sm.plan_round(1).unwrap_err(),
            PlanError::NotInProgress(GameStatus::Waiting)
        );
    }

    #[test]
    fn cancel_while_round_pending_invalidates_plan() {
        let mut sm = started();
        let plan = sm.plan_round(1).unwrap();
        sm.apply(GameEvent::Cancel).unwrap();

        match sm.commit_round(plan.id) {
            Err(ApplyError::NoPending) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn mismatched_plan_id_keeps_reservation() {
        let mut sm = started();
        let plan = sm.plan_round(1).unwrap();

        match sm.commit_round(Uuid::new_v4()) {
            Err(ApplyError::IdMismatch { expected, .. }) => assert_eq!(expected, plan.id),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(sm.has_pending_round());
        sm.commit_round(plan.id).unwrap();
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = started();
        let plan = sm.plan_round(1).unwrap();
        sm.abort_round(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.abort_round(plan.id).unwrap_err(), AbortError::NoPending);
    }
}

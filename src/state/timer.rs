use std::{future::Future, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, sleep},
};

/// Auto-advance timer owned by a game session.
///
/// Every arm bumps a generation counter. A fired callback must call [`QuestionTimer::claim`]
/// with its generation while holding the session lock; a stale generation means the timer was
/// re-armed or cancelled in the meantime and the callback must do nothing.
#[derive(Debug, Default)]
pub struct QuestionTimer {
    generation: u64,
    handle: Option<JoinHandle<()>>,
    deadline: Option<Instant>,
}

impl QuestionTimer {
    /// Create an idle timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending timer and schedule `on_fire` after `delay`.
    ///
    /// Returns the generation handed to the callback.
    pub fn arm<F, Fut>(&mut self, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        self.deadline = Some(Instant::now() + delay);
        self.handle = Some(tokio::spawn(async move {
            sleep(delay).await;
            on_fire(generation).await;
        }));
        generation
    }

    /// Abort the pending timer, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.deadline = None;
    }

    /// Consume the timer from inside its own callback.
    ///
    /// The handle is detached rather than aborted since the caller is that very task.
    pub fn claim(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.handle.is_none() {
            return false;
        }
        self.handle = None;
        self.deadline = None;
        true
    }

    /// Whether a timer is pending.
    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Time left before the timer fires.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

impl Drop for QuestionTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

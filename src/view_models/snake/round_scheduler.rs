//! Single outstanding timer per session, guarded by an epoch counter.
//!
//! Every arm or cancel bumps the epoch. A fired timer reports the epoch it was
//! armed with and [`RoundScheduler::accept`] refuses anything older, so a
//! callback that raced a restart or stop does nothing.
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Armed,
    Resolving,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    /// Voting window closes and the move is applied.
    Round,
    /// Cooldown after game over ends and a new game begins.
    Restart,
}

#[derive(Debug)]
pub struct RoundScheduler {
    epoch: u64,
    state: SchedulerState,
    armed_kind: Option<TimerKind>,
    pending: Option<JoinHandle<()>>,
}

impl RoundScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: 0,
            state: SchedulerState::Idle,
            armed_kind: None,
            pending: None,
        }
    }

    /// Cancels whatever is outstanding and calls `on_fire(kind, epoch)` once
    /// `after` has elapsed. Returns the new epoch.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&mut self, kind: TimerKind, after: Duration, on_fire: F) -> u64
    where
        F: FnOnce(TimerKind, u64) + Send + 'static,
    {
        self.abort_pending();
        self.epoch += 1;
        let epoch = self.epoch;
        debug!("Arming {kind:?} timer for {after:?} (epoch {epoch})");
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            on_fire(kind, epoch);
        }));
        self.state = SchedulerState::Armed;
        self.armed_kind = Some(kind);
        epoch
    }

    /// Drops the outstanding timer. Returns whether one was armed.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.state == SchedulerState::Armed;
        self.abort_pending();
        self.epoch += 1;
        self.state = SchedulerState::Idle;
        self.armed_kind = None;
        was_armed
    }

    /// Claims a fired timer. Only the most recently armed one is accepted.
    pub fn accept(&mut self, kind: TimerKind, epoch: u64) -> bool {
        if self.state != SchedulerState::Armed
            || epoch != self.epoch
            || self.armed_kind != Some(kind)
        {
            debug!(
                "Ignoring stale {kind:?} timer (epoch {epoch}, current {})",
                self.epoch
            );
            return false;
        }
        self.state = SchedulerState::Resolving;
        self.armed_kind = None;
        self.pending = None;
        true
    }

    /// Marks resolution done when nothing new was armed during it.
    pub fn finish(&mut self) {
        if self.state == SchedulerState::Resolving {
            self.state = SchedulerState::Idle;
        }
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Default for RoundScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RoundScheduler {
    fn drop(&mut self) {
        self.abort_pending();
    }
}

//! Failure-latching front end over a worker pool.

use crate::error::{DispatchError, Result};
use crate::pool::WorkerPool;
use crate::Command;

/// Number of update phases per frame.
pub const UPDATE_PHASES: u16 = 3;

/// Drives a [`WorkerPool`] and holds the last dispatch failure.
///
/// After a failed dispatch every further dispatch is refused with
/// [`DispatchError::Unacknowledged`] until [`Scheduler::acknowledge`] is
/// called.
pub struct Scheduler {
    pool: Box<dyn WorkerPool>,
    blocked: bool,
    dispatches: u64,
}

impl Scheduler {
    /// Wrap a pool.
    pub fn new(pool: Box<dyn WorkerPool>) -> Self {
        Self {
            pool,
            blocked: false,
            dispatches: 0,
        }
    }

    /// Slices per dispatch.
    pub fn threads(&self) -> usize {
        self.pool.threads()
    }

    /// True while a failure is waiting to be acknowledged.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Dispatches completed so far, failed ones included.
    pub fn dispatches(&self) -> u64 {
        self.dispatches
    }

    /// Clear a recorded failure. Returns whether one was pending.
    pub fn acknowledge(&mut self) -> bool {
        std::mem::replace(&mut self.blocked, false)
    }

    /// Run one command on every slice.
    pub fn dispatch(&mut self, command: Command) -> Result<()> {
        if self.blocked {
            return Err(DispatchError::Unacknowledged);
        }
        let failures = self.pool.dispatch(command);
        self.dispatches += 1;
        if failures.is_empty() {
            return Ok(());
        }
        self.blocked = true;
        Err(DispatchError::Workers {
            kind: command.kind,
            failures,
        })
    }

    /// Run update phases `1..=UPDATE_PHASES` in order, stopping at the first
    /// failed phase.
    pub fn update(&mut self) -> Result<()> {
        (1..=UPDATE_PHASES).try_for_each(|phase| self.dispatch(Command::update(phase)))
    }

    /// Run the render pass.
    pub fn render(&mut self) -> Result<()> {
        self.dispatch(Command::render(0))
    }
}

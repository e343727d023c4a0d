//! Pool traits, the inline pool and the factories.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::barrier::BarrierPool;
use crate::error::{Result, SliceError, WorkerFailure};
use crate::{Command, CommandKind};

/// Work executed by the pool, one slice per worker.
///
/// Both methods take `&self`: every worker runs concurrently against the
/// same runner, so any state a slice writes must be partitioned by `index`
/// or synchronized by the implementor.
pub trait SliceRunner: Send + Sync {
    /// Run slice `index` of `count` for update phase `phase`.
    fn update_slice(&self, index: usize, count: usize, phase: u16) -> std::result::Result<(), SliceError>;

    /// Run slice `index` of `count` for render phase `phase`.
    fn render_slice(&self, index: usize, count: usize, phase: u16) -> std::result::Result<(), SliceError>;
}

/// A fixed set of workers that executes one command at a time.
pub trait WorkerPool: Send {
    /// Number of slices each dispatch is split into.
    fn threads(&self) -> usize;

    /// Run `command` on every slice and block until all of them finished.
    ///
    /// Returns the failures recorded during this dispatch, ascending by
    /// worker index.
    fn dispatch(&mut self, command: Command) -> Vec<WorkerFailure>;
}

/// Creates worker pools for a scene.
pub trait ThreadPoolFactory: Send + Sync {
    /// Build a pool of `threads` workers driving `runner`.
    fn create(&self, threads: usize, runner: Arc<dyn SliceRunner>) -> Result<Box<dyn WorkerPool>>;
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run one slice, turning errors and panics into a failure record.
pub(crate) fn run_slice(runner: &dyn SliceRunner, command: Command, index: usize, count: usize) -> Option<WorkerFailure> {
    let outcome = catch_unwind(AssertUnwindSafe(|| match command.kind {
        CommandKind::Update => runner.update_slice(index, count, command.phase),
        CommandKind::Render => runner.render_slice(index, count, command.phase),
        CommandKind::Exit => Ok(()),
    }));
    let error = match outcome {
        Ok(Ok(())) => return None,
        Ok(Err(e)) => e,
        Err(payload) => SliceError::Panicked(panic_message(payload)),
    };
    log::warn!("worker {} failed in {} phase {}: {}", index, command.kind, command.phase, error);
    Some(WorkerFailure {
        worker: index,
        phase: command.phase,
        error,
    })
}

/// Runs every slice on the calling thread, in index order.
pub struct InlinePool {
    slices: usize,
    runner: Arc<dyn SliceRunner>,
}

impl InlinePool {
    /// Inline pool splitting each dispatch into `slices` slices.
    pub fn new(slices: usize, runner: Arc<dyn SliceRunner>) -> Self {
        Self {
            slices: slices.max(1),
            runner,
        }
    }
}

impl WorkerPool for InlinePool {
    fn threads(&self) -> usize {
        self.slices
    }

    fn dispatch(&mut self, command: Command) -> Vec<WorkerFailure> {
        log::trace!("inline dispatch {:?}", command);
        (0..self.slices)
            .filter_map(|i| run_slice(self.runner.as_ref(), command, i, self.slices))
            .collect()
    }
}

/// Factory for [`BarrierPool`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadedFactory;

impl ThreadPoolFactory for ThreadedFactory {
    fn create(&self, threads: usize, runner: Arc<dyn SliceRunner>) -> Result<Box<dyn WorkerPool>> {
        Ok(Box::new(BarrierPool::new(threads, runner)?))
    }
}

/// Factory for [`InlinePool`], the static single-threaded mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticFactory;

impl ThreadPoolFactory for StaticFactory {
    fn create(&self, threads: usize, runner: Arc<dyn SliceRunner>) -> Result<Box<dyn WorkerPool>> {
        log::info!("static mode: {} slices run inline", threads.max(1));
        Ok(Box::new(InlinePool::new(threads, runner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    impl SliceRunner for Counting {
        fn update_slice(&self, index: usize, _count: usize, _phase: u16) -> std::result::Result<(), SliceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(index) == self.fail_on {
                return Err(SliceError::Failed("boom".into()));
            }
            Ok(())
        }

        fn render_slice(&self, index: usize, _count: usize, _phase: u16) -> std::result::Result<(), SliceError> {
            if Some(index) == self.fail_on {
                panic!("render exploded");
            }
            Ok(())
        }
    }

    #[test]
    fn test_inline_runs_every_slice() {
        let runner = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail_on: Some(2),
        });
        let mut pool = InlinePool::new(4, runner.clone());
        let failures = pool.dispatch(Command::update(1));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 4);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].worker, 2);
        assert_eq!(failures[0].phase, 1);
    }

    #[test]
    fn test_inline_catches_panic() {
        let runner = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail_on: Some(0),
        });
        let mut pool = InlinePool::new(2, runner);
        let failures = pool.dispatch(Command::render(0));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].error, SliceError::Panicked("render exploded".into()));
    }
}

//! Error types for slice execution and dispatch.

use std::fmt;

use thiserror::Error;

use crate::CommandKind;

/// Failure raised inside one worker's slice.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SliceError {
    /// The slice returned an error.
    #[error("{0}")]
    Failed(String),

    /// The slice panicked; the payload message is kept when it is a string.
    #[error("panicked: {0}")]
    Panicked(String),
}

/// A failure recorded in a worker's slot.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerFailure {
    /// Index of the worker (and slice) that failed.
    pub worker: usize,
    /// Phase the worker was executing.
    pub phase: u16,
    /// What went wrong.
    pub error: SliceError,
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {} (phase {}): {}", self.worker, self.phase, self.error)
    }
}

fn list(failures: &[WorkerFailure]) -> String {
    failures.iter().map(|w| w.to_string()).collect::<Vec<_>>().join("; ")
}

/// Errors surfaced by the scheduler.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// One or more workers failed; every worker still reached the barrier.
    #[error("{kind} dispatch failed: {}", list(.failures))]
    Workers {
        /// Kind of the failed dispatch.
        kind: CommandKind,
        /// Every failing worker, ascending by index.
        failures: Vec<WorkerFailure>,
    },

    /// A previous failure has not been acknowledged yet.
    #[error("previous dispatch failure has not been acknowledged")]
    Unacknowledged,

    /// A worker thread could not be started.
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        /// Index of the worker that could not start.
        worker: usize,
        /// OS error.
        #[source]
        source: std::io::Error,
    },
}

impl DispatchError {
    /// Worker indices named by this error, if any.
    pub fn workers(&self) -> Vec<usize> {
        match self {
            DispatchError::Workers { failures, .. } => failures.iter().map(|f| f.worker).collect(),
            DispatchError::Spawn { worker, .. } => vec![*worker],
            DispatchError::Unacknowledged => Vec::new(),
        }
    }
}

/// Result type for dispatches.
pub type Result<T> = std::result::Result<T, DispatchError>;

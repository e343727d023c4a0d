#![warn(missing_docs)]

//! Tile-parallel scheduling for the csgray engine.
//!
//! A scene hands its update and render work to a [`WorkerPool`] through
//! the [`SliceRunner`] trait. Every dispatch is synchronous for the caller:
//! work is split into one slice per worker, all slices run to completion
//! even when some fail, and failures are reported per worker index.
//!
//! # Architecture
//!
//! - [`Command`] - Packed `(kind, phase)` word published to workers
//! - [`BarrierPool`] - `N` threads synchronized by two barriers per dispatch
//! - [`InlinePool`] - Static mode running every slice on the caller
//! - [`Scheduler`] - Latches failures until the caller acknowledges them
//! - [`tiles`] - Round-robin row bands and contiguous work shares

mod barrier;
mod command;
pub mod error;
mod pool;
mod scheduler;
pub mod tiles;

pub use barrier::BarrierPool;
pub use command::{Command, CommandKind};
pub use error::{DispatchError, Result, SliceError, WorkerFailure};
pub use pool::{InlinePool, SliceRunner, StaticFactory, ThreadPoolFactory, ThreadedFactory, WorkerPool};
pub use scheduler::{Scheduler, UPDATE_PHASES};

//! Two-barrier worker pool.
//!
//! Each dispatch is one rendezvous pair. The coordinator stores the packed
//! command word and waits on the start barrier; every worker wakes, runs its
//! slice and waits on the done barrier, which the coordinator joins last.
//! A failing worker records its error in its own slot and still reaches the
//! done barrier, so a failure never strands the others.
//! Worker `i` is pinned to core `i % cores` when the host allows it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use core_affinity::CoreId;
use crossbeam_utils::CachePadded;

use crate::error::{DispatchError, Result, WorkerFailure};
use crate::pool::{run_slice, SliceRunner, WorkerPool};
use crate::{Command, CommandKind};

type Slot = CachePadded<Mutex<Option<WorkerFailure>>>;

struct Shared {
    command: AtomicU32,
    start: Barrier,
    done: Barrier,
    slots: Box<[Slot]>,
    runner: Arc<dyn SliceRunner>,
}

/// A pool of exactly `N` OS threads, created once and reused for every
/// dispatch.
pub struct BarrierPool {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl BarrierPool {
    /// Spawn `threads` workers (at least one).
    ///
    /// Workers only enter the barrier loop once every thread has started;
    /// if any spawn fails, the ones already running are told to leave and
    /// are joined before the error is returned.
    pub fn new(threads: usize, runner: Arc<dyn SliceRunner>) -> Result<Self> {
        let threads = threads.max(1);
        let shared = Arc::new(Shared {
            command: AtomicU32::new(Command::EXIT.pack()),
            start: Barrier::new(threads + 1),
            done: Barrier::new(threads + 1),
            slots: (0..threads).map(|_| CachePadded::new(Mutex::new(None))).collect(),
            runner,
        });

        let cores: Arc<[CoreId]> = core_affinity::get_core_ids().unwrap_or_default().into();
        if cores.is_empty() {
            log::warn!("core ids unavailable, workers will not be pinned");
        }

        let mut handles = Vec::with_capacity(threads);
        let mut gates = Vec::with_capacity(threads);
        for index in 0..threads {
            let (gate, wait) = mpsc::channel::<()>();
            let worker = Arc::clone(&shared);
            let cores = Arc::clone(&cores);
            let spawned = thread::Builder::new()
                .name(format!("csgray-worker-{index}"))
                .spawn(move || {
                    pin(index, &cores);
                    if wait.recv().is_ok() {
                        worker_loop(&worker, index, threads);
                    }
                });
            match spawned {
                Ok(handle) => {
                    handles.push(handle);
                    gates.push(gate);
                }
                Err(source) => {
                    // Dropping the gates releases the started workers.
                    drop(gates);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(DispatchError::Spawn { worker: index, source });
                }
            }
        }
        for gate in gates {
            // A worker that is gone cannot receive; it will be missing at the
            // barrier, which only happens if its thread already died.
            let _ = gate.send(());
        }

        log::info!("worker pool started with {} threads", threads);
        Ok(Self { shared, handles })
    }
}

fn pin(index: usize, cores: &[CoreId]) {
    if cores.is_empty() {
        return;
    }
    let core = cores[index % cores.len()];
    if !core_affinity::set_for_current(core) {
        log::warn!("worker {} could not be pinned to core {}", index, core.id);
    }
}

fn worker_loop(shared: &Shared, index: usize, count: usize) {
    loop {
        shared.start.wait();
        let command = Command::unpack(shared.command.load(Ordering::Acquire));
        if command.kind == CommandKind::Exit {
            break;
        }
        if let Some(failure) = run_slice(shared.runner.as_ref(), command, index, count) {
            *shared.slots[index].lock().unwrap_or_else(PoisonError::into_inner) = Some(failure);
        }
        shared.done.wait();
    }
}

impl WorkerPool for BarrierPool {
    fn threads(&self) -> usize {
        self.shared.slots.len()
    }

    fn dispatch(&mut self, command: Command) -> Vec<WorkerFailure> {
        if command.kind == CommandKind::Exit {
            return Vec::new();
        }
        log::trace!("dispatch {:?}", command);
        self.shared.command.store(command.pack(), Ordering::Release);
        self.shared.start.wait();
        self.shared.done.wait();
        self.shared
            .slots
            .iter()
            .filter_map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).take())
            .collect()
    }
}

impl Drop for BarrierPool {
    fn drop(&mut self) {
        self.shared.command.store(Command::EXIT.pack(), Ordering::Release);
        self.shared.start.wait();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        log::info!("worker pool stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SliceError;
    use std::sync::atomic::AtomicUsize;

    struct Recorder {
        hits: Vec<AtomicUsize>,
        fail_on: Option<usize>,
    }

    impl Recorder {
        fn new(n: usize, fail_on: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                hits: (0..n).map(|_| AtomicUsize::new(0)).collect(),
                fail_on,
            })
        }
    }

    impl SliceRunner for Recorder {
        fn update_slice(&self, index: usize, _count: usize, phase: u16) -> std::result::Result<(), SliceError> {
            self.hits[index].fetch_add(1, Ordering::SeqCst);
            if Some(index) == self.fail_on {
                return Err(SliceError::Failed(format!("phase {phase} rejected")));
            }
            Ok(())
        }

        fn render_slice(&self, index: usize, _count: usize, _phase: u16) -> std::result::Result<(), SliceError> {
            self.hits[index].fetch_add(1, Ordering::SeqCst);
            if Some(index) == self.fail_on {
                panic!("tile {index} failed");
            }
            Ok(())
        }
    }

    #[test]
    fn test_every_worker_runs_each_dispatch() {
        for n in [1, 2, 4, 8] {
            let rec = Recorder::new(n, None);
            let mut pool = BarrierPool::new(n, rec.clone()).unwrap();
            assert_eq!(pool.threads(), n);
            for phase in 1..=3 {
                assert!(pool.dispatch(Command::update(phase)).is_empty());
            }
            assert!(pool.dispatch(Command::render(0)).is_empty());
            drop(pool);
            for h in &rec.hits {
                assert_eq!(h.load(Ordering::SeqCst), 4);
            }
        }
    }

    #[test]
    fn test_one_failure_named_and_others_finish() {
        let rec = Recorder::new(4, Some(2));
        let mut pool = BarrierPool::new(4, rec.clone()).unwrap();
        let failures = pool.dispatch(Command::update(2));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].worker, 2);
        assert_eq!(failures[0].phase, 2);
        for h in &rec.hits {
            assert_eq!(h.load(Ordering::SeqCst), 1);
        }

        // Slots are drained, and a panic is recorded the same way.
        let failures = pool.dispatch(Command::render(0));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].worker, 2);
        assert!(matches!(failures[0].error, SliceError::Panicked(_)));
    }

    #[test]
    fn test_more_workers_than_cores() {
        let cores = core_affinity::get_core_ids().map_or(1, |c| c.len().max(1));
        let n = cores * 2 + 1;
        let rec = Recorder::new(n, None);
        let mut pool = BarrierPool::new(n, rec.clone()).unwrap();
        assert!(pool.dispatch(Command::update(1)).is_empty());
        assert!(pool.dispatch(Command::render(0)).is_empty());
        drop(pool);
        for h in &rec.hits {
            assert_eq!(h.load(Ordering::SeqCst), 2);
        }
    }

    #[test]
    fn test_zero_threads_means_one() {
        let rec = Recorder::new(1, None);
        let pool = BarrierPool::new(0, rec).unwrap();
        assert_eq!(pool.threads(), 1);
    }
}

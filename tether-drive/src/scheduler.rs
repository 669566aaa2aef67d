//! Fixed-rate periodic scheduler
//!
//! One named worker thread per scheduler waits on a condition variable until
//! the next deadline, then runs the task. Deadlines advance by exactly one
//! interval from the previous deadline, never from "now", so long-run drift
//! stays bounded regardless of how long the task takes.
//!
//! If the task overruns its interval the missed firings run back to back with
//! no delay until the schedule has caught up.
//!
//! All schedule state lives under one mutex shared by `start`, `stop` and the
//! firing loop. The rearm decision is made under that lock before the task is
//! invoked; the task itself runs with the lock released.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Whether the task repeats or fires once per `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Repeating,
    OneShot,
}

/// Snapshot of the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    pub interval: Duration,
    /// Previous deadline plus one interval while running
    pub next_deadline: Option<Instant>,
    pub running: bool,
    pub repeat: bool,
}

/// Firing counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Task invocations, including failed ones
    pub fired: u64,
    /// Invocations that returned an error or panicked
    pub failed: u64,
}

struct Inner {
    schedule: ScheduleState,
    in_flight: bool,
    terminated: bool,
    stats: SchedulerStats,
}

struct Shared {
    inner: Mutex<Inner>,
    /// Signalled on start, stop and termination
    wake: Condvar,
    /// Signalled when an invocation finishes
    idle: Condvar,
}

/// Runs a task at a fixed rate on a dedicated thread
pub struct PeriodicScheduler {
    name: String,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl PeriodicScheduler {
    /// Create a stopped scheduler and spawn its worker thread
    pub fn new<F>(name: &str, interval: Duration, cadence: Cadence, task: F) -> Result<Self>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(Error::Config(format!("{} interval must be non-zero", name)));
        }

        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                schedule: ScheduleState {
                    interval,
                    next_deadline: None,
                    running: false,
                    repeat: cadence == Cadence::Repeating,
                },
                in_flight: false,
                terminated: false,
                stats: SchedulerStats::default(),
            }),
            wake: Condvar::new(),
            idle: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker_name = name.to_string();
        let worker = thread::Builder::new()
            .name(format!("{}-timer", name))
            .spawn(move || run_loop(&worker_name, &worker_shared, task))
            .map_err(|e| Error::Other(format!("Failed to spawn {} timer: {}", name, e)))?;
        let worker_id = worker.thread().id();

        log::debug!("{}: scheduler created (interval {:?})", name, interval);

        Ok(Self {
            name: name.to_string(),
            shared,
            worker: Some(worker),
            worker_id,
        })
    }

    /// Begin firing; the first firing is one interval from now
    ///
    /// Returns `false` if already running.
    pub fn start(&self) -> bool {
        let mut inner = self.shared.inner.lock();
        if inner.terminated || inner.schedule.running {
            return false;
        }
        inner.schedule.running = true;
        inner.schedule.next_deadline = Some(Instant::now() + inner.schedule.interval);
        self.shared.wake.notify_one();
        log::debug!("{}: started", self.name);
        true
    }

    /// Cancel pending firings and clear the deadline
    ///
    /// An invocation already in progress is allowed to finish. Returns
    /// whether the scheduler was running.
    pub fn stop(&self) -> bool {
        let mut inner = self.shared.inner.lock();
        let was_running = inner.schedule.running;
        inner.schedule.running = false;
        inner.schedule.next_deadline = None;
        self.shared.wake.notify_one();
        if was_running {
            log::debug!("{}: stopped", self.name);
        }
        was_running
    }

    /// Stop, then block until any in-progress invocation returns
    ///
    /// Does not block when called from the task itself.
    pub fn stop_and_wait(&self) -> bool {
        let was_running = self.stop();
        if thread::current().id() == self.worker_id {
            return was_running;
        }
        let mut inner = self.shared.inner.lock();
        while inner.in_flight {
            self.shared.idle.wait(&mut inner);
        }
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.shared.inner.lock().schedule.running
    }

    pub fn state(&self) -> ScheduleState {
        self.shared.inner.lock().schedule
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.inner.lock().stats
    }

    pub fn interval(&self) -> Duration {
        self.shared.inner.lock().schedule.interval
    }
}

impl Drop for PeriodicScheduler {
    fn drop(&mut self) {
        {
            let mut inner = self.shared.inner.lock();
            inner.terminated = true;
            inner.schedule.running = false;
            inner.schedule.next_deadline = None;
            self.shared.wake.notify_all();
        }

        if let Some(worker) = self.worker.take() {
            // Joining our own thread would deadlock; it exits on its own
            if thread::current().id() != self.worker_id && worker.join().is_err() {
                log::error!("{}: timer thread panicked", self.name);
            }
        }
    }
}

fn run_loop<F>(name: &str, shared: &Shared, mut task: F)
where
    F: FnMut() -> Result<()>,
{
    let mut inner = shared.inner.lock();

    while !inner.terminated {
        let deadline = match (inner.schedule.running, inner.schedule.next_deadline) {
            (true, Some(deadline)) => deadline,
            _ => {
                shared.wake.wait(&mut inner);
                continue;
            }
        };

        if Instant::now() < deadline {
            // Re-check everything after waking: stop/start may have moved the deadline
            shared.wake.wait_until(&mut inner, deadline);
            continue;
        }

        if inner.schedule.repeat {
            inner.schedule.next_deadline = Some(deadline + inner.schedule.interval);
        } else {
            inner.schedule.running = false;
            inner.schedule.next_deadline = None;
        }
        inner.in_flight = true;

        let outcome =
            MutexGuard::unlocked(&mut inner, || panic::catch_unwind(AssertUnwindSafe(&mut task)));

        inner.in_flight = false;
        inner.stats.fired += 1;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                inner.stats.failed += 1;
                log::debug!("{}: task failed: {}", name, e);
            }
            Err(_) => {
                inner.stats.failed += 1;
                log::debug!("{}: task panicked", name);
            }
        }
        shared.idle.notify_all();
    }

    log::trace!("{}: timer thread exiting", name);
}

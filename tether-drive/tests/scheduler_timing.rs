//! Timing behaviour of the fixed-rate scheduler
//!
//! Firings can never come early, so every check is "at or after the ideal
//! instant, and not later than a generous slack".

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tether_drive::error::Error;
use tether_drive::{Cadence, PeriodicScheduler};

const INTERVAL: Duration = Duration::from_millis(50);
const SLACK: Duration = Duration::from_millis(35);

type Log = Arc<Mutex<Vec<Instant>>>;

fn recording_scheduler<F>(mut body: F) -> (PeriodicScheduler, Log)
where
    F: FnMut(usize) -> tether_drive::Result<()> + Send + 'static,
{
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let task_log = Arc::clone(&log);
    let scheduler = PeriodicScheduler::new("timing", INTERVAL, Cadence::Repeating, move || {
        let n = {
            let mut log = task_log.lock();
            log.push(Instant::now());
            log.len()
        };
        body(n)
    })
    .unwrap();
    (scheduler, log)
}

fn assert_on_grid(t0: Instant, firings: &[Instant]) {
    for (i, at) in firings.iter().enumerate() {
        let ideal = t0 + INTERVAL * (i as u32 + 1);
        assert!(*at >= ideal, "firing {} came {:?} early", i + 1, ideal - *at);
        assert!(
            *at - ideal < SLACK,
            "firing {} drifted by {:?}",
            i + 1,
            *at - ideal
        );
    }
}

#[test]
fn test_fixed_rate_independent_of_task_duration() {
    // 30 ms of work per 50 ms interval: fixed-delay would land firing 6 at 480 ms
    let (scheduler, log) = recording_scheduler(|_| {
        thread::sleep(Duration::from_millis(30));
        Ok(())
    });

    let t0 = Instant::now();
    assert!(scheduler.start());
    thread::sleep(INTERVAL * 6 + Duration::from_millis(40));
    scheduler.stop_and_wait();

    let firings = log.lock().clone();
    assert!(firings.len() >= 6, "only {} firings", firings.len());
    assert_on_grid(t0, &firings[..6]);
}

#[test]
fn test_failing_firing_keeps_cadence() {
    let (scheduler, log) = recording_scheduler(|n| {
        if n == 2 {
            Err(Error::Other("sensor glitch".to_string()))
        } else {
            Ok(())
        }
    });

    let t0 = Instant::now();
    scheduler.start();
    thread::sleep(INTERVAL * 4 + Duration::from_millis(40));
    scheduler.stop_and_wait();

    let firings = log.lock().clone();
    assert!(firings.len() >= 4);
    assert_on_grid(t0, &firings[..4]);

    let stats = scheduler.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.fired, firings.len() as u64);
}

#[test]
fn test_stop_is_idempotent_and_final() {
    let (scheduler, log) = recording_scheduler(|_| Ok(()));

    scheduler.start();
    thread::sleep(INTERVAL + Duration::from_millis(20));
    assert!(scheduler.stop());
    assert!(!scheduler.stop());

    let state = scheduler.state();
    assert!(!state.running);
    assert_eq!(state.next_deadline, None);

    let count = log.lock().len();
    thread::sleep(INTERVAL * 3);
    assert_eq!(log.lock().len(), count);
}

#[test]
fn test_restart_anchors_at_new_start() {
    let (scheduler, log) = recording_scheduler(|_| Ok(()));

    scheduler.start();
    thread::sleep(INTERVAL * 2 + Duration::from_millis(30));
    scheduler.stop_and_wait();
    // Land the restart well off the old 50 ms grid
    thread::sleep(Duration::from_millis(15));
    let before_restart = log.lock().len();

    let t1 = Instant::now();
    assert!(scheduler.start());
    thread::sleep(INTERVAL * 2 + Duration::from_millis(40));
    scheduler.stop_and_wait();

    let firings = log.lock()[before_restart..].to_vec();
    assert!(firings.len() >= 2);
    assert_on_grid(t1, &firings[..2]);
}

#[test]
fn test_overrun_catches_up_back_to_back() {
    // First firing overruns by two intervals; the next two are already due
    let (scheduler, log) = recording_scheduler(|n| {
        if n == 1 {
            thread::sleep(INTERVAL * 2 + Duration::from_millis(10));
        }
        Ok(())
    });

    let t0 = Instant::now();
    scheduler.start();
    thread::sleep(INTERVAL * 5 + Duration::from_millis(40));
    scheduler.stop_and_wait();

    let firings = log.lock().clone();
    assert!(firings.len() >= 5);
    // Firings 2 and 3 run immediately after the overrun, 4 and 5 are back on the grid
    assert!(firings[2] - firings[1] < Duration::from_millis(10));
    assert!(firings[3] >= t0 + INTERVAL * 4);
    assert!(firings[4] >= t0 + INTERVAL * 5);
    assert!(firings[4] - (t0 + INTERVAL * 5) < SLACK);
}

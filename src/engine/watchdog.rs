//! Periodic wake-up for states with periodic timing.

use super::idling::WaitHandle;
use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, dispatcher, Dispatch};

/// Ticks the wait handle every `period` until dropped.
///
/// Each tick takes the reentry guard with `try_lock`. If the guard is held
/// (a previous tick is still being delivered, or the engine is disarming
/// the watchdog) the tick is discarded and counted as missed.
pub(crate) struct Watchdog {
    _disarm: Sender<()>,
}

impl Watchdog {
    pub(crate) fn arm(
        machine: &str,
        period: Duration,
        wait: Arc<WaitHandle>,
        reentry: Arc<Mutex<()>>,
        missed: Arc<AtomicU64>,
    ) -> io::Result<Self> {
        let (disarm, disarmed) = bounded::<()>(0);
        let machine = machine.to_string();
        // Log into the arming thread's subscriber.
        let dispatch = dispatcher::get_default(Dispatch::clone);

        thread::Builder::new()
            .name(format!("{machine}-watchdog"))
            .spawn(move || {
                dispatcher::with_default(&dispatch, || loop {
                    match disarmed.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => match reentry.try_lock() {
                            Some(_delivering) => {
                                wait.tick();
                            }
                            None => {
                                missed.fetch_add(1, Ordering::Relaxed);
                                debug!(machine = %machine, "Watchdog tick missed");
                            }
                        },
                        _ => break,
                    }
                })
            })?;

        Ok(Self { _disarm: disarm })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::WakeReason;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn ticks_reach_parked_worker() {
        let wait = Arc::new(WaitHandle::new());
        let _watchdog = Watchdog::arm(
            "test",
            Duration::from_millis(15),
            Arc::clone(&wait),
            Arc::new(Mutex::new(())),
            Arc::new(AtomicU64::new(0)),
        )
        .unwrap();

        let pending = AtomicBool::new(false);
        let reason = wait.wait(|| pending.load(Ordering::SeqCst));
        assert_eq!(reason, WakeReason::Tick);
    }

    #[test]
    fn held_guard_counts_missed_ticks() {
        let wait = Arc::new(WaitHandle::new());
        let reentry = Arc::new(Mutex::new(()));
        let missed = Arc::new(AtomicU64::new(0));

        let guard = reentry.lock();
        let watchdog = Watchdog::arm(
            "test",
            Duration::from_millis(15),
            wait,
            Arc::clone(&reentry),
            Arc::clone(&missed),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(120));
        drop(guard);
        drop(watchdog);

        assert!(missed.load(Ordering::Relaxed) >= 2);
    }

    #[test]
    fn dropping_stops_ticks() {
        let wait = Arc::new(WaitHandle::new());
        let missed = Arc::new(AtomicU64::new(0));
        let reentry = Arc::new(Mutex::new(()));
        let _held = reentry.lock();

        let watchdog = Watchdog::arm(
            "test",
            Duration::from_millis(15),
            wait,
            Arc::clone(&reentry),
            Arc::clone(&missed),
        )
        .unwrap();
        drop(watchdog);

        thread::sleep(Duration::from_millis(30));
        let after_drop = missed.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(80));
        assert_eq!(missed.load(Ordering::Relaxed), after_drop);
    }
}

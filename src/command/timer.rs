//! One-shot expiry timer used for command timeouts.

use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use std::io;
use std::thread;
use std::time::Duration;

/// Runs a callback once after a delay unless dropped first.
///
/// The timer thread waits on a channel; dropping the timer disconnects it
/// and the thread exits without running the callback. Dropping never blocks.
pub(crate) struct OneShotTimer {
    _disarm: Sender<()>,
}

impl OneShotTimer {
    pub(crate) fn arm<F>(name: String, delay: Duration, on_expiry: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (disarm, disarmed) = bounded::<()>(0);

        thread::Builder::new().name(name).spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = disarmed.recv_timeout(delay) {
                on_expiry();
            }
        })?;

        Ok(Self { _disarm: disarm })
    }
}

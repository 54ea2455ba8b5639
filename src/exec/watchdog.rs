/// Deadline enforcement for supervised blocks
///
/// The supervised block runs on a worker thread while the calling thread
/// waits on a channel with a timeout. Which side "wins" is decided by a single
/// compare-exchange on a shared state, so a deadline expiring at the same
/// instant the block returns yields exactly one outcome.
use crate::exec::unwind::{raise, Interrupt};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RUNNING: u8 = 0;
const FINISHED: u8 = 1;
const TIMED_OUT: u8 = 2;

/// Shared deadline state of one scope invocation
#[derive(Clone, Debug)]
pub(crate) struct Deadline {
    state: Arc<AtomicU8>,
    started: Instant,
    timeout: Duration,
}

impl Deadline {
    pub(crate) fn arm(timeout: Duration) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(RUNNING)),
            started: Instant::now(),
            timeout,
        }
    }

    /// Called by the worker once the block returned or unwound.
    /// False when the deadline already expired: the outcome must be dropped.
    pub(crate) fn finish(&self) -> bool {
        self.state
            .compare_exchange(RUNNING, FINISHED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Called by the watchdog when the wait timed out.
    /// False when the block finished first.
    pub(crate) fn expire(&self) -> bool {
        self.state
            .compare_exchange(RUNNING, TIMED_OUT, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.state.load(Ordering::SeqCst) == TIMED_OUT
    }

    /// Unwind the supervised code if the deadline expired
    pub(crate) fn checkpoint(&self) {
        if self.is_expired() {
            raise(Interrupt::Cancelled);
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.started.elapsed())
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// What the watchdog observed
#[derive(Debug)]
pub(crate) enum Wake<T> {
    /// The worker finished in time and sent its outcome
    Finished(T),
    /// The deadline expired; the worker is abandoned
    Expired,
    /// The worker went away without reporting
    Vanished,
}

/// Wait for the worker's outcome until the deadline
pub(crate) fn wait<T>(rx: &Receiver<T>, deadline: &Deadline) -> Wake<T> {
    match rx.recv_timeout(deadline.remaining()) {
        Ok(outcome) => Wake::Finished(outcome),
        Err(RecvTimeoutError::Timeout) => {
            if deadline.expire() {
                return Wake::Expired;
            }
            // The worker finished between the timeout and the expiry attempt,
            // its outcome is already on its way.
            match rx.recv() {
                Ok(outcome) => Wake::Finished(outcome),
                Err(_) => Wake::Vanished,
            }
        }
        Err(RecvTimeoutError::Disconnected) => Wake::Vanished,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_single_winner() {
        let deadline = Deadline::arm(Duration::from_secs(1));
        assert!(deadline.finish());
        assert!(!deadline.expire());
        assert!(!deadline.is_expired());

        let deadline = Deadline::arm(Duration::from_secs(1));
        assert!(deadline.expire());
        assert!(!deadline.finish());
        assert!(deadline.is_expired());
    }

    #[test]
    fn test_wait_finished() {
        let deadline = Deadline::arm(Duration::from_secs(5));
        let (tx, rx) = crossbeam_channel::bounded(1);
        let worker = deadline.clone();
        thread::spawn(move || {
            if worker.finish() {
                let _ = tx.send(7);
            }
        });
        assert!(matches!(wait(&rx, &deadline), Wake::Finished(7)));
    }

    #[test]
    fn test_wait_expired() {
        let deadline = Deadline::arm(Duration::from_millis(50));
        let (_tx, rx) = crossbeam_channel::bounded::<u8>(1);
        let start = Instant::now();
        assert!(matches!(wait(&rx, &deadline), Wake::Expired));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(deadline.is_expired());
    }

    #[test]
    fn test_wait_vanished() {
        let deadline = Deadline::arm(Duration::from_secs(5));
        let (tx, rx) = crossbeam_channel::bounded::<u8>(1);
        drop(tx);
        assert!(matches!(wait(&rx, &deadline), Wake::Vanished));
    }

    #[test]
    fn test_remaining_saturates() {
        let deadline = Deadline::arm(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(5));
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }
}

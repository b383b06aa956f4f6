use std::io::{Error, ErrorKind};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::common;
use crate::impl_display_by_debug;

/// What `signal` leaves behind, fixed when the event is created.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResetMode {
    /// The signal persists until an explicit [`Event::reset`], and every
    /// waiter blocked at signal time gets through.
    Manual,
    /// A successful wait consumes the signal on its way out, and each
    /// signal lets at most one waiter through.
    Auto,
}

impl_display_by_debug!(ResetMode);

/// A boolean signal with a reset policy, guarded by its own mutex and
/// condition variable.
///
/// Construction is `const`, so events can live in statics as well as on
/// the stack. Tearing one down mid-wait is unrepresentable, every wait
/// borrows the event.
#[derive(Debug)]
pub struct Event {
    mode: ResetMode,
    pub(crate) signaled: Mutex<bool>,
    pub(crate) cond: Condvar,
}

impl Event {
    /// Creates an event with the given reset policy and initial state.
    #[must_use]
    pub const fn new(mode: ResetMode, initially_set: bool) -> Self {
        Self {
            mode,
            signaled: Mutex::new(initially_set),
            cond: Condvar::new(),
        }
    }

    /// The reset policy this event was created with.
    #[must_use]
    pub const fn mode(&self) -> ResetMode {
        self.mode
    }

    /// Sets the signal.
    ///
    /// Wakes every waiter of a manual-reset event, but only one waiter of
    /// an auto-reset event, so at most one consumer claims an auto signal
    /// even before it has had a chance to clear the flag.
    pub fn signal(&self) {
        let mut signaled = common::lock(&self.signaled);
        *signaled = true;
        match self.mode {
            ResetMode::Manual => self.cond.notify_all(),
            ResetMode::Auto => self.cond.notify_one(),
        };
    }

    /// Clears the signal without waking anyone.
    pub fn reset(&self) {
        *common::lock(&self.signaled) = false;
    }

    /// Signals, then immediately resets.
    ///
    /// The two steps are not atomic for observers. A thread not already
    /// blocked in a wait at the instant of the wakeup misses the pulse
    /// entirely, which is the documented behavior of this primitive
    /// family, not a race to fix.
    pub fn pulse(&self) {
        self.signal();
        self.reset();
    }

    /// Consumes the signal if it is currently set, without blocking.
    ///
    /// Returns whether the signal was set. An auto-reset event is cleared
    /// on the way out exactly as a successful [`wait`](Self::wait) would
    /// clear it.
    #[must_use]
    pub fn try_wait(&self) -> bool {
        let mut signaled = common::lock(&self.signaled);
        if *signaled {
            if ResetMode::Auto == self.mode {
                *signaled = false;
            }
            return true;
        }
        false
    }

    /// Blocks until the signal is set, consuming it if this event is
    /// auto-reset. `None` waits indefinitely.
    ///
    /// The flag is re-examined under the lock after every wake, timed or
    /// not, so a spurious wake never produces a false success. An event
    /// that is already signaled succeeds even if `deadline` has passed.
    ///
    /// # Errors
    /// `ErrorKind::TimedOut` if `deadline` goes by with the event unset.
    pub fn wait(&self, deadline: Option<Instant>) -> std::io::Result<()> {
        let mut signaled = common::lock(&self.signaled);
        loop {
            if *signaled {
                if ResetMode::Auto == self.mode {
                    *signaled = false;
                }
                return Ok(());
            }
            match deadline {
                None => signaled = common::wait(&self.cond, signaled),
                Some(deadline) => {
                    let left = common::remaining(deadline);
                    if left.is_zero() {
                        return Err(Error::new(ErrorKind::TimedOut, "wait timeout"));
                    }
                    signaled = common::wait_timeout(&self.cond, signaled, left);
                }
            }
        }
    }

    /// Like [`wait`](Self::wait) with a deadline of now plus `dur`. A
    /// duration too large for the clock to represent waits indefinitely.
    ///
    /// # Errors
    /// `ErrorKind::TimedOut` if `dur` elapses with the event unset.
    pub fn wait_timeout(&self, dur: Duration) -> std::io::Result<()> {
        self.wait(Instant::now().checked_add(dur))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_reset_stays_signaled() -> std::io::Result<()> {
        let event = Event::new(ResetMode::Manual, false);
        event.signal();
        event.wait(None)?;
        event.wait(Some(Instant::now()))?;
        assert!(event.try_wait());
        event.reset();
        assert!(!event.try_wait());
        Ok(())
    }

    #[test]
    fn auto_reset_consumes_exactly_once() -> std::io::Result<()> {
        let event = Event::new(ResetMode::Auto, true);
        event.wait(None)?;
        assert!(!event.try_wait());
        event.signal();
        assert!(event.try_wait());
        assert!(!event.try_wait());
        Ok(())
    }

    #[test]
    fn wait_times_out_at_the_deadline_not_before() {
        let event = Event::new(ResetMode::Manual, false);
        let start = Instant::now();
        let err = event
            .wait_timeout(Duration::from_millis(30))
            .expect_err("never signaled");
        assert_eq!(ErrorKind::TimedOut, err.kind());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn pulse_leaves_no_state_behind() {
        let event = Event::new(ResetMode::Manual, false);
        event.pulse();
        assert!(!event.try_wait());
        let err = event.wait(Some(Instant::now())).expect_err("pulse is transient");
        assert_eq!(ErrorKind::TimedOut, err.kind());
    }

    #[test]
    fn signal_wakes_a_blocked_waiter() -> std::io::Result<()> {
        let event = Event::new(ResetMode::Manual, false);
        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| event.wait_timeout(Duration::from_secs(10)));
            std::thread::sleep(Duration::from_millis(50));
            event.signal();
            waiter.join().expect("waiter panicked")
        })?;
        event.wait(Some(Instant::now()))
    }

    #[test]
    fn reset_mode_displays_like_debug() {
        assert_eq!("Auto", ResetMode::Auto.to_string());
        assert_eq!("Manual", format!("{}", ResetMode::Manual));
    }
}

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error;

/// Logging and derive helper macros.
pub(crate) mod macros;

/// Time left until `deadline`, zero once it has passed.
pub(crate) fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Locks `mutex`. A poisoned lock means another thread panicked while
/// holding it, which is fatal here.
#[track_caller]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => fatal("mutex poisoned"),
    }
}

/// Waits on `cond`, giving up `guard` while parked and holding it again on
/// return.
#[track_caller]
pub(crate) fn wait<'m, T>(cond: &Condvar, guard: MutexGuard<'m, T>) -> MutexGuard<'m, T> {
    match cond.wait(guard) {
        Ok(guard) => guard,
        Err(_) => fatal("condvar wait failed"),
    }
}

/// Timed variant of [`wait`]. Callers re-check their condition and the
/// clock after every wake, so the timeout flag is not returned.
#[track_caller]
pub(crate) fn wait_timeout<'m, T>(
    cond: &Condvar,
    guard: MutexGuard<'m, T>,
    dur: Duration,
) -> MutexGuard<'m, T> {
    match cond.wait_timeout(guard, dur) {
        Ok((guard, _)) => guard,
        Err(_) => fatal("condvar wait failed"),
    }
}

/// The synchronization substrate itself is broken. Any result computed past
/// this point could carry a silent data race, so log where it happened and
/// terminate the process.
#[cold]
#[track_caller]
pub(crate) fn fatal(what: &str) -> ! {
    let location = std::panic::Location::caller();
    error!("{location}: {what}");
    eprintln!("{location}: {what}");
    std::process::abort()
}

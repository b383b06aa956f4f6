use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::common;
use crate::event::Event;

/// Bookkeeping for one spawned waiter. Both flags live under the
/// coordinator's mutex.
#[derive(Debug, Default, Copy, Clone)]
pub(crate) struct WaiterFlags {
    /// The waiter stopped watching its event, because it observed the
    /// signal or because it was canceled.
    pub(crate) done: bool,
    /// The orchestrator asked the waiter to stop without a signal.
    pub(crate) canceled: bool,
}

pub(crate) type FlagsGuard<'c> = MutexGuard<'c, Vec<WaiterFlags>>;

/// The rendezvous the orchestrator blocks on while the waiters watch
/// their events, one flags slot per waited event.
///
/// Lock nesting rule: a thread that wants this mutex together with an
/// event's mutex takes the event's first. The orchestrator side keeps to
/// it by never touching an event while holding the flags.
#[derive(Debug)]
pub(crate) struct Coordinator {
    flags: Mutex<Vec<WaiterFlags>>,
    cond: Condvar,
}

impl Coordinator {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            flags: Mutex::new(vec![WaiterFlags::default(); count]),
            cond: Condvar::new(),
        }
    }

    /// Locks the flags for inspection.
    #[track_caller]
    pub(crate) fn flags(&self) -> FlagsGuard<'_> {
        common::lock(&self.flags)
    }

    /// Parks the orchestrator until some waiter reports.
    #[track_caller]
    pub(crate) fn wait<'c>(&self, guard: FlagsGuard<'c>) -> FlagsGuard<'c> {
        common::wait(&self.cond, guard)
    }

    /// Timed variant of [`wait`](Self::wait).
    #[track_caller]
    pub(crate) fn wait_timeout<'c>(&self, guard: FlagsGuard<'c>, dur: Duration) -> FlagsGuard<'c> {
        common::wait_timeout(&self.cond, guard, dur)
    }

    /// Reports that the waiter in `index` has stopped watching, and wakes
    /// the orchestrator.
    #[track_caller]
    pub(crate) fn mark_done(&self, index: usize) {
        let mut flags = common::lock(&self.flags);
        flags[index].done = true;
        self.cond.notify_one();
    }

    /// Samples the cancel flag for `index`. The watcher calls this with
    /// its event's mutex held, so a cancel can never slip between the
    /// sample and the next condvar wait.
    #[track_caller]
    pub(crate) fn is_canceled(&self, index: usize) -> bool {
        common::lock(&self.flags)[index].canceled
    }

    /// Asks the waiter in `index` to stop, reusing its event's own
    /// broadcast as the wakeup channel even though the event is not
    /// becoming signaled.
    ///
    /// The flag is written with the event's mutex held, the same order
    /// the watcher samples it under, and the broadcast goes out before
    /// that mutex is released.
    #[track_caller]
    pub(crate) fn cancel(&self, event: &Event, index: usize) {
        let guard = common::lock(&event.signaled);
        common::lock(&self.flags)[index].canceled = true;
        event.cond.notify_all();
        drop(guard);
    }
}

/// Body of one spawned waiter: parks on `event`'s condvar until the event
/// is signaled or this slot is canceled, then reports done. The signal is
/// observed, never consumed; consuming is the orchestrator's decision.
pub(crate) fn watch_event(event: &Event, coordinator: &Coordinator, index: usize) {
    let mut signaled = common::lock(&event.signaled);
    while !*signaled && !coordinator.is_canceled(index) {
        signaled = common::wait(&event.cond, signaled);
    }
    drop(signaled);
    coordinator.mark_done(index);
}

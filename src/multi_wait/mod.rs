use std::io::{Error, ErrorKind};
use std::thread::{Builder, ScopedJoinHandle};
use std::time::Instant;

use crate::common;
use crate::event::{Event, ResetMode};
use crate::{trace, warn};

use self::waiter::{watch_event, Coordinator};

mod waiter;

/// What one spawn-watch-decide round concluded.
#[derive(Debug)]
enum RoundOutcome {
    /// The wait is satisfied, with the winning index for wait-any.
    Done(Option<usize>),
    /// Wait-all saw every waiter report done, but the re-check caught a
    /// signal stolen in between. Run a fresh round.
    Restart,
}

/// Waits on a whole set of events at once.
///
/// With `wait_all == false`, returns as soon as any event in `events` is
/// signaled, reporting the winning index (`Ok(Some(i))`) and consuming
/// that event's signal if it is auto-reset. When several events are
/// signaled concurrently the winner is the lowest index already reported
/// at scan time, not the first signaled in real time, and the consumed
/// signal is cleared without re-verifying it is still set at that
/// instant. A third party racing on the same event may have claimed it
/// first, in which case the clear is a no-op and the index is reported
/// anyway; that residual race is inherent to the primitive.
///
/// With `wait_all == true`, returns `Ok(None)` only once every event was
/// observed signaled at the same instant, confirmed under all the event
/// locks (taken in index order) after each per-event watcher reported in.
/// If a signal is stolen between a watcher's report and that re-check,
/// the round is discarded and the watch starts over. The retry has no
/// iteration cap, it is bounded by the forward progress of whoever keeps
/// stealing the signals.
///
/// An empty set succeeds immediately with `Ok(None)`. A single-event set
/// degrades to [`Event::wait`] with no thread spawned. Otherwise one
/// watcher thread per event runs for the duration of the call, and every
/// watcher is canceled and joined before this returns, on success,
/// timeout, and error paths alike.
///
/// # Errors
/// - `ErrorKind::TimedOut` if `deadline` passes with the wait undecided.
///   Unlike [`Event::wait`], a deadline that has already passed can time
///   out a multi-event set even if every event is currently signaled: the
///   decision needs the watchers to report first.
/// - `ErrorKind::InvalidInput` if `events` names the same event twice.
/// - The `std::io::Error` of a failed watcher spawn, after the watchers
///   already spawned have been unwound.
pub fn wait_multiple(
    events: &[&Event],
    wait_all: bool,
    deadline: Option<Instant>,
) -> std::io::Result<Option<usize>> {
    if events.is_empty() {
        return Ok(None);
    }
    if let [event] = events {
        event.wait(deadline)?;
        return Ok((!wait_all).then_some(0));
    }
    for (index, event) in events.iter().enumerate() {
        if events[..index].iter().any(|prior| std::ptr::eq(*prior, *event)) {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "duplicate event in wait set",
            ));
        }
    }
    loop {
        match run_round(events, wait_all, deadline)? {
            RoundOutcome::Done(index) => return Ok(index),
            RoundOutcome::Restart => {
                trace!("re-check lost a signal, restarting");
            }
        }
    }
}

/// One full round: spawn a watcher per event, park on the coordinator
/// until a decision, then cancel and join whatever is still watching.
fn run_round(
    events: &[&Event],
    wait_all: bool,
    deadline: Option<Instant>,
) -> std::io::Result<RoundOutcome> {
    let coordinator = Coordinator::new(events.len());
    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(events.len());
        for (index, &event) in events.iter().enumerate() {
            let builder = Builder::new().name(format!("event-waiter-{index}"));
            let spawned = builder.spawn_scoped(scope, {
                let coordinator = &coordinator;
                move || watch_event(event, coordinator, index)
            });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    warn!("spawning waiter {index} of {} failed: {err}", events.len());
                    cancel_and_join(events, &coordinator, handles);
                    return Err(err);
                }
            }
        }
        trace!("watching {} events, wait_all = {wait_all}", events.len());
        let decision = watch(events, wait_all, deadline, &coordinator);
        cancel_and_join(events, &coordinator, handles);
        decision
    })
}

/// The WATCHING loop and its per-wake decision, run under the
/// coordinator's lock. The flags are released before any event mutex is
/// touched; the orchestrator never holds the two together.
fn watch(
    events: &[&Event],
    wait_all: bool,
    deadline: Option<Instant>,
    coordinator: &Coordinator,
) -> std::io::Result<RoundOutcome> {
    let mut flags = coordinator.flags();
    loop {
        if wait_all {
            if flags.iter().all(|flag| flag.done) {
                drop(flags);
                return Ok(recheck_and_consume(events));
            }
        } else if let Some(index) = flags.iter().position(|flag| flag.done) {
            drop(flags);
            if ResetMode::Auto == events[index].mode() {
                events[index].reset();
            }
            return Ok(RoundOutcome::Done(Some(index)));
        }
        flags = match deadline {
            None => coordinator.wait(flags),
            Some(deadline) => {
                let left = common::remaining(deadline);
                if left.is_zero() {
                    return Err(Error::new(ErrorKind::TimedOut, "wait timeout"));
                }
                coordinator.wait_timeout(flags, left)
            }
        };
    }
}

/// The wait-all commit point. Every watcher has reported, so the flags
/// are frozen and the coordinator's lock is not needed; what is not
/// frozen is the events themselves, which a watcher only ever observed
/// under its own lock. Lock them all in index order, confirm each one is
/// still signaled, and only then consume the auto-reset ones, inside the
/// held locks. Unlocking runs in the same index order.
fn recheck_and_consume(events: &[&Event]) -> RoundOutcome {
    let mut guards: Vec<_> = events
        .iter()
        .map(|event| common::lock(&event.signaled))
        .collect();
    if guards.iter().all(|signaled| **signaled) {
        for (event, signaled) in events.iter().zip(guards.iter_mut()) {
            if ResetMode::Auto == event.mode() {
                **signaled = false;
            }
        }
        RoundOutcome::Done(None)
    } else {
        RoundOutcome::Restart
    }
}

/// CLEANUP: cancel every watcher that has not reported done, then join
/// all of them. The pending set is a snapshot, the flags are released
/// again before any event mutex is taken, and no lock is held across a
/// join.
fn cancel_and_join(
    events: &[&Event],
    coordinator: &Coordinator,
    handles: Vec<ScopedJoinHandle<'_, ()>>,
) {
    let pending: Vec<usize> = coordinator
        .flags()
        .iter()
        .enumerate()
        .filter(|(_, flag)| !flag.done)
        .map(|(index, _)| index)
        .collect();
    for index in pending {
        coordinator.cancel(events[index], index);
    }
    for handle in handles {
        if handle.join().is_err() {
            common::fatal("waiter thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn hang_guard() -> Option<Instant> {
        Instant::now().checked_add(Duration::from_secs(10))
    }

    #[test]
    fn empty_set_succeeds_immediately() -> std::io::Result<()> {
        assert_eq!(None, wait_multiple(&[], true, None)?);
        assert_eq!(None, wait_multiple(&[], false, Some(Instant::now()))?);
        Ok(())
    }

    #[test]
    fn single_event_set_degrades_to_a_single_wait() -> std::io::Result<()> {
        let event = Event::new(ResetMode::Auto, true);
        assert_eq!(Some(0), wait_multiple(&[&event], false, None)?);
        assert!(!event.try_wait(), "the winning auto signal is consumed");

        event.signal();
        assert_eq!(None, wait_multiple(&[&event], true, None)?);
        Ok(())
    }

    #[test]
    fn duplicate_events_are_rejected_up_front() {
        let first = Event::new(ResetMode::Manual, true);
        let second = Event::new(ResetMode::Manual, true);
        let err = wait_multiple(&[&first, &second, &first], false, None)
            .expect_err("a duplicate reference cannot be waited on");
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn wait_any_reports_and_consumes_the_signaled_event() -> std::io::Result<()> {
        let events = [
            Event::new(ResetMode::Auto, false),
            Event::new(ResetMode::Auto, false),
            Event::new(ResetMode::Auto, false),
        ];
        std::thread::scope(|scope| {
            _ = scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(30));
                events[1].signal();
            });
            let index = wait_multiple(&[&events[0], &events[1], &events[2]], false, hang_guard())?;
            assert_eq!(Some(1), index);
            Ok::<(), Error>(())
        })?;
        assert!(!events[0].try_wait());
        assert!(!events[1].try_wait(), "the winner is auto-cleared");
        assert!(!events[2].try_wait());
        Ok(())
    }

    #[test]
    fn wait_all_needs_every_event_and_a_timeout_consumes_nothing() -> std::io::Result<()> {
        let flag = Event::new(ResetMode::Manual, false);
        let token = Event::new(ResetMode::Auto, false);
        flag.signal();

        let deadline = Instant::now().checked_add(Duration::from_millis(50));
        let err = wait_multiple(&[&flag, &token], true, deadline)
            .expect_err("one event short of all");
        assert_eq!(ErrorKind::TimedOut, err.kind());
        assert!(flag.try_wait(), "the failed wait must not consume the signal");

        token.signal();
        assert_eq!(None, wait_multiple(&[&flag, &token], true, hang_guard())?);
        assert!(flag.try_wait(), "manual members stay signaled");
        assert!(!token.try_wait(), "auto members are consumed");
        Ok(())
    }
}

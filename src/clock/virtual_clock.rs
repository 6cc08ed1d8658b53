//! The virtual clock: simulated time plus a shared work queue.
//!
//! The clock owns the current simulated instant and a priority queue of
//! pending items, both guarded by a single mutex with one condition variable
//! signalled on arrival. Application threads enqueue work and sleep; a
//! driver thread advances time through the wait operations. Items fire in
//! non-decreasing fire-time order, and the clock moves exactly to the fire
//! time of the item being fired, never beyond it.
//!
//! Every internal queue wait carries a real-time ceiling so a misbehaving
//! test fails fast instead of hanging: an empty queue cannot block a driver
//! forever, and a predicate that can never turn true produces an error.

use crate::clock::queue::{QueueEntry, WorkQueue};
use crate::error::SchedulerError;
use crate::item::{SleepItem, WorkItem};
use crate::types::time::duration_to_millis_ceil;
use crate::types::{AssociateId, SimTime};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default upper bound on real time spent blocked waiting for queue
/// arrivals inside a single drive operation.
pub const DEFAULT_REAL_WAIT_CEILING: Duration = Duration::from_millis(5_000);

/// Default real-time slice between predicate re-checks in the predicate
/// waits.
pub const DEFAULT_POLL_GRANULARITY: Duration = Duration::from_millis(100);

/// Time source abstraction shared between production and simulated clocks.
///
/// Consumers that accept an injected `Arc<dyn TimeSource>` can run against
/// a [`WallClock`] in production and a [`VirtualClock`] under test without
/// code changes.
pub trait TimeSource: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SimTime;
}

/// Wall clock time source for production use.
///
/// Reads are real elapsed milliseconds since this source was created.
#[derive(Debug)]
pub struct WallClock {
    epoch: Instant,
}

impl WallClock {
    /// Creates a wall clock whose epoch is the moment of creation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for WallClock {
    fn now(&self) -> SimTime {
        let millis = self.epoch.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;
        SimTime::from_millis(millis)
    }
}

/// Configuration for a [`VirtualClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    /// The instant simulated time starts at.
    pub start: SimTime,
    /// Upper bound on real time spent blocked on an empty or stalled queue
    /// inside a single drive operation.
    pub real_wait_ceiling: Duration,
    /// Real-time slice between predicate re-checks in [`wait_until`] and
    /// [`wait_until_within`].
    ///
    /// [`wait_until`]: VirtualClock::wait_until
    /// [`wait_until_within`]: VirtualClock::wait_until_within
    pub poll_granularity: Duration,
}

impl ClockConfig {
    /// Replaces the starting instant.
    #[must_use]
    pub fn with_start(mut self, start: SimTime) -> Self {
        self.start = start;
        self
    }

    /// Replaces the real-time wait ceiling.
    #[must_use]
    pub fn with_real_wait_ceiling(mut self, ceiling: Duration) -> Self {
        self.real_wait_ceiling = ceiling;
        self
    }

    /// Replaces the predicate poll granularity.
    #[must_use]
    pub fn with_poll_granularity(mut self, granularity: Duration) -> Self {
        self.poll_granularity = granularity;
        self
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            start: SimTime::ZERO,
            real_wait_ceiling: DEFAULT_REAL_WAIT_CEILING,
            poll_granularity: DEFAULT_POLL_GRANULARITY,
        }
    }
}

/// Everything guarded by the clock's single lock.
struct ClockState {
    now: SimTime,
    queue: WorkQueue,
    destroyed: bool,
}

/// Outcome of one bounded servicing step.
enum Step {
    /// A live item was fired (and re-queued if periodic).
    Fired,
    /// The queue's front item fires beyond the requested bound.
    Beyond,
    /// The queue stayed empty for the whole real-time window.
    Empty,
    /// The clock was destroyed.
    Destroyed,
}

/// Simulated-time engine for deterministic scheduling tests.
///
/// Time only advances when a driver calls one of the wait operations, so a
/// schedule replays identically on every run. Share the clock behind an
/// [`Arc`]: every operation takes `&self`.
///
/// # Example
///
/// ```
/// use lockstep::{ClockConfig, VirtualClock};
/// use std::time::Duration;
///
/// let clock = VirtualClock::with_config(
///     ClockConfig::default().with_real_wait_ceiling(Duration::from_millis(50)),
/// );
/// assert_eq!(clock.now().as_millis(), 0);
///
/// // With nothing queued, the driver waits briefly for arrivals and then
/// // jumps straight to the end of the window.
/// clock.wait_for(Duration::from_millis(300)).unwrap();
/// assert_eq!(clock.now().as_millis(), 300);
/// ```
pub struct VirtualClock {
    state: Mutex<ClockState>,
    /// Signalled on enqueue and on destroy.
    arrivals: Condvar,
    config: ClockConfig,
}

impl VirtualClock {
    /// Creates a clock starting at time zero with default bounds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClockConfig::default())
    }

    /// Creates a clock starting at the given instant.
    #[must_use]
    pub fn starting_at(start: SimTime) -> Self {
        Self::with_config(ClockConfig::default().with_start(start))
    }

    /// Creates a clock with explicit configuration.
    #[must_use]
    pub fn with_config(config: ClockConfig) -> Self {
        Self {
            state: Mutex::new(ClockState {
                now: config.start,
                queue: WorkQueue::new(),
                destroyed: false,
            }),
            arrivals: Condvar::new(),
            config,
        }
    }

    /// Returns this clock's configuration.
    #[must_use]
    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Returns the current simulated time.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.state.lock().now
    }

    /// Returns true once [`destroy`](Self::destroy) has run.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Inserts an item into the queue and wakes blocked drivers.
    ///
    /// The item's fire time is snapshotted as its ordering key. Items whose
    /// fire time is not in the future are serviced by the next drive without
    /// moving the clock backwards.
    pub fn enqueue(&self, item: Arc<dyn WorkItem>) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(SchedulerError::ClockDestroyed);
        }
        let fire_at = item.fire_time();
        state.queue.push(item);
        let queue_len = state.queue.len();
        drop(state);
        trace!(%fire_at, queue_len, "item enqueued");
        self.arrivals.notify_all();
        Ok(())
    }

    /// Builds and enqueues an item in one atomic step.
    ///
    /// The fire time handed to `build` is `now + max(1ms, delay)`, computed
    /// under the clock lock so no driver can advance past it first.
    pub(crate) fn arm<I, F>(&self, delay: Duration, build: F) -> Result<Arc<I>, SchedulerError>
    where
        I: WorkItem + 'static,
        F: FnOnce(SimTime) -> I,
    {
        let millis = duration_to_millis_ceil(delay).max(1);
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(SchedulerError::ClockDestroyed);
        }
        let fire_at = state.now.saturating_add_millis(millis);
        let item = Arc::new(build(fire_at));
        state.queue.push(item.clone());
        let queue_len = state.queue.len();
        drop(state);
        trace!(%fire_at, queue_len, "armed item");
        self.arrivals.notify_all();
        Ok(item)
    }

    /// Blocks the calling thread until simulated time reaches
    /// `now + duration`.
    ///
    /// A zero (or sub-millisecond zero after rounding) duration returns
    /// immediately without queueing anything or moving the clock. The
    /// sleeper parks on a latch private to its queue entry, so any number of
    /// threads can sleep concurrently; none of them holds the clock lock
    /// while parked.
    ///
    /// Returns [`SchedulerError::Interrupted`] when the clock is destroyed
    /// before the wake-up instant is reached, and
    /// [`SchedulerError::ClockDestroyed`] when the clock was already
    /// destroyed at the time of the call.
    pub fn sleep(&self, duration: Duration) -> Result<(), SchedulerError> {
        if duration_to_millis_ceil(duration) == 0 {
            return Ok(());
        }
        let item = self.arm(duration, SleepItem::new)?;
        trace!(fire_at = %item.fire_time(), "sleeper parked");
        item.wait()
    }

    /// Advances simulated time by `duration`, firing every queued item that
    /// falls inside the window, in fire-time order.
    ///
    /// The clock advances exactly to each item's fire time before firing it.
    /// When the queue is empty, the driver blocks up to the configured
    /// real-time ceiling waiting for concurrent arrivals, then jumps
    /// straight to the end of the window; when the front item fires beyond
    /// the window, the jump happens immediately. Either way the clock never
    /// advances past `now + duration`.
    pub fn wait_for(&self, duration: Duration) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(SchedulerError::ClockDestroyed);
        }
        let horizon = state.now + duration;
        trace!(from = %state.now, until = %horizon, "wait_for begins");
        while state.now < horizon {
            if let Some(entry) = state.queue.pop_due(horizon) {
                if entry.item().was_cancelled() {
                    trace!(fire_at = %entry.fire_at(), "dropping cancelled item");
                    continue;
                }
                state = self.fire_and_rearm(state, entry)?;
            } else if !state.queue.is_empty() {
                // Everything queued fires beyond the window.
                state.now = horizon;
            } else {
                let timed_out = self
                    .arrivals
                    .wait_for(&mut state, self.config.real_wait_ceiling)
                    .timed_out();
                if state.destroyed {
                    return Err(SchedulerError::ClockDestroyed);
                }
                if timed_out && state.queue.is_empty() {
                    debug!(until = %horizon, "no arrivals within the real-time ceiling; jumping to window end");
                    state.now = horizon;
                }
            }
        }
        Ok(())
    }

    /// Drives the clock until `condition` turns true.
    ///
    /// The condition is checked before any work is done and again after
    /// every serviced item, without the clock lock held; the call returns
    /// the instant it observes true, leaving later queued items pending.
    /// There is no simulated-time bound: the driver works through the queue
    /// head by head, re-checking the condition at the configured poll
    /// granularity while idle.
    ///
    /// Fails with [`SchedulerError::ConditionTimedOut`] once the real-time
    /// ceiling elapses without the condition turning true. A panicking
    /// condition propagates to the caller.
    pub fn wait_until<P>(&self, mut condition: P) -> Result<(), SchedulerError>
    where
        P: FnMut() -> bool,
    {
        let ceiling = self.config.real_wait_ceiling;
        let started = Instant::now();
        loop {
            if condition() {
                return Ok(());
            }
            if self.is_destroyed() {
                return Err(SchedulerError::ClockDestroyed);
            }
            if started.elapsed() >= ceiling {
                return Err(SchedulerError::ConditionTimedOut { ceiling });
            }
            self.run_one_task(self.config.poll_granularity);
        }
    }

    /// Drives the clock until `condition` turns true, servicing only items
    /// within `bound` of simulated time.
    ///
    /// The moment simulated time would have to exceed `now + bound` — the
    /// front item fires beyond it, or the queue stays empty for a poll
    /// window — the condition is re-checked once and the call fails with
    /// [`SchedulerError::ConditionNeverSatisfied`]. The real-time ceiling
    /// is enforced between steps: a stalled drive fails with
    /// [`SchedulerError::ConditionTimedOut`], but a fire that satisfies
    /// the condition is honored even when it lands on the ceiling.
    pub fn wait_until_within<P>(&self, bound: Duration, mut condition: P) -> Result<(), SchedulerError>
    where
        P: FnMut() -> bool,
    {
        let ceiling = self.config.real_wait_ceiling;
        let started = Instant::now();
        let horizon = { self.state.lock().now } + bound;
        loop {
            // A satisfying fire wins even when it lands on the ceiling, so
            // the condition is always re-checked before giving up.
            if condition() {
                return Ok(());
            }
            if started.elapsed() >= ceiling {
                return Err(SchedulerError::ConditionTimedOut { ceiling });
            }
            match self.step_within(horizon, self.config.poll_granularity) {
                Step::Fired => {}
                Step::Destroyed => return Err(SchedulerError::ClockDestroyed),
                Step::Beyond | Step::Empty => {
                    if condition() {
                        return Ok(());
                    }
                    return Err(SchedulerError::ConditionNeverSatisfied { bound });
                }
            }
        }
    }

    /// Fires exactly one live item, waiting up to `max_real_wait` of real
    /// time for one to arrive. Returns true when an item ran.
    ///
    /// The head of the queue is serviced regardless of how far ahead its
    /// fire time lies; the clock jumps straight to it. Cancelled items
    /// encountered along the way are dropped without firing and do not count
    /// as the serviced item.
    pub fn run_one_task(&self, max_real_wait: Duration) -> bool {
        matches!(
            self.step_within(SimTime::MAX, max_real_wait),
            Step::Fired
        )
    }

    /// Atomically removes every queued item associated with `associate`,
    /// revoking each so that joins and waits on them settle immediately.
    ///
    /// Returns the removed items in fire order. Items belonging to other
    /// groups are untouched.
    pub fn cancel_items(&self, associate: AssociateId) -> Vec<Arc<dyn WorkItem>> {
        let removed = self
            .state
            .lock()
            .queue
            .drain_matching(|item| item.is_associated_with(associate));
        for item in &removed {
            item.revoke();
        }
        if !removed.is_empty() {
            debug!(%associate, count = removed.len(), "cancelled associated items");
        }
        removed
    }

    /// Drops queued items that already report themselves cancelled, without
    /// firing them. Returns the number removed.
    pub fn purge_cancelled(&self) -> usize {
        let removed = self.state.lock().queue.purge_cancelled();
        if removed > 0 {
            trace!(count = removed, "purged cancelled items");
        }
        removed
    }

    /// Tears the clock down: drains the queue, revokes every drained item
    /// (waking all sleepers with an interrupted status), and wakes every
    /// blocked driver. Idempotent.
    pub fn destroy(&self) {
        let drained = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.queue.drain_all()
        };
        for item in &drained {
            item.revoke();
        }
        self.arrivals.notify_all();
        debug!(drained = drained.len(), "clock destroyed");
    }

    /// Number of live queued items. Known-cancelled items are purged before
    /// counting.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        let mut state = self.state.lock();
        state.queue.purge_cancelled();
        state.queue.len()
    }

    /// True when no live items are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue_len() == 0
    }

    /// The earliest live fire time, if anything is queued.
    #[must_use]
    pub fn next_fire_time(&self) -> Option<SimTime> {
        let mut state = self.state.lock();
        state.queue.purge_cancelled();
        state.queue.peek_fire_time()
    }

    pub(crate) fn count_associated(&self, associate: AssociateId) -> usize {
        self.state
            .lock()
            .queue
            .count_matching(|item| item.is_associated_with(associate))
    }

    /// Fires one live item due at or before `bound`, waiting up to
    /// `max_real_wait` for arrivals while the queue is empty.
    fn step_within(&self, bound: SimTime, max_real_wait: Duration) -> Step {
        let deadline = Instant::now().checked_add(max_real_wait);
        let mut state = self.state.lock();
        loop {
            if state.destroyed {
                return Step::Destroyed;
            }
            if let Some(entry) = state.queue.pop_due(bound) {
                if entry.item().was_cancelled() {
                    trace!(fire_at = %entry.fire_at(), "dropping cancelled item");
                    continue;
                }
                return match self.fire_and_rearm(state, entry) {
                    Ok(guard) => {
                        drop(guard);
                        Step::Fired
                    }
                    // The item did fire; destruction surfaces on the next step.
                    Err(_) => Step::Fired,
                };
            }
            if !state.queue.is_empty() {
                return Step::Beyond;
            }
            match deadline {
                Some(at) => {
                    if self.arrivals.wait_until(&mut state, at).timed_out()
                        && state.queue.is_empty()
                    {
                        return Step::Empty;
                    }
                }
                None => self.arrivals.wait(&mut state),
            }
        }
    }

    /// Advances the clock to `entry`'s fire time, fires it with the lock
    /// released, and re-queues it when it re-arms. Returns with the lock
    /// re-acquired, or an error when the clock was destroyed while the
    /// action ran.
    fn fire_and_rearm<'a>(
        &'a self,
        mut state: MutexGuard<'a, ClockState>,
        entry: QueueEntry,
    ) -> Result<MutexGuard<'a, ClockState>, SchedulerError> {
        let fired_at = entry.fire_at();
        let item = entry.into_item();
        state.now = state.now.max(fired_at);
        trace!(at = %state.now, "firing item");
        drop(state);

        item.fire();
        let again = item.rearm(fired_at);

        let mut state = self.state.lock();
        if state.destroyed {
            if again {
                item.revoke();
            }
            return Err(SchedulerError::ClockDestroyed);
        }
        if again {
            trace!(next = %item.fire_time(), "periodic item re-armed");
            state.queue.push(item);
            self.arrivals.notify_all();
        }
        Ok(state)
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> SimTime {
        Self::now(self)
    }
}

impl fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("VirtualClock");
        if let Some(state) = self.state.try_lock() {
            out.field("now", &state.now)
                .field("queue_len", &state.queue.len())
                .field("destroyed", &state.destroyed);
        }
        out.finish_non_exhaustive()
    }
}

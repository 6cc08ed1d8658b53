//! Timer facade: fire-and-forget scheduling against the virtual clock.

use crate::clock::VirtualClock;
use crate::error::SchedulerError;
use crate::facade::TimerApi;
use crate::item::{OneShotItem, PeriodicItem};
use crate::task::{TaskCell, TaskHandle};
use crate::types::AssociateId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Simulated timer.
///
/// Every task scheduled through a timer carries the timer's associate id,
/// so [`cancel_all`](Self::cancel_all) removes exactly this timer's work
/// from the shared clock and nothing else. A cancelled timer is terminated:
/// further scheduling fails with [`SchedulerError::Terminated`].
#[derive(Debug)]
pub struct VirtualTimer {
    clock: Arc<VirtualClock>,
    associate: AssociateId,
    cancelled: AtomicBool,
}

impl VirtualTimer {
    /// Creates a timer on the given clock with a fresh associate id.
    #[must_use]
    pub fn new(clock: Arc<VirtualClock>) -> Self {
        let associate = AssociateId::fresh();
        debug!(%associate, "timer created");
        Self {
            clock,
            associate,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Schedules `action` to run once, `delay` after the current simulated
    /// time. Delays round up to whole milliseconds, with a one-millisecond
    /// minimum so the action always fires strictly after now.
    pub fn schedule_once<A>(
        &self,
        delay: Duration,
        action: A,
    ) -> Result<TaskHandle<()>, SchedulerError>
    where
        A: FnOnce() + Send + 'static,
    {
        self.ensure_live()?;
        let cell = Arc::new(TaskCell::new());
        let cell_for_item = cell.clone();
        let associate = self.associate;
        self.clock.arm(delay, move |fire_at| {
            OneShotItem::new(fire_at, associate, cell_for_item, Box::new(action))
        })?;
        Ok(TaskHandle::from_cell(cell))
    }

    /// Schedules `action` to run repeatedly: first `initial_delay` from now,
    /// then every `period` of simulated time.
    ///
    /// Fails with [`SchedulerError::InvalidPeriod`] when `period` rounds to
    /// zero milliseconds.
    pub fn schedule_fixed_rate<A>(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: A,
    ) -> Result<TaskHandle<()>, SchedulerError>
    where
        A: Fn() + Send + Sync + 'static,
    {
        self.schedule_repeating(initial_delay, period, action)
    }

    /// Schedules `action` with a fixed delay between the end of one run and
    /// the start of the next.
    ///
    /// Actions occupy zero simulated time, so this coincides with
    /// [`schedule_fixed_rate`](Self::schedule_fixed_rate): both re-arm at
    /// the fire time plus the period.
    pub fn schedule_fixed_delay<A>(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: A,
    ) -> Result<TaskHandle<()>, SchedulerError>
    where
        A: Fn() + Send + Sync + 'static,
    {
        self.schedule_repeating(initial_delay, period, action)
    }

    /// Date-based scheduling is not available on a simulated timeline: the
    /// clock has no anchor to wall-clock time, so a `SystemTime` target is
    /// meaningless here. Always fails with [`SchedulerError::Unsupported`].
    pub fn schedule_at<A>(
        &self,
        at: SystemTime,
        action: A,
    ) -> Result<TaskHandle<()>, SchedulerError>
    where
        A: FnOnce() + Send + 'static,
    {
        let _ = (at, action);
        Err(SchedulerError::Unsupported("date-based scheduling"))
    }

    /// Cancels every task scheduled through this timer and terminates the
    /// timer. Returns the number of tasks removed from the queue.
    ///
    /// Idempotent: repeat calls remove nothing and return zero.
    pub fn cancel_all(&self) -> usize {
        self.cancelled.store(true, Ordering::SeqCst);
        self.clock.cancel_items(self.associate).len()
    }

    /// Drops queued tasks that were cancelled individually through their
    /// handles. Returns the number removed.
    pub fn purge(&self) -> usize {
        self.clock.purge_cancelled()
    }

    /// True once [`cancel_all`](Self::cancel_all) has run.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// The id tagged onto everything this timer schedules.
    #[must_use]
    pub fn associate(&self) -> AssociateId {
        self.associate
    }

    fn ensure_live(&self) -> Result<(), SchedulerError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(SchedulerError::Terminated);
        }
        Ok(())
    }

    fn schedule_repeating<A>(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: A,
    ) -> Result<TaskHandle<()>, SchedulerError>
    where
        A: Fn() + Send + Sync + 'static,
    {
        self.ensure_live()?;
        let period = super::period_millis(period)?;
        let cell = Arc::new(TaskCell::new());
        let cell_for_item = cell.clone();
        let associate = self.associate;
        self.clock.arm(initial_delay, move |fire_at| {
            PeriodicItem::new(fire_at, period, associate, cell_for_item, Box::new(action))
        })?;
        Ok(TaskHandle::from_cell(cell))
    }
}

impl TimerApi for VirtualTimer {
    fn schedule_once(
        &self,
        delay: Duration,
        action: Box<dyn FnOnce() + Send>,
    ) -> Result<TaskHandle<()>, SchedulerError> {
        Self::schedule_once(self, delay, action)
    }

    fn schedule_fixed_rate(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: Box<dyn Fn() + Send + Sync>,
    ) -> Result<TaskHandle<()>, SchedulerError> {
        Self::schedule_fixed_rate(self, initial_delay, period, action)
    }

    fn schedule_fixed_delay(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: Box<dyn Fn() + Send + Sync>,
    ) -> Result<TaskHandle<()>, SchedulerError> {
        Self::schedule_fixed_delay(self, initial_delay, period, action)
    }

    fn cancel_all(&self) -> usize {
        Self::cancel_all(self)
    }
}

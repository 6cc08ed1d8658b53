//! Executor facade: result-bearing task scheduling against the virtual clock.

use crate::clock::VirtualClock;
use crate::error::SchedulerError;
use crate::facade::ExecutorApi;
use crate::item::{OneShotItem, PeriodicItem, WorkItem};
use crate::task::{JoinError, TaskCell, TaskHandle};
use crate::types::AssociateId;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A task accepted by a [`VirtualExecutor`].
///
/// Wraps the result handle together with the queue entry, which keeps the
/// remaining-delay query live across periodic re-arms. Clones share the same
/// underlying task.
pub struct ScheduledTask<R> {
    handle: TaskHandle<R>,
    item: Arc<dyn WorkItem>,
    clock: Arc<VirtualClock>,
}

impl<R> ScheduledTask<R> {
    /// Simulated time remaining until the task fires next. Zero once the
    /// fire time has been reached.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.item.fire_time().duration_since(self.clock.now()))
    }

    /// Cancels the task. Returns true only when it had not started running.
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    /// True when the task was cancelled before it ran.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// True when the task ran to completion.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.handle.is_complete()
    }

    /// Blocks up to `timeout` of real time for the result.
    ///
    /// See [`TaskHandle::join`] for the terminal-state mapping.
    pub fn join(&self, timeout: Duration) -> Result<R, JoinError> {
        self.handle.join(timeout)
    }

    /// A detached handle to the same task.
    #[must_use]
    pub fn handle(&self) -> TaskHandle<R> {
        self.handle.clone()
    }
}

impl<R> Clone for ScheduledTask<R> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            item: Arc::clone(&self.item),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R> fmt::Debug for ScheduledTask<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("fire_at", &self.item.fire_time())
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Simulated executor in the shape of a scheduled thread-pool.
///
/// Unlike a thread-pool there are no worker threads: accepted tasks sit in
/// the shared clock's queue until a driver advances simulated time over
/// them, and they execute on the driver's thread. Each executor tags its
/// tasks with its own associate id so shutdown affects only its work.
#[derive(Debug)]
pub struct VirtualExecutor {
    clock: Arc<VirtualClock>,
    associate: AssociateId,
    shutdown: AtomicBool,
}

impl VirtualExecutor {
    /// Creates an executor on the given clock with a fresh associate id.
    #[must_use]
    pub fn new(clock: Arc<VirtualClock>) -> Self {
        let associate = AssociateId::fresh();
        debug!(%associate, "executor created");
        Self {
            clock,
            associate,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Submits `action` for execution as soon as a driver makes progress.
    ///
    /// "Immediate" still means strictly after now: the task lands one
    /// simulated millisecond ahead, the queue-wide minimum delay.
    pub fn submit<A, R>(&self, action: A) -> Result<ScheduledTask<R>, SchedulerError>
    where
        A: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.schedule(Duration::ZERO, action)
    }

    /// Schedules `action` to run once, `delay` after the current simulated
    /// time, and returns a joinable task for its result.
    pub fn schedule<A, R>(
        &self,
        delay: Duration,
        action: A,
    ) -> Result<ScheduledTask<R>, SchedulerError>
    where
        A: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.ensure_live()?;
        let cell = Arc::new(TaskCell::new());
        let cell_for_item = cell.clone();
        let associate = self.associate;
        let item = self.clock.arm(delay, move |fire_at| {
            OneShotItem::new(fire_at, associate, cell_for_item, Box::new(action))
        })?;
        Ok(ScheduledTask {
            handle: TaskHandle::from_cell(cell),
            item,
            clock: self.clock.clone(),
        })
    }

    /// Schedules `action` to run repeatedly: first `initial_delay` from now,
    /// then every `period` of simulated time.
    ///
    /// The returned task never completes on its own; it settles only
    /// through cancellation.
    pub fn schedule_at_fixed_rate<A>(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: A,
    ) -> Result<ScheduledTask<()>, SchedulerError>
    where
        A: Fn() + Send + Sync + 'static,
    {
        self.schedule_repeating(initial_delay, period, action)
    }

    /// Schedules `action` with a fixed delay between runs. Coincides with
    /// [`schedule_at_fixed_rate`](Self::schedule_at_fixed_rate) because
    /// actions occupy zero simulated time.
    pub fn schedule_with_fixed_delay<A>(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: A,
    ) -> Result<ScheduledTask<()>, SchedulerError>
    where
        A: Fn() + Send + Sync + 'static,
    {
        self.schedule_repeating(initial_delay, period, action)
    }

    /// Batch submission that blocks until every action completes is
    /// incompatible with caller-driven time: the blocked caller would be
    /// the only thread able to make the clock advance. Always fails with
    /// [`SchedulerError::Unsupported`].
    pub fn invoke_all<A, R>(
        &self,
        actions: Vec<A>,
    ) -> Result<Vec<ScheduledTask<R>>, SchedulerError>
    where
        A: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let _ = actions;
        Err(SchedulerError::Unsupported("invoke_all batch execution"))
    }

    /// Racing submission that blocks for the first completed action. Fails
    /// for the same reason as [`invoke_all`](Self::invoke_all).
    pub fn invoke_any<A, R>(&self, actions: Vec<A>) -> Result<R, SchedulerError>
    where
        A: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let _ = actions;
        Err(SchedulerError::Unsupported("invoke_any racing execution"))
    }

    /// Stops accepting new work and cancels this executor's queued tasks.
    /// Pending joins settle with [`JoinError::Cancelled`].
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.clock.cancel_items(self.associate);
        debug!(associate = %self.associate, "executor shut down");
    }

    /// Stops accepting new work and removes this executor's queued tasks,
    /// revoking each. Returns the removed items.
    pub fn shutdown_now(&self) -> Vec<Arc<dyn WorkItem>> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.clock.cancel_items(self.associate)
    }

    /// True once [`shutdown`](Self::shutdown) or
    /// [`shutdown_now`](Self::shutdown_now) has run.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Number of this executor's tasks still queued on the clock.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.clock.count_associated(self.associate)
    }

    /// The id tagged onto everything this executor schedules.
    #[must_use]
    pub fn associate(&self) -> AssociateId {
        self.associate
    }

    fn ensure_live(&self) -> Result<(), SchedulerError> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(SchedulerError::Terminated);
        }
        Ok(())
    }

    fn schedule_repeating<A>(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: A,
    ) -> Result<ScheduledTask<()>, SchedulerError>
    where
        A: Fn() + Send + Sync + 'static,
    {
        self.ensure_live()?;
        let period = super::period_millis(period)?;
        let cell = Arc::new(TaskCell::new());
        let cell_for_item = cell.clone();
        let associate = self.associate;
        let item = self.clock.arm(initial_delay, move |fire_at| {
            PeriodicItem::new(fire_at, period, associate, cell_for_item, Box::new(action))
        })?;
        Ok(ScheduledTask {
            handle: TaskHandle::from_cell(cell),
            item,
            clock: self.clock.clone(),
        })
    }
}

impl ExecutorApi for VirtualExecutor {
    fn submit(
        &self,
        action: Box<dyn FnOnce() + Send>,
    ) -> Result<TaskHandle<()>, SchedulerError> {
        Self::submit(self, action).map(|task| task.handle())
    }

    fn schedule(
        &self,
        delay: Duration,
        action: Box<dyn FnOnce() + Send>,
    ) -> Result<TaskHandle<()>, SchedulerError> {
        Self::schedule(self, delay, action).map(|task| task.handle())
    }

    fn schedule_at_fixed_rate(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: Box<dyn Fn() + Send + Sync>,
    ) -> Result<TaskHandle<()>, SchedulerError> {
        Self::schedule_at_fixed_rate(self, initial_delay, period, action).map(|task| task.handle())
    }

    fn schedule_with_fixed_delay(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: Box<dyn Fn() + Send + Sync>,
    ) -> Result<TaskHandle<()>, SchedulerError> {
        Self::schedule_with_fixed_delay(self, initial_delay, period, action)
            .map(|task| task.handle())
    }

    fn shutdown(&self) {
        Self::shutdown(self);
    }

    fn is_shutdown(&self) -> bool {
        Self::is_shutdown(self)
    }

    fn pending_count(&self) -> usize {
        Self::pending_count(self)
    }
}

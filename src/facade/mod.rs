//! Timer and executor facades over a shared [`VirtualClock`].
//!
//! Application code under test rarely talks to the clock directly. It holds
//! a timer or an executor, schedules closures against it, and lets the test
//! driver advance time. Both facades tag everything they enqueue with their
//! own associate id, so cancelling or shutting down one facade never
//! disturbs work scheduled through another facade on the same clock.
//!
//! [`TimerApi`] and [`ExecutorApi`] are the object-safe seams: production
//! code can accept `Arc<dyn ExecutorApi>` and receive either a simulated
//! implementation or a real one without caring which.
//!
//! [`VirtualClock`]: crate::clock::VirtualClock

mod executor;
mod timer;

pub use executor::{ScheduledTask, VirtualExecutor};
pub use timer::VirtualTimer;

use crate::error::SchedulerError;
use crate::task::TaskHandle;
use crate::types::time::duration_to_millis_ceil;
use std::fmt;
use std::num::NonZeroU64;
use std::time::Duration;

/// Converts a repeat period to whole milliseconds, rounding up.
pub(crate) fn period_millis(period: Duration) -> Result<NonZeroU64, SchedulerError> {
    NonZeroU64::new(duration_to_millis_ceil(period)).ok_or(SchedulerError::InvalidPeriod)
}

/// Object-safe view of a timer.
///
/// Mirrors the inherent methods of [`VirtualTimer`] with boxed actions so
/// the trait can live behind `Arc<dyn TimerApi>`.
pub trait TimerApi: Send + Sync + fmt::Debug {
    /// Schedules a one-shot action after `delay`.
    fn schedule_once(
        &self,
        delay: Duration,
        action: Box<dyn FnOnce() + Send>,
    ) -> Result<TaskHandle<()>, SchedulerError>;

    /// Schedules a repeating action at a fixed rate.
    fn schedule_fixed_rate(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: Box<dyn Fn() + Send + Sync>,
    ) -> Result<TaskHandle<()>, SchedulerError>;

    /// Schedules a repeating action with a fixed delay between runs.
    fn schedule_fixed_delay(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: Box<dyn Fn() + Send + Sync>,
    ) -> Result<TaskHandle<()>, SchedulerError>;

    /// Cancels everything scheduled through this timer and terminates it.
    fn cancel_all(&self) -> usize;
}

/// Object-safe view of an executor.
///
/// Mirrors the inherent methods of [`VirtualExecutor`] with boxed actions
/// and unit-returning handles so the trait can live behind
/// `Arc<dyn ExecutorApi>`.
pub trait ExecutorApi: Send + Sync + fmt::Debug {
    /// Submits an action for immediate execution.
    fn submit(&self, action: Box<dyn FnOnce() + Send>)
        -> Result<TaskHandle<()>, SchedulerError>;

    /// Schedules an action after `delay`.
    fn schedule(
        &self,
        delay: Duration,
        action: Box<dyn FnOnce() + Send>,
    ) -> Result<TaskHandle<()>, SchedulerError>;

    /// Schedules a repeating action at a fixed rate.
    fn schedule_at_fixed_rate(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: Box<dyn Fn() + Send + Sync>,
    ) -> Result<TaskHandle<()>, SchedulerError>;

    /// Schedules a repeating action with a fixed delay between runs.
    fn schedule_with_fixed_delay(
        &self,
        initial_delay: Duration,
        period: Duration,
        action: Box<dyn Fn() + Send + Sync>,
    ) -> Result<TaskHandle<()>, SchedulerError>;

    /// Stops accepting new work and cancels the executor's queued items.
    fn shutdown(&self);

    /// True once [`shutdown`](Self::shutdown) or
    /// [`VirtualExecutor::shutdown_now`] has run.
    fn is_shutdown(&self) -> bool;

    /// Number of this executor's items still queued.
    fn pending_count(&self) -> usize;
}

//! Error types for the lockstep scheduler.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the clock and the scheduling facades.
///
/// Everything here is raised synchronously on the calling thread. The one
/// failure that is *not* an error value is a panicking scheduled action:
/// those are caught at the firing site, logged, and recorded on the task's
/// handle so the clock keeps driving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// A periodic schedule was requested with a period that truncates to
    /// zero milliseconds. Raised at construction, never deferred to fire
    /// time. (Negative periods are unrepresentable: [`Duration`] is
    /// unsigned.)
    #[error("period must be at least one millisecond")]
    InvalidPeriod,

    /// The operation exists on the vocabulary surface but is deliberately
    /// not implemented by the virtual scheduler. Calling it fails loudly
    /// instead of silently doing nothing.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// A facade refused new work because it has been shut down or had all
    /// of its items cancelled.
    #[error("scheduler has been terminated")]
    Terminated,

    /// The clock refused the operation because [`destroy`] has been called.
    ///
    /// [`destroy`]: crate::clock::VirtualClock::destroy
    #[error("clock has been destroyed")]
    ClockDestroyed,

    /// A blocked [`sleep`] was released by clock teardown rather than by
    /// simulated time reaching its wake-up instant.
    ///
    /// [`sleep`]: crate::clock::VirtualClock::sleep
    #[error("sleep interrupted by clock teardown")]
    Interrupted,

    /// A bounded predicate wait exhausted its simulated-time window without
    /// the predicate ever turning true.
    #[error("condition was never satisfied within {bound:?} of simulated time")]
    ConditionNeverSatisfied {
        /// The simulated-time window the wait was limited to.
        bound: Duration,
    },

    /// An unbounded predicate wait exceeded its real-time ceiling without
    /// the predicate turning true. This is the fail-fast escape hatch for
    /// tests whose condition can never be met.
    #[error("condition not satisfied after {ceiling:?} of real time")]
    ConditionTimedOut {
        /// The real-time ceiling configured on the clock.
        ceiling: Duration,
    },
}

//! Lockstep: deterministic virtual-clock scheduler for testing time-dependent code.
//!
//! # Overview
//!
//! Lockstep replaces wall-clock scheduling with a simulated millisecond clock
//! that only moves when a driver tells it to. Application threads schedule
//! work and sleep against the virtual clock exactly as they would against a
//! real timer or executor; a driver thread then advances simulated time in
//! lockstep with the queued work, firing each item at precisely its scheduled
//! instant. The same scenario replays identically on every run because no
//! wall-clock nondeterminism ever enters the schedule.
//!
//! # Core Guarantees
//!
//! - **Deterministic ordering**: items fire in non-decreasing fire-time order,
//!   regardless of how many threads enqueued them
//! - **Exact advancement**: the clock moves exactly to the fire time of the
//!   item being fired, never beyond it
//! - **No hung drivers**: every internal queue wait carries a real-time
//!   ceiling, so an empty or stalled queue fails fast instead of hanging
//! - **No hung sleepers**: destroying the clock wakes every blocked `sleep`
//!   call with an error instead of leaving threads parked
//!
//! # Module Structure
//!
//! - [`types`]: Core types ([`SimTime`], [`AssociateId`])
//! - [`error`](mod@error): Error types
//! - [`task`]: Promise cells and join handles for scheduled actions
//! - [`item`]: The [`WorkItem`] contract and its one-shot / periodic / sleep
//!   implementations
//! - [`clock`]: The [`VirtualClock`] engine and its configuration
//! - [`facade`]: Timer- and executor-vocabulary adapters over the clock
//!
//! # Example
//!
//! ```
//! use lockstep::{VirtualClock, VirtualExecutor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = Arc::new(VirtualClock::new());
//! let executor = VirtualExecutor::new(clock.clone());
//!
//! let task = executor.schedule(Duration::from_millis(250), || 41 + 1).unwrap();
//!
//! // Nothing runs until a driver advances simulated time.
//! clock.wait_for(Duration::from_millis(250)).unwrap();
//!
//! assert_eq!(task.join(Duration::from_secs(1)).unwrap(), 42);
//! assert_eq!(clock.now().as_millis(), 250);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]

pub mod clock;
pub mod error;
pub mod facade;
pub mod item;
pub mod task;
pub mod types;

#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

pub use clock::{
    ClockConfig, DEFAULT_POLL_GRANULARITY, DEFAULT_REAL_WAIT_CEILING, TimeSource, VirtualClock,
    WallClock,
};
pub use error::SchedulerError;
pub use facade::{ExecutorApi, ScheduledTask, TimerApi, VirtualExecutor, VirtualTimer};
pub use item::{OneShotItem, PeriodicItem, SleepItem, WorkItem};
pub use task::{JoinError, TaskHandle};
pub use types::{AssociateId, SimTime};

//! Blocking-sleep work items.

use crate::error::SchedulerError;
use crate::item::WorkItem;
use crate::types::SimTime;
use parking_lot::{Condvar, Mutex};
use std::fmt;

/// What happened to a parked sleeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateStatus {
    /// Still parked; no driver has reached the item yet.
    Waiting,
    /// A driver advanced simulated time to the wake-up instant.
    Fired,
    /// The clock was torn down before the wake-up instant was reached.
    Interrupted,
}

/// A work item that releases a parked thread when it fires.
///
/// The latch (mutex + condvar pair) is private to this item, so a parked
/// sleeper never holds the clock's shared lock. Any number of threads can
/// sleep concurrently against the same clock.
pub struct SleepItem {
    fire_at: SimTime,
    status: Mutex<GateStatus>,
    wake: Condvar,
}

impl SleepItem {
    pub(crate) fn new(fire_at: SimTime) -> Self {
        Self {
            fire_at,
            status: Mutex::new(GateStatus::Waiting),
            wake: Condvar::new(),
        }
    }

    /// Parks the calling thread until the item fires or is revoked.
    ///
    /// Status is checked before parking, so a fire that lands before the
    /// sleeper reaches the latch is never missed.
    pub(crate) fn wait(&self) -> Result<(), SchedulerError> {
        let mut status = self.status.lock();
        loop {
            match *status {
                GateStatus::Waiting => self.wake.wait(&mut status),
                GateStatus::Fired => return Ok(()),
                GateStatus::Interrupted => return Err(SchedulerError::Interrupted),
            }
        }
    }
}

impl WorkItem for SleepItem {
    fn fire_time(&self) -> SimTime {
        self.fire_at
    }

    fn fire(&self) {
        let mut status = self.status.lock();
        if *status == GateStatus::Waiting {
            *status = GateStatus::Fired;
            drop(status);
            self.wake.notify_all();
        }
    }

    fn revoke(&self) {
        let mut status = self.status.lock();
        if *status == GateStatus::Waiting {
            *status = GateStatus::Interrupted;
            drop(status);
            self.wake.notify_all();
        }
    }
}

impl fmt::Debug for SleepItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SleepItem")
            .field("fire_at", &self.fire_at)
            .field("status", &*self.status.lock())
            .finish()
    }
}

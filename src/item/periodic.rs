//! Periodic work items that re-arm after every fire.

use crate::item::WorkItem;
use crate::task::{TaskCell, panic_message};
use crate::types::{AssociateId, SimTime};
use std::fmt;
use std::num::NonZeroU64;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A work item that fires repeatedly, a fixed period apart.
///
/// The next fire time is always computed from the *previous fire*, never from
/// the originally scheduled instant, which makes fixed-rate and fixed-delay
/// scheduling deliberately identical on a virtual clock. The period is a
/// [`NonZeroU64`] of milliseconds, so every re-arm lands strictly after the
/// fire that produced it.
///
/// Cancellation goes through the shared [`TaskCell`]: the handle flips it,
/// and the clock drops the item the next time it surfaces. A cancelled
/// periodic item neither fires nor re-arms.
pub struct PeriodicItem {
    /// Next fire time in milliseconds. Mutated only by `rearm`.
    fire_at: AtomicU64,
    period: NonZeroU64,
    associate: AssociateId,
    cell: Arc<TaskCell<()>>,
    action: Box<dyn Fn() + Send + Sync>,
}

impl PeriodicItem {
    pub(crate) fn new(
        fire_at: SimTime,
        period: NonZeroU64,
        associate: AssociateId,
        cell: Arc<TaskCell<()>>,
        action: Box<dyn Fn() + Send + Sync>,
    ) -> Self {
        Self {
            fire_at: AtomicU64::new(fire_at.as_millis()),
            period,
            associate,
            cell,
            action,
        }
    }

    /// The fixed period between fires.
    #[must_use]
    pub fn period_millis(&self) -> u64 {
        self.period.get()
    }
}

impl WorkItem for PeriodicItem {
    fn fire_time(&self) -> SimTime {
        SimTime::from_millis(self.fire_at.load(Ordering::Acquire))
    }

    fn fire(&self) {
        if self.cell.is_cancelled() {
            return;
        }
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (self.action)())) {
            let message = panic_message(payload.as_ref());
            tracing::error!(
                fire_at = %self.fire_time(),
                period_ms = self.period.get(),
                panic = %message,
                "periodic action panicked; the schedule keeps running"
            );
        }
    }

    fn was_cancelled(&self) -> bool {
        self.cell.is_cancelled()
    }

    fn is_associated_with(&self, associate: AssociateId) -> bool {
        self.associate == associate
    }

    fn rearm(&self, fired_at: SimTime) -> bool {
        if self.cell.is_cancelled() {
            return false;
        }
        let next = fired_at.saturating_add_millis(self.period.get());
        self.fire_at.store(next.as_millis(), Ordering::Release);
        true
    }

    fn revoke(&self) {
        self.cell.cancel();
    }
}

impl fmt::Debug for PeriodicItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicItem")
            .field("fire_at", &self.fire_time())
            .field("period_ms", &self.period.get())
            .field("associate", &self.associate)
            .finish_non_exhaustive()
    }
}

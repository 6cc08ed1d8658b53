//! Single-firing work items backed by a promise cell.

use crate::item::WorkItem;
use crate::task::{TaskCell, panic_message};
use crate::types::{AssociateId, SimTime};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

type BoxedAction<R> = Box<dyn FnOnce() -> R + Send>;

/// A work item that fires exactly once and then is discarded.
///
/// The action's outcome (result, cancellation, or panic) lands in the shared
/// [`TaskCell`]; whoever holds the matching
/// [`TaskHandle`](crate::task::TaskHandle) observes it from there.
pub struct OneShotItem<R> {
    fire_at: SimTime,
    associate: AssociateId,
    cell: Arc<TaskCell<R>>,
    action: Mutex<Option<BoxedAction<R>>>,
}

impl<R: Send + 'static> OneShotItem<R> {
    pub(crate) fn new(
        fire_at: SimTime,
        associate: AssociateId,
        cell: Arc<TaskCell<R>>,
        action: BoxedAction<R>,
    ) -> Self {
        Self {
            fire_at,
            associate,
            cell,
            action: Mutex::new(Some(action)),
        }
    }
}

impl<R: Send + 'static> WorkItem for OneShotItem<R> {
    fn fire_time(&self) -> SimTime {
        self.fire_at
    }

    fn fire(&self) {
        let Some(action) = self.action.lock().take() else {
            return;
        };
        if !self.cell.begin_fire() {
            // Cancelled between enqueue and pop; the action is dropped unrun.
            return;
        }
        match catch_unwind(AssertUnwindSafe(action)) {
            Ok(value) => self.cell.complete(value),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(fire_at = %self.fire_at, panic = %message, "scheduled action panicked");
                self.cell.record_panic(message);
            }
        }
    }

    fn was_cancelled(&self) -> bool {
        self.cell.is_cancelled()
    }

    fn is_associated_with(&self, associate: AssociateId) -> bool {
        self.associate == associate
    }

    fn revoke(&self) {
        self.cell.cancel();
        // Drop the action eagerly so its captures are freed at revocation,
        // not when the last queue reference goes away.
        drop(self.action.lock().take());
    }
}

impl<R> fmt::Debug for OneShotItem<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShotItem")
            .field("fire_at", &self.fire_at)
            .field("associate", &self.associate)
            .finish_non_exhaustive()
    }
}

//! Promise cells and join handles for scheduled actions.
//!
//! Every one-shot action is backed by a [`TaskCell`]: a small state machine
//! (armed, running, complete, cancelled, panicked) guarded by its own mutex
//! and condition variable. The cell is private to the queue entry that fires
//! it; callers hold a [`TaskHandle`] over the same cell for cancellation and
//! result retrieval. Joining never touches the clock lock, so a thread
//! blocked in [`TaskHandle::join`] cannot stall a driver.

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors returned by [`TaskHandle::join`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// The action was cancelled before it ran; no result will ever arrive.
    #[error("task was cancelled before completion")]
    Cancelled,

    /// The action panicked while running. The payload's message is preserved.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The wait elapsed before the action reached a terminal state.
    #[error("timed out waiting for task completion")]
    Timeout,

    /// The result was already handed out by an earlier `join`. The result
    /// slot is single-consumer.
    #[error("task result was already taken")]
    AlreadyTaken,
}

/// Lifecycle of a scheduled action's result slot.
enum TaskState<R> {
    /// Queued; the action has not started.
    Armed,
    /// The action is currently executing on a driver thread.
    Running,
    /// The action finished and its result is waiting to be taken.
    Complete(R),
    /// Cancelled (or revoked at teardown) before the action started.
    Cancelled,
    /// The action panicked; the message is kept for joiners.
    Panicked(String),
    /// The result was consumed by a successful `join`.
    Taken,
}

impl<R> TaskState<R> {
    fn name(&self) -> &'static str {
        match self {
            Self::Armed => "armed",
            Self::Running => "running",
            Self::Complete(_) => "complete",
            Self::Cancelled => "cancelled",
            Self::Panicked(_) => "panicked",
            Self::Taken => "taken",
        }
    }
}

/// Shared result slot between a queued item and the caller's handle.
pub(crate) struct TaskCell<R> {
    state: Mutex<TaskState<R>>,
    done: Condvar,
}

impl<R> TaskCell<R> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(TaskState::Armed),
            done: Condvar::new(),
        }
    }

    /// Transitions armed -> running. Returns false when the cell was
    /// cancelled (or otherwise left the armed state), in which case the
    /// action must not run.
    pub(crate) fn begin_fire(&self) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, TaskState::Armed) {
            *state = TaskState::Running;
            true
        } else {
            false
        }
    }

    /// Records the action's result and wakes joiners.
    pub(crate) fn complete(&self, value: R) {
        let mut state = self.state.lock();
        *state = TaskState::Complete(value);
        drop(state);
        self.done.notify_all();
    }

    /// Records a panic from the action and wakes joiners.
    pub(crate) fn record_panic(&self, message: String) {
        let mut state = self.state.lock();
        *state = TaskState::Panicked(message);
        drop(state);
        self.done.notify_all();
    }

    /// Cancels an armed cell. Returns true only when the action had not yet
    /// started; a running or finished action is unaffected.
    pub(crate) fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, TaskState::Armed) {
            *state = TaskState::Cancelled;
            drop(state);
            self.done.notify_all();
            true
        } else {
            false
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(*self.state.lock(), TaskState::Cancelled)
    }

    pub(crate) fn is_complete(&self) -> bool {
        matches!(*self.state.lock(), TaskState::Complete(_) | TaskState::Taken)
    }

    fn state_name(&self) -> &'static str {
        self.state.lock().name()
    }

    /// Blocks until the cell reaches a terminal state or the timeout
    /// elapses, then consumes the result.
    pub(crate) fn join(&self, timeout: Duration) -> Result<R, JoinError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while matches!(*state, TaskState::Armed | TaskState::Running) {
            match deadline {
                Some(at) => {
                    if self.done.wait_until(&mut state, at).timed_out()
                        && matches!(*state, TaskState::Armed | TaskState::Running)
                    {
                        return Err(JoinError::Timeout);
                    }
                }
                // Timeout too large to represent as a deadline: wait plainly.
                None => self.done.wait(&mut state),
            }
        }
        match std::mem::replace(&mut *state, TaskState::Taken) {
            TaskState::Complete(value) => Ok(value),
            TaskState::Panicked(message) => {
                *state = TaskState::Panicked(message.clone());
                Err(JoinError::Panicked(message))
            }
            TaskState::Cancelled => {
                *state = TaskState::Cancelled;
                Err(JoinError::Cancelled)
            }
            TaskState::Taken => Err(JoinError::AlreadyTaken),
            // The wait loop above only exits once the state is terminal.
            TaskState::Armed => {
                *state = TaskState::Armed;
                Err(JoinError::Timeout)
            }
            TaskState::Running => {
                *state = TaskState::Running;
                Err(JoinError::Timeout)
            }
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

/// Handle to a scheduled action's result.
///
/// Handles are cheap to clone; every clone observes the same underlying
/// cell. Cancellation through any handle is honored lazily: the item stays
/// in the clock's queue until a driver pops it (or a purge removes it), but
/// its action will never run.
pub struct TaskHandle<R> {
    cell: Arc<TaskCell<R>>,
}

impl<R> TaskHandle<R> {
    pub(crate) fn from_cell(cell: Arc<TaskCell<R>>) -> Self {
        Self { cell }
    }

    /// Cancels the scheduled action.
    ///
    /// Returns true only when the action had not yet started running. A
    /// cancelled action never runs and joining yields
    /// [`JoinError::Cancelled`].
    pub fn cancel(&self) -> bool {
        self.cell.cancel()
    }

    /// Returns true when the action was cancelled before it ran.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cell.is_cancelled()
    }

    /// Returns true when the action finished and produced a result
    /// (including a result already consumed by an earlier join).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cell.is_complete()
    }

    /// Blocks until the action completes, waiting at most `timeout` of real
    /// time, and returns its result.
    ///
    /// The result slot is single-consumer: a second successful join returns
    /// [`JoinError::AlreadyTaken`]. Note that a periodic schedule never
    /// completes; joining one only returns once it is cancelled or the
    /// timeout elapses.
    pub fn join(&self, timeout: Duration) -> Result<R, JoinError> {
        self.cell.join(timeout)
    }
}

impl<R> Clone for TaskHandle<R> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<R> fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("state", &self.cell.state_name())
            .finish()
    }
}

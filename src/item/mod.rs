//! The schedulable-work contract and its implementations.
//!
//! Everything a [`VirtualClock`](crate::clock::VirtualClock) queues is a
//! [`WorkItem`]: a fire time, an action, and a handful of lazily-queried
//! flags. The clock itself never inspects what an item does; it only orders
//! items by fire time, drops the ones that report themselves cancelled, and
//! re-queues the ones that re-arm.
//!
//! Three implementations cover the built-in scheduling surfaces:
//!
//! - [`OneShotItem`]: fires once, backed by a promise cell
//! - [`PeriodicItem`]: re-arms itself a fixed period after every fire
//! - [`SleepItem`]: parks the thread that created it until a driver fires it

pub mod one_shot;
pub mod periodic;
pub mod sleep;

pub use one_shot::OneShotItem;
pub use periodic::PeriodicItem;
pub use sleep::SleepItem;

use crate::types::{AssociateId, SimTime};
use std::fmt;

/// A unit of schedulable work owned by a virtual clock's queue.
///
/// Implementations must be cheap to query: the clock calls [`fire_time`],
/// [`was_cancelled`], and [`is_associated_with`] while holding its internal
/// lock. [`fire`] and [`revoke`] are always invoked with that lock released,
/// so they may take item-private locks and wake other threads freely.
///
/// [`fire_time`]: WorkItem::fire_time
/// [`was_cancelled`]: WorkItem::was_cancelled
/// [`is_associated_with`]: WorkItem::is_associated_with
/// [`fire`]: WorkItem::fire
/// [`revoke`]: WorkItem::revoke
pub trait WorkItem: Send + Sync + fmt::Debug {
    /// Absolute simulated time at which this item should fire.
    ///
    /// At (re-)arm time this is strictly greater than the clock's current
    /// time, which guarantees every drive makes forward progress.
    fn fire_time(&self) -> SimTime;

    /// Executes the item's action.
    ///
    /// Called on a driver thread after the clock has advanced to
    /// [`fire_time`](WorkItem::fire_time). A panicking action must be
    /// contained by the implementation; the built-in items catch and log it.
    fn fire(&self);

    /// True when the item has been cancelled and must be dropped unfired.
    ///
    /// Queried lazily: a cancelled item may sit in the queue until a driver
    /// reaches it or a purge removes it. The default is "never cancelled".
    fn was_cancelled(&self) -> bool {
        false
    }

    /// True when the item belongs to the given cancellation group.
    ///
    /// Used only for bulk-removal lookups; the default belongs to no group.
    fn is_associated_with(&self, _associate: AssociateId) -> bool {
        false
    }

    /// Advances the fire time after a firing at `fired_at`.
    ///
    /// Returns true when the item should be queued again. The default is a
    /// single-shot item that is done after one fire.
    fn rearm(&self, _fired_at: SimTime) -> bool {
        false
    }

    /// Marks the item abandoned after it was removed without firing (group
    /// cancellation or clock teardown).
    ///
    /// Implementations must release anything waiting on the item: promise
    /// cells flip to cancelled, sleep latches wake with an interrupted
    /// status. The default does nothing.
    fn revoke(&self) {}
}

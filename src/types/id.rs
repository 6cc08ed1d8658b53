//! Group-cancellation keys.
//!
//! Every scheduling facade mints one [`AssociateId`] at construction and tags
//! each item it enqueues with it. Cancelling the facade then removes exactly
//! the items carrying its key, leaving everything else in the queue alone.
//! The key is a plain integer: holding one confers no ownership of the items
//! it tags.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter backing [`AssociateId::fresh`]. Starts at 1 so the zero value
/// never appears in a live queue.
static ASSOCIATE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A process-unique key grouping queued items for bulk cancellation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssociateId(u64);

impl AssociateId {
    /// Mints a new key, distinct from every key minted before it.
    #[must_use]
    pub fn fresh() -> Self {
        Self(ASSOCIATE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a key with a fixed raw value for testing purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for AssociateId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssociateId({})", self.0)
    }
}

impl fmt::Display for AssociateId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

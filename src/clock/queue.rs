//! Priority queue of pending work, ordered by fire time.
//!
//! A thin wrapper over [`BinaryHeap`] with reversed ordering (earliest fire
//! time first) and a monotonically increasing sequence number breaking ties,
//! so items scheduled for the same instant surface in insertion order. The
//! fire time is snapshotted as the ordering key at push; re-armed items are
//! re-pushed with their new time.
//!
//! The queue knows nothing about cancellation policy or time advancement.
//! It only stores, orders, and hands back entries; the clock decides what to
//! do with them.

use crate::item::WorkItem;
use crate::types::SimTime;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// One queued firing of a work item.
pub(crate) struct QueueEntry {
    fire_at: SimTime,
    seq: u64,
    item: Arc<dyn WorkItem>,
}

impl QueueEntry {
    pub(crate) fn fire_at(&self) -> SimTime {
        self.fire_at
    }

    pub(crate) fn item(&self) -> &dyn WorkItem {
        self.item.as_ref()
    }

    pub(crate) fn into_item(self) -> Arc<dyn WorkItem> {
        self.item
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest fire time first).
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of work items ordered by (fire time, insertion order).
#[derive(Default)]
pub(crate) struct WorkQueue {
    heap: BinaryHeap<QueueEntry>,
    next_seq: u64,
}

impl WorkQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Inserts an item, snapshotting its fire time as the ordering key.
    pub(crate) fn push(&mut self, item: Arc<dyn WorkItem>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueueEntry {
            fire_at: item.fire_time(),
            seq,
            item,
        });
    }

    /// Returns the earliest queued fire time, if any.
    pub(crate) fn peek_fire_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|entry| entry.fire_at)
    }

    /// Pops the front entry only if it fires at or before `bound`.
    pub(crate) fn pop_due(&mut self, bound: SimTime) -> Option<QueueEntry> {
        if self.heap.peek().is_some_and(|entry| entry.fire_at <= bound) {
            self.heap.pop()
        } else {
            None
        }
    }

    /// Removes and returns every item matching the predicate, in fire order.
    ///
    /// The survivors keep their original sequence numbers, so relative order
    /// among items at equal fire times is preserved.
    pub(crate) fn drain_matching<P>(&mut self, pred: P) -> Vec<Arc<dyn WorkItem>>
    where
        P: Fn(&dyn WorkItem) -> bool,
    {
        let entries = std::mem::take(&mut self.heap).into_vec();
        let mut removed = Vec::new();
        let mut kept = Vec::new();
        for entry in entries {
            if pred(entry.item.as_ref()) {
                removed.push(entry);
            } else {
                kept.push(entry);
            }
        }
        self.heap = BinaryHeap::from(kept);
        removed.sort_by_key(|entry| (entry.fire_at, entry.seq));
        removed.into_iter().map(QueueEntry::into_item).collect()
    }

    /// Removes every item, in fire order.
    pub(crate) fn drain_all(&mut self) -> Vec<Arc<dyn WorkItem>> {
        self.drain_matching(|_| true)
    }

    /// Drops items that already report themselves cancelled. Returns the
    /// number removed.
    pub(crate) fn purge_cancelled(&mut self) -> usize {
        self.drain_matching(|item| item.was_cancelled()).len()
    }

    /// Counts queued items matching the predicate.
    pub(crate) fn count_matching<P>(&self, pred: P) -> usize
    where
        P: Fn(&dyn WorkItem) -> bool,
    {
        self.heap
            .iter()
            .filter(|entry| pred(entry.item.as_ref()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssociateId;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

    // Inert item for exercising queue mechanics.
    #[derive(Debug)]
    struct StubItem {
        fire_at: SimTime,
        associate: Option<AssociateId>,
        cancelled: AtomicBool,
        label: &'static str,
    }

    impl StubItem {
        fn at(millis: u64, label: &'static str) -> Arc<Self> {
            Arc::new(Self {
                fire_at: SimTime::from_millis(millis),
                associate: None,
                cancelled: AtomicBool::new(false),
                label,
            })
        }

        fn grouped(millis: u64, associate: AssociateId) -> Arc<Self> {
            Arc::new(Self {
                fire_at: SimTime::from_millis(millis),
                associate: Some(associate),
                cancelled: AtomicBool::new(false),
                label: "grouped",
            })
        }
    }

    impl WorkItem for StubItem {
        fn fire_time(&self) -> SimTime {
            self.fire_at
        }

        fn fire(&self) {}

        fn was_cancelled(&self) -> bool {
            self.cancelled.load(AtomicOrdering::SeqCst)
        }

        fn is_associated_with(&self, associate: AssociateId) -> bool {
            self.associate == Some(associate)
        }
    }

    fn pop_label(queue: &mut WorkQueue) -> &'static str {
        let entry = queue.pop_due(SimTime::MAX).unwrap();
        let fired = entry.into_item();
        // Walk back to the stub through the trait object's Debug output.
        let dbg = format!("{fired:?}");
        for label in ["early", "middle", "late", "first", "second", "third"] {
            if dbg.contains(label) {
                return label;
            }
        }
        panic!("unexpected item: {dbg}");
    }

    #[test]
    fn empty_queue() {
        let mut queue = WorkQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.peek_fire_time(), None);
        assert!(queue.pop_due(SimTime::MAX).is_none());
    }

    #[test]
    fn orders_by_fire_time() {
        let mut queue = WorkQueue::new();
        queue.push(StubItem::at(200, "middle"));
        queue.push(StubItem::at(300, "late"));
        queue.push(StubItem::at(100, "early"));

        assert_eq!(queue.peek_fire_time(), Some(SimTime::from_millis(100)));
        assert_eq!(pop_label(&mut queue), "early");
        assert_eq!(pop_label(&mut queue), "middle");
        assert_eq!(pop_label(&mut queue), "late");
    }

    #[test]
    fn equal_fire_times_pop_in_insertion_order() {
        let mut queue = WorkQueue::new();
        queue.push(StubItem::at(100, "first"));
        queue.push(StubItem::at(100, "second"));
        queue.push(StubItem::at(100, "third"));

        assert_eq!(pop_label(&mut queue), "first");
        assert_eq!(pop_label(&mut queue), "second");
        assert_eq!(pop_label(&mut queue), "third");
    }

    #[test]
    fn pop_due_respects_the_bound() {
        let mut queue = WorkQueue::new();
        queue.push(StubItem::at(100, "early"));
        queue.push(StubItem::at(500, "late"));

        let entry = queue.pop_due(SimTime::from_millis(250)).unwrap();
        assert_eq!(entry.fire_at(), SimTime::from_millis(100));

        // The remaining item fires beyond the bound.
        assert!(queue.pop_due(SimTime::from_millis(250)).is_none());
        assert_eq!(queue.len(), 1);

        // An exact-bound item is due.
        assert!(queue.pop_due(SimTime::from_millis(500)).is_some());
    }

    #[test]
    fn drain_matching_removes_only_matches() {
        let group = AssociateId::new_for_test(77);
        let other = AssociateId::new_for_test(78);
        let mut queue = WorkQueue::new();
        queue.push(StubItem::grouped(300, group));
        queue.push(StubItem::at(100, "early"));
        queue.push(StubItem::grouped(200, group));
        queue.push(StubItem::grouped(150, other));

        let removed = queue.drain_matching(|item| item.is_associated_with(group));
        assert_eq!(removed.len(), 2);
        // Removed items come back in fire order.
        assert_eq!(removed[0].fire_time(), SimTime::from_millis(200));
        assert_eq!(removed[1].fire_time(), SimTime::from_millis(300));

        // The rest are untouched and still ordered.
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek_fire_time(), Some(SimTime::from_millis(100)));
    }

    #[test]
    fn purge_drops_cancelled_items() {
        let keep = StubItem::at(100, "early");
        let drop_me = StubItem::at(200, "middle");
        drop_me.cancelled.store(true, AtomicOrdering::SeqCst);

        let mut queue = WorkQueue::new();
        queue.push(keep);
        queue.push(drop_me);

        assert_eq!(queue.purge_cancelled(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek_fire_time(), Some(SimTime::from_millis(100)));
        // Purging again finds nothing.
        assert_eq!(queue.purge_cancelled(), 0);
    }

    #[test]
    fn count_matching() {
        let group = AssociateId::new_for_test(5);
        let mut queue = WorkQueue::new();
        queue.push(StubItem::grouped(10, group));
        queue.push(StubItem::at(20, "early"));
        queue.push(StubItem::grouped(30, group));

        assert_eq!(
            queue.count_matching(|item| item.is_associated_with(group)),
            2
        );
        assert_eq!(queue.count_matching(|_| true), 3);
    }

    #[test]
    fn drain_all_empties_in_fire_order() {
        let mut queue = WorkQueue::new();
        queue.push(StubItem::at(300, "late"));
        queue.push(StubItem::at(100, "early"));

        let drained = queue.drain_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].fire_time(), SimTime::from_millis(100));
        assert_eq!(drained[1].fire_time(), SimTime::from_millis(300));
        assert!(queue.is_empty());
    }
}

//! Flush Scheduler
//!
//! The scheduler decides *when* pending effects run, not what they do. It
//! is a batching depth counter plus a pending set:
//!
//! - Writes propagate synchronously and enqueue due effects here rather
//!   than running them inline.
//! - `batch` raises the depth around a closure; nesting is transparent and
//!   only the outermost exit triggers a flush.
//! - A flush drains the pending set in waves. Each wave is a snapshot of
//!   the set, so an effect runs at most once per wave no matter how many
//!   times it was marked pending; writes performed by running effects land
//!   in the next wave. A `flushing` latch keeps nested writes from starting
//!   a second, re-entrant drain.
//!
//! The pending set is insertion-ordered and deduplicating, so effects run
//! in the order they first became due and a flush is deterministic.

use indexmap::IndexSet;

use super::node::NodeId;

/// Batching depth and the pending-effect set.
#[derive(Default)]
pub(crate) struct Scheduler {
    depth: u32,
    flushing: bool,
    pending: IndexSet<NodeId>,
}

impl Scheduler {
    /// Mark a sink as due. Duplicates coalesce.
    pub fn enqueue(&mut self, id: NodeId) {
        self.pending.insert(id);
    }

    /// Drop a disposed sink from the pending set.
    pub fn forget(&mut self, id: NodeId) {
        self.pending.shift_remove(&id);
    }

    pub fn enter_batch(&mut self) {
        self.depth += 1;
    }

    /// Leave a batch level. Returns true when this closed the outermost
    /// batch and a flush should run.
    pub fn exit_batch(&mut self) -> bool {
        self.depth = self.depth.saturating_sub(1);
        self.depth == 0
    }

    /// Whether a flush may start right now: nothing pending is no reason,
    /// an open batch defers, and a running flush already owns the drain.
    pub fn should_flush(&self) -> bool {
        !self.pending.is_empty() && self.depth == 0 && !self.flushing
    }

    /// Try to take ownership of the drain. Returns false when a flush is
    /// already running (the nested request coalesces into it).
    pub fn begin_flush(&mut self) -> bool {
        if self.flushing {
            return false;
        }
        self.flushing = true;
        true
    }

    pub fn end_flush(&mut self) {
        self.flushing = false;
    }

    /// Snapshot and clear the pending set: one flush wave.
    pub fn take_wave(&mut self) -> Vec<NodeId> {
        self.pending.drain(..).collect()
    }
}

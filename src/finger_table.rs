use crate::node::NodeInfo;
use crate::ring_id::{RingId, M};

/// Routing shortcuts: slot `i` holds the successor of
/// `(self.id + 2^i) mod 2^160` as of the last refresh.
///
/// Slots may go stale between refreshes. That only costs extra hops: a
/// lookup stays correct as long as every finger points at some node that is
/// still ahead of the owner in the forward direction.
#[derive(Debug, Clone)]
pub struct FingerTable {
    slots: Vec<NodeInfo>,
}

impl FingerTable {
    /// Builds a table whose every slot points at the owning node itself,
    /// the correct state for a ring of one.
    pub fn new(own: NodeInfo) -> FingerTable {
        FingerTable {
            slots: vec![own; M],
        }
    }

    /// The entry at slot `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= M`; callers index with constants or loop bounds, so
    /// an out-of-range slot is a programming error.
    pub fn get(&self, i: usize) -> &NodeInfo {
        &self.slots[i]
    }

    /// Replaces the entry at slot `i`.
    pub fn set(&mut self, i: usize, info: NodeInfo) {
        self.slots[i] = info;
    }

    /// Scans slots from `M - 1` down to `0` and returns the first finger
    /// whose id lies strictly inside the open segment `(self_id, target)`:
    /// the farthest node ahead of us that has not yet passed the target.
    /// Returns `None` when no finger qualifies; the caller falls back to
    /// its successor.
    pub fn closest_preceding(&self, self_id: &RingId, target: &RingId) -> Option<&NodeInfo> {
        self.slots
            .iter()
            .rev()
            .find(|finger| finger.id.in_open_interval(self_id, target))
    }
}

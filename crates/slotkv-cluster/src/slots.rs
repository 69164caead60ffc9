//! Slot to owner map.
//!
//! Each of the [`HASH_SLOTS`] entries is an atomic holding a [`NodeId`] or an
//! empty marker, so lookups and single-slot patches never take a lock. A
//! rebuild writes a whole new layout entry by entry; concurrent readers see
//! either the old or the new owner of any slot, never anything else. At most
//! one rebuild runs at a time: the rebuild gate is a try-lock and losers
//! skip the work. Only the router writes to the map; callers outside the
//! crate get read access.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::hash::HASH_SLOTS;
use crate::node::{Node, NodeAddr, NodeId};
use crate::registry::NodeRegistry;
use crate::topology::SlotRange;

// Above `NodeId::MAX`, so never a live node.
const EMPTY: u32 = u32::MAX;

/// Fixed-size table of slot owners.
///
/// Writes go through the router only:
///
/// ```compile_fail
/// let slots = slotkv_cluster::SlotMap::new();
/// slots.clear();
/// ```
pub struct SlotMap {
    entries: Box<[AtomicU32]>,
    rebuilding: AtomicBool,
}

/// Exclusive right to rebuild the map; released on drop.
pub(crate) struct RebuildGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl SlotMap {
    /// Creates a map with every slot empty.
    pub fn new() -> Self {
        let entries = (0..HASH_SLOTS).map(|_| AtomicU32::new(EMPTY)).collect();
        Self {
            entries,
            rebuilding: AtomicBool::new(false),
        }
    }

    /// Owner of `slot`, if cached. Out-of-range slots are never populated.
    pub fn lookup(&self, slot: u16) -> Option<NodeId> {
        let raw = self.entries.get(slot as usize)?.load(Ordering::Acquire);
        (raw != EMPTY).then(|| NodeId::new(raw))
    }

    /// Points `slot` at `id`. Returns false for an out-of-range slot.
    pub(crate) fn set(&self, slot: u16, id: NodeId) -> bool {
        match self.entries.get(slot as usize) {
            Some(entry) => {
                entry.store(id.as_u32(), Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Records `target` as the owner of `slot`, registering the node if needed.
    ///
    /// Used on redirects: no topology validation, a single slot write.
    pub(crate) fn patch(
        &self,
        registry: &NodeRegistry,
        slot: u16,
        target: &NodeAddr,
    ) -> Result<Arc<Node>> {
        let (node, _) = registry.get_or_insert(&target.host, target.port)?;
        self.set(slot, node.id());
        Ok(node)
    }

    /// Replaces the whole layout with `ranges` and returns the number of
    /// populated slots. Slots outside every range become empty.
    ///
    /// If an owner cannot be registered the map is left as it was.
    pub(crate) fn rebuild_from_topology(
        &self,
        registry: &NodeRegistry,
        ranges: &[SlotRange],
    ) -> Result<usize> {
        let mut layout = vec![EMPTY; HASH_SLOTS as usize];
        for range in ranges {
            if range.start > range.end || range.end >= HASH_SLOTS {
                continue;
            }
            let (node, _) = registry.get_or_insert(&range.host, range.port)?;
            layout[range.start as usize..=range.end as usize].fill(node.id().as_u32());
        }
        for (entry, owner) in self.entries.iter().zip(&layout) {
            entry.store(*owner, Ordering::Release);
        }
        Ok(layout.iter().filter(|owner| **owner != EMPTY).count())
    }

    /// Empties every slot.
    pub(crate) fn clear(&self) {
        for entry in self.entries.iter() {
            entry.store(EMPTY, Ordering::Release);
        }
    }

    /// Number of populated slots.
    pub fn filled(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.load(Ordering::Acquire) != EMPTY)
            .count()
    }

    /// Slot count per owner, ordered by node id.
    pub fn owner_counts(&self) -> Vec<(NodeId, usize)> {
        let mut counts = std::collections::BTreeMap::new();
        for entry in self.entries.iter() {
            let raw = entry.load(Ordering::Acquire);
            if raw != EMPTY {
                *counts.entry(NodeId::new(raw)).or_insert(0usize) += 1;
            }
        }
        counts.into_iter().collect()
    }

    /// Claims the rebuild gate, or returns `None` if a rebuild is already running.
    pub(crate) fn try_begin_rebuild(&self) -> Option<RebuildGuard<'_>> {
        self.rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RebuildGuard {
                flag: &self.rebuilding,
            })
    }

    /// True while a rebuild holds the gate.
    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::Acquire)
    }
}

impl Default for SlotMap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SlotMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotMap")
            .field("filled", &self.filled())
            .field("rebuilding", &self.is_rebuilding())
            .finish()
    }
}

//! Block-sync client: catches a newly connected or lagging peer up on a
//! contiguous range of levels, independent of the steady-state gossip
//! relay. Transcribed from `BlockSyncEntry`/`BlockSyncList` in
//! `blocksync.hpp`.

use std::collections::VecDeque;

/// One outstanding request: `nlevels` blocks starting at `level`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockSyncEntry {
    pub level: u64,
    pub nlevels: u32,
}

/// Wire request/response pairing a level range with the blocks it covers.
#[derive(Clone, Debug)]
pub struct BlockSyncMsg {
    pub entry: BlockSyncEntry,
    pub blocks: Vec<Vec<u8>>,
}

/// Queue of level ranges still to be fetched, plus the next level not yet
/// claimed by any entry. A request that times out or fails is requeued at
/// the front rather than the back, so sync always makes forward progress
/// on the lowest unclaimed level before trying anything more speculative.
pub struct BlockSyncList {
    entries: parking_lot::Mutex<VecDeque<BlockSyncEntry>>,
    next_level: std::sync::atomic::AtomicU64,
}

impl BlockSyncList {
    pub fn new(start_level: u64) -> Self {
        BlockSyncList {
            entries: parking_lot::Mutex::new(VecDeque::new()),
            next_level: std::sync::atomic::AtomicU64::new(start_level),
        }
    }

    pub fn has_requeues(&self) -> bool {
        !self.entries.lock().is_empty()
    }

    /// Returns the next entry to fetch: a requeued one if any are pending,
    /// otherwise a freshly minted one starting at `next_level` and
    /// advancing it by up to `batch_size`.
    ///
    /// Fresh entries are bounded by `last_indelible_level + max_span`: once
    /// `next_level` reaches that bound, no more speculative ranges are
    /// minted until the indelible tip advances, so a fast peer can't pull a
    /// lagging node arbitrarily far ahead of what it can actually confirm.
    /// A requeued entry is returned unconditionally since it was already
    /// bounded when first minted.
    pub fn get_next_entry(&self, batch_size: u32, last_indelible_level: u64, max_span: u64) -> Option<BlockSyncEntry> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.pop_front() {
            return Some(entry);
        }
        drop(entries);

        let bound = last_indelible_level.saturating_add(max_span);
        loop {
            let level = self.next_level.load(std::sync::atomic::Ordering::SeqCst);
            if level >= bound {
                return None;
            }
            let nlevels = (batch_size as u64).min(bound - level).max(1) as u32;
            if self
                .next_level
                .compare_exchange(
                    level,
                    level + nlevels as u64,
                    std::sync::atomic::Ordering::SeqCst,
                    std::sync::atomic::Ordering::SeqCst,
                )
                .is_ok()
            {
                return Some(BlockSyncEntry { level, nlevels });
            }
        }
    }

    /// Puts a failed or timed-out entry back at the front of the queue.
    pub fn requeue_entry(&self, entry: BlockSyncEntry) {
        self.entries.lock().push_front(entry);
    }

    pub fn next_level(&self) -> u64 {
        self.next_level.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entries_advance_next_level() {
        let list = BlockSyncList::new(100);
        let e1 = list.get_next_entry(10, 0, 1_000).unwrap();
        assert_eq!(e1, BlockSyncEntry { level: 100, nlevels: 10 });
        let e2 = list.get_next_entry(10, 0, 1_000).unwrap();
        assert_eq!(e2, BlockSyncEntry { level: 110, nlevels: 10 });
    }

    #[test]
    fn requeued_entries_take_priority_over_fresh_ones() {
        let list = BlockSyncList::new(100);
        let first = list.get_next_entry(10, 0, 1_000).unwrap();
        list.requeue_entry(first);
        assert!(list.has_requeues());

        let next = list.get_next_entry(10, 0, 1_000).unwrap();
        assert_eq!(next, first);
        assert!(!list.has_requeues());
    }

    #[test]
    fn fresh_entries_stop_past_the_indelible_span_bound() {
        let list = BlockSyncList::new(100);
        // Bound is last_indelible_level (0) + max_span (10) = 10, already
        // behind next_level (100), so no fresh entry should be minted.
        assert_eq!(list.get_next_entry(10, 0, 10), None);
    }

    #[test]
    fn fresh_entries_are_clamped_to_the_remaining_span() {
        let list = BlockSyncList::new(100);
        // Bound is 100 + 5 = 105, less than the requested batch of 10.
        let entry = list.get_next_entry(10, 100, 5).unwrap();
        assert_eq!(entry, BlockSyncEntry { level: 100, nlevels: 5 });
        assert_eq!(list.get_next_entry(10, 100, 5), None);
    }
}

//! Indelible promotion: walking the block graph forward from the current
//! last-indelible tip to find the next block that has accumulated enough
//! confirming signatures to be treated as permanent.
//!
//! A block is confirmed once `nconfsigs` (or, on a witness-sequence
//! branch, `nseqconfsigs`/`nskipconfsigs` per [`BlockchainParams`])
//! distinct witnesses have signed on top of it without violating
//! [`crate::score::check_bad_sig_order`]. This module only performs the
//! walk-and-confirm check; the actual persistence of indelible state is
//! `crate::storage`'s concern.

use std::sync::Arc;

use crate::graph::BlockGraph;
use crate::score::check_bad_sig_order;
use crate::types::block::BlockNode;
use crate::types::Hash256;

/// Every `BLOCK_PRUNE_ROUNDS` levels the tentative serial-number table is
/// swept for entries that have since become indelible or been superseded,
/// transcribed from the original's same-named constant.
pub const BLOCK_PRUNE_ROUNDS: u64 = 5;

/// Returns the highest-level descendant of `from` that is now confirmed
/// indelible, if any, by walking forward over every resident block at each
/// subsequent level and checking whether `nconfsigs` worth of valid
/// witness signatures chain back to it without a bad sig order.
///
/// This is necessarily approximate relative to the original's incremental
/// bookkeeping (which updates confirmation counts block-by-block as they
/// arrive): it recomputes from scratch over the resident graph, which is
/// correct but not incremental. Grounded on `§4.7` of the distilled design
/// and `BlockChain`'s last-indelible bookkeeping in `blockchain.hpp`.
pub fn find_next_indelible(graph: &BlockGraph, from: &Arc<BlockNode>, candidates: &[Arc<BlockNode>]) -> Option<Arc<BlockNode>> {
    let mut best: Option<Arc<BlockNode>> = None;

    for candidate in candidates {
        if candidate.aux.level <= from.aux.level {
            continue;
        }
        if !graph.check_block_in_chain(candidate, &from.oid(), usize::MAX) {
            continue;
        }

        let required = candidate.aux.params.nconfsigs;
        let confirmations = count_confirming_descendants(graph, candidate, candidates);

        if confirmations >= required as usize && !check_bad_sig_order(candidate, None).unwrap_or(true) {
            let better = match &best {
                Some(b) => candidate.aux.level > b.aux.level,
                None => true,
            };
            if better {
                best = Some(Arc::clone(candidate));
            }
        }
    }

    best
}

fn count_confirming_descendants(graph: &BlockGraph, block: &Arc<BlockNode>, pool: &[Arc<BlockNode>]) -> usize {
    let mut witnesses = std::collections::HashSet::new();
    for other in pool {
        if other.aux.level > block.aux.level && graph.check_block_in_chain(other, &block.oid(), usize::MAX) {
            witnesses.insert(other.aux.witness);
        }
    }
    witnesses.len()
}

/// Table of serial numbers consumed by blocks that have become indelible.
/// Swept every [`BLOCK_PRUNE_ROUNDS`] levels to drop tentative entries that
/// either matured into this set or lost to a competing branch.
#[derive(Default)]
pub struct IndelibleSerialTable {
    serials: parking_lot::RwLock<std::collections::HashSet<Hash256>>,
    last_sweep_level: std::sync::atomic::AtomicU64,
}

impl IndelibleSerialTable {
    pub fn insert(&self, sn: Hash256) {
        self.serials.write().insert(sn);
    }

    pub fn contains(&self, sn: &Hash256) -> bool {
        self.serials.read().contains(sn)
    }

    /// Runs the periodic sweep if at least [`BLOCK_PRUNE_ROUNDS`] levels
    /// have passed since the last one.
    pub fn maybe_sweep(&self, current_level: u64, tentative: &mut std::collections::HashSet<Hash256>) {
        let last = self.last_sweep_level.load(std::sync::atomic::Ordering::Acquire);
        if current_level < last + BLOCK_PRUNE_ROUNDS {
            return;
        }
        let indelible = self.serials.read();
        tentative.retain(|sn| !indelible.contains(sn));
        self.last_sweep_level.store(current_level, std::sync::atomic::Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_drops_serials_that_became_indelible() {
        let table = IndelibleSerialTable::default();
        let sn = Hash256([1u8; 32]);
        table.insert(sn);

        let mut tentative = std::collections::HashSet::new();
        tentative.insert(sn);

        table.maybe_sweep(BLOCK_PRUNE_ROUNDS, &mut tentative);
        assert!(tentative.is_empty());
    }

    #[test]
    fn sweep_is_a_noop_before_the_interval_elapses() {
        let table = IndelibleSerialTable::default();
        let mut tentative = std::collections::HashSet::new();
        tentative.insert(Hash256([2u8; 32]));
        table.maybe_sweep(1, &mut tentative);
        assert_eq!(tentative.len(), 1);
    }
}

//! The resident block graph and the last-indelible tip.
//!
//! Resident blocks live in a concurrent map keyed by [`Oid`]. The single
//! piece of graph-wide mutable state that must be read and written
//! atomically as a group — the last-indelible block, its level, and its
//! timestamp — is guarded by one process-wide lock, matching the original
//! source's combined getter under a single `FastSpinLock` rather than three
//! independently-racy atomics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::types::block::BlockNode;
use crate::types::Oid;

/// Global lock guarding every [`BlockNode::prior`] swap, mirroring the
/// original's single `FastSpinLock prior_block_lock` shared by all blocks
/// rather than one lock per node — breaking a prior-pointer link and
/// dropping the orphaned subtree must never race with a concurrent reader
/// walking through it.
pub static PRIOR_LOCK: Mutex<()> = Mutex::new(());

/// The last-indelible tip: the highest-level block the node currently
/// treats as permanently confirmed, plus the two values that always travel
/// with it.
struct LastIndelible {
    block: Mutex<Option<Arc<BlockNode>>>,
    level: AtomicU64,
    timestamp: AtomicU64,
}

/// A consistent read of the last-indelible tip's three components, taken
/// under one lock so a reader never observes a timestamp from one block
/// and a level from another.
#[derive(Clone)]
pub struct LastIndelibleValues {
    pub block: Option<Arc<BlockNode>>,
    pub level: u64,
    pub timestamp: u64,
}

pub struct BlockGraph {
    blocks: DashMap<Oid, Arc<BlockNode>>,
    last_indelible: LastIndelible,
}

impl BlockGraph {
    pub fn new() -> Self {
        BlockGraph {
            blocks: DashMap::new(),
            last_indelible: LastIndelible {
                block: Mutex::new(None),
                level: AtomicU64::new(0),
                timestamp: AtomicU64::new(0),
            },
        }
    }

    pub fn insert(&self, node: Arc<BlockNode>) {
        self.blocks.insert(node.oid(), node);
    }

    pub fn get(&self, oid: &Oid) -> Option<Arc<BlockNode>> {
        self.blocks.get(oid).map(|e| Arc::clone(e.value()))
    }

    pub fn remove(&self, oid: &Oid) -> Option<Arc<BlockNode>> {
        self.blocks.remove(oid).map(|(_, v)| v)
    }

    pub fn contains(&self, oid: &Oid) -> bool {
        self.blocks.contains_key(oid)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// A snapshot of every block currently resident in the graph, used by
    /// the indelible-promotion walk and the witness builder's fork-choice
    /// scan. Not ordered, and may miss or include blocks inserted or
    /// removed concurrently with the snapshot, exactly like any other
    /// `DashMap` iteration.
    pub fn residents(&self) -> Vec<Arc<BlockNode>> {
        self.blocks.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Reads the last-indelible block, level, and timestamp as one
    /// consistent triple.
    pub fn last_indelible_values(&self) -> LastIndelibleValues {
        let block = self.last_indelible.block.lock();
        LastIndelibleValues {
            block: block.clone(),
            level: self.last_indelible.level.load(Ordering::Acquire),
            timestamp: self.last_indelible.timestamp.load(Ordering::Acquire),
        }
    }

    pub fn last_indelible_level(&self) -> u64 {
        self.last_indelible.level.load(Ordering::Acquire)
    }

    /// Advances the last-indelible tip. Callers must ensure `node`'s level
    /// is monotonically increasing; promotion logic in
    /// [`crate::indelible`] is the only caller.
    pub fn set_last_indelible(&self, node: Arc<BlockNode>, timestamp: u64) {
        let level = node.aux.level;
        let mut guard = self.last_indelible.block.lock();
        *guard = Some(node);
        self.last_indelible.level.store(level, Ordering::Release);
        self.last_indelible.timestamp.store(timestamp, Ordering::Release);
    }

    /// Walks backward from `from` up to `max_steps` prior blocks, returning
    /// each visited node in order (including `from`).
    pub fn walk_prior(&self, from: &Arc<BlockNode>, max_steps: usize) -> Vec<Arc<BlockNode>> {
        let mut out = Vec::with_capacity(max_steps + 1);
        let mut cur = Arc::clone(from);
        out.push(Arc::clone(&cur));
        for _ in 0..max_steps {
            let next = cur.prior.lock().clone();
            match next {
                Some(n) => {
                    out.push(Arc::clone(&n));
                    cur = n;
                }
                None => break,
            }
        }
        out
    }

    /// Returns `true` if `ancestor` appears somewhere on `descendant`'s
    /// prior chain, searching at most `max_steps` blocks back.
    pub fn check_block_in_chain(&self, descendant: &Arc<BlockNode>, ancestor: &Oid, max_steps: usize) -> bool {
        let mut cur = Arc::clone(descendant);
        if cur.oid() == *ancestor {
            return true;
        }
        for _ in 0..max_steps {
            let next = cur.prior.lock().clone();
            match next {
                Some(n) => {
                    if n.oid() == *ancestor {
                        return true;
                    }
                    cur = n;
                }
                None => return false,
            }
        }
        false
    }

    /// Swaps `node`'s prior link under [`PRIOR_LOCK`], returning the
    /// previous link (if any) so the caller can decide whether to keep a
    /// strong reference alive or let the orphaned subtree drop.
    pub fn set_prior(&self, node: &Arc<BlockNode>, new_prior: Option<Arc<BlockNode>>) -> Option<Arc<BlockNode>> {
        let _guard = PRIOR_LOCK.lock();
        let mut slot = node.prior.lock();
        std::mem::replace(&mut *slot, new_prior)
    }
}

impl Default for BlockGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::block::{BlockAux, BlockchainParams};
    use crate::types::tx::Transaction;
    use crate::types::{Block, BlockHash, BlockSignature, BlockWireHeader, Hash256};

    fn make_node(level: u64, witness: u8, prior: Option<Arc<BlockNode>>) -> Arc<BlockNode> {
        let header = BlockWireHeader {
            prior_oid: prior.as_ref().map(|p| p.oid()).unwrap_or(crate::types::Oid(Hash256([0u8; 32]))),
            level,
            timestamp: 0,
            witness,
            next_signing_public_key: None,
            transactions: Vec::<Transaction>::new(),
        };
        let block = Block { header, signature: BlockSignature([level as u8; 64]) };
        let oid = block.oid();
        let params = BlockchainParams::with_conf_sigs(11, 0, 11, 0);
        let aux = BlockAux::new(oid, BlockHash::compute(&[level as u8]), level, witness, 0, params, vec![]);
        Arc::new(BlockNode { block, aux, prior: Mutex::new(prior) })
    }

    #[test]
    fn walk_prior_returns_full_chain() {
        let genesis = make_node(0, 0, None);
        let child = make_node(1, 1, Some(Arc::clone(&genesis)));
        let grandchild = make_node(2, 2, Some(Arc::clone(&child)));

        let chain = BlockGraph::new().walk_prior(&grandchild, 10);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[2].aux.level, 0);
    }

    #[test]
    fn check_block_in_chain_finds_ancestor() {
        let genesis = make_node(0, 0, None);
        let child = make_node(1, 1, Some(Arc::clone(&genesis)));
        let graph = BlockGraph::new();
        assert!(graph.check_block_in_chain(&child, &genesis.oid(), 10));
    }

    #[test]
    fn residents_reflects_every_inserted_block() {
        let graph = BlockGraph::new();
        let genesis = make_node(0, 0, None);
        let child = make_node(1, 1, Some(Arc::clone(&genesis)));
        graph.insert(Arc::clone(&genesis));
        graph.insert(Arc::clone(&child));

        let residents = graph.residents();
        assert_eq!(residents.len(), 2);
        assert!(residents.iter().any(|n| n.oid() == genesis.oid()));
        assert!(residents.iter().any(|n| n.oid() == child.oid()));
    }

    #[test]
    fn last_indelible_values_are_consistent() {
        let graph = BlockGraph::new();
        let genesis = make_node(0, 0, None);
        graph.set_last_indelible(Arc::clone(&genesis), 1_700_000_000);
        let v = graph.last_indelible_values();
        assert_eq!(v.level, 0);
        assert_eq!(v.timestamp, 1_700_000_000);
        assert!(v.block.is_some());
    }
}

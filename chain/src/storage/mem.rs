//! In-memory indelible store, for unit tests and small devnets.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use super::IndelibleStore;
use crate::types::{Block, Hash256, Oid};

#[derive(Default)]
pub struct InMemoryIndelibleStore {
    blocks: RwLock<HashMap<Oid, Block>>,
    tip: RwLock<Option<Oid>>,
    serials: RwLock<HashSet<Hash256>>,
    commitments: RwLock<HashSet<Hash256>>,
}

impl InMemoryIndelibleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}

impl IndelibleStore for InMemoryIndelibleStore {
    fn get_block(&self, oid: &Oid) -> Option<Block> {
        self.blocks.read().get(oid).cloned()
    }

    fn put_block(&self, block: &Block) {
        self.blocks.write().insert(block.oid(), block.clone());
    }

    fn tip(&self) -> Option<Oid> {
        *self.tip.read()
    }

    fn set_tip(&self, oid: Oid) {
        *self.tip.write() = Some(oid);
    }

    fn put_serialnum(&self, sn: Hash256) {
        self.serials.write().insert(sn);
    }

    fn contains_serialnum(&self, sn: &Hash256) -> bool {
        self.serials.read().contains(sn)
    }

    fn put_commitment(&self, commitment: Hash256) {
        self.commitments.write().insert(commitment);
    }

    fn contains_commitment(&self, commitment: &Hash256) -> bool {
        self.commitments.read().contains(commitment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockSignature, BlockWireHeader, Hash256};

    fn dummy_block(level: u64) -> Block {
        let header = BlockWireHeader {
            prior_oid: Oid(Hash256([0u8; 32])),
            level,
            timestamp: 1_700_000_000 + level,
            witness: 0,
            next_signing_public_key: None,
            transactions: Vec::new(),
        };
        Block { header, signature: BlockSignature([0u8; 64]) }
    }

    #[test]
    fn put_and_get_block_roundtrip() {
        let store = InMemoryIndelibleStore::new();
        let block = dummy_block(0);
        let oid = block.oid();

        store.put_block(&block);
        let fetched = store.get_block(&oid).expect("block should be present");

        assert_eq!(fetched.header.level, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn tip_is_tracked_separately_from_blocks() {
        let store = InMemoryIndelibleStore::new();
        let block = dummy_block(5);
        let oid = block.oid();

        store.put_block(&block);
        assert!(store.tip().is_none());

        store.set_tip(oid);
        assert_eq!(store.tip(), Some(oid));
    }

    #[test]
    fn serial_numbers_persist_independently_of_blocks() {
        let store = InMemoryIndelibleStore::new();
        let sn = Hash256([7u8; 32]);
        assert!(!store.contains_serialnum(&sn));
        store.put_serialnum(sn);
        assert!(store.contains_serialnum(&sn));
    }

    #[test]
    fn commitments_persist_independently_of_blocks() {
        let store = InMemoryIndelibleStore::new();
        let commitment = Hash256([9u8; 32]);
        assert!(!store.contains_commitment(&commitment));
        store.put_commitment(commitment);
        assert!(store.contains_commitment(&commitment));
    }
}

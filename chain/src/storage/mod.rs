//! Persistent storage for the block graph: the out-of-scope embedded KV
//! store is modeled here as an ACID map with a WAL, exposed through the
//! [`IndelibleStore`] trait so the rest of the crate never depends on
//! which concrete backend (RocksDB for production, in-memory for tests)
//! it is running against.

pub mod mem;
pub mod rocksdb;

pub use mem::InMemoryIndelibleStore;
pub use rocksdb::RocksDbIndelibleStore;

use crate::types::{Block, Hash256, Oid};

/// Persistent single-writer store of blocks that have become indelible.
/// Only the indelible-promotion engine writes to this store; the resident
/// in-memory [`crate::graph::BlockGraph`] holds everything still subject to
/// fork-choice.
///
/// `put_serialnum`/`contains_serialnum` and `put_commitment`/
/// `contains_commitment` persist the double-spend and commit-root state a
/// restart must not lose: once a serial number is written through here it
/// can never be spent again, on this branch or any other.
pub trait IndelibleStore: Send + Sync {
    fn get_block(&self, oid: &Oid) -> Option<Block>;
    fn put_block(&self, block: &Block);
    fn tip(&self) -> Option<Oid>;
    fn set_tip(&self, oid: Oid);

    fn put_serialnum(&self, sn: Hash256);
    fn contains_serialnum(&self, sn: &Hash256) -> bool;

    fn put_commitment(&self, commitment: Hash256);
    fn contains_commitment(&self, commitment: &Hash256) -> bool;
}

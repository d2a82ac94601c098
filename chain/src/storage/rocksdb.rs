//! RocksDB-backed indelible store.
//!
//! Dedicated column families:
//!
//! - `"blocks"`:      maps `Oid` (32 bytes) -> canonical block bytes,
//! - `"meta"`:        stores the current tip under a fixed key `"tip"`,
//! - `"serials"`:     set of spent serial numbers that have become indelible,
//! - `"commitments"`: set of output commitments that have become indelible.
//!
//! The embedded KV store's own ACID/WAL guarantees are out of scope for
//! this crate and are provided entirely by RocksDB itself; this module
//! only defines the schema built on top of it.

use std::{path::Path, sync::Arc};

use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, Options, DB};

use super::IndelibleStore;
use crate::types::{Block, Hash256, Oid, HASH_LEN};

#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    pub path: String,
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self { path: "data/chain-db".to_string(), create_if_missing: true }
    }
}

#[derive(Debug)]
pub enum StorageError {
    RocksDb(rocksdb::Error),
    MissingColumnFamily(&'static str),
    CorruptedMeta(&'static str),
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::RocksDb(e)
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::RocksDb(e) => write!(f, "rocksdb error: {e}"),
            StorageError::MissingColumnFamily(cf) => write!(f, "missing column family: {cf}"),
            StorageError::CorruptedMeta(what) => write!(f, "corrupted metadata: {what}"),
        }
    }
}

impl std::error::Error for StorageError {}

pub struct RocksDbIndelibleStore {
    db: DB,
}

impl RocksDbIndelibleStore {
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new("blocks", Options::default()),
            ColumnFamilyDescriptor::new("meta", Options::default()),
            ColumnFamilyDescriptor::new("serials", Options::default()),
            ColumnFamilyDescriptor::new("commitments", Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self { db })
    }

    fn cf_blocks(&self) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db.cf_handle("blocks").ok_or(StorageError::MissingColumnFamily("blocks"))
    }

    fn cf_meta(&self) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db.cf_handle("meta").ok_or(StorageError::MissingColumnFamily("meta"))
    }

    fn cf_serials(&self) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db.cf_handle("serials").ok_or(StorageError::MissingColumnFamily("serials"))
    }

    fn cf_commitments(&self) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db.cf_handle("commitments").ok_or(StorageError::MissingColumnFamily("commitments"))
    }

    fn decode_block(bytes: &[u8]) -> Option<Block> {
        let cfg = bincode::config::standard();
        let (block, _): (Block, usize) = bincode::serde::decode_from_slice(bytes, cfg).ok()?;
        Some(block)
    }

    fn load_tip(&self) -> Result<Option<Oid>, StorageError> {
        let cf_meta = self.cf_meta()?;
        match self.db.get_cf(&cf_meta, b"tip")? {
            None => Ok(None),
            Some(bytes) => {
                if bytes.len() != HASH_LEN {
                    return Err(StorageError::CorruptedMeta("tip oid length"));
                }
                let mut arr = [0u8; HASH_LEN];
                arr.copy_from_slice(&bytes);
                Ok(Some(Oid(Hash256(arr))))
            }
        }
    }

    fn store_tip(&self, oid: &Oid) -> Result<(), StorageError> {
        let cf_meta = self.cf_meta()?;
        self.db.put_cf(&cf_meta, b"tip", oid.as_hash().as_bytes())?;
        Ok(())
    }
}

impl IndelibleStore for RocksDbIndelibleStore {
    fn get_block(&self, oid: &Oid) -> Option<Block> {
        let cf = self.cf_blocks().ok()?;
        match self.db.get_cf(&cf, oid.as_hash().as_bytes()) {
            Ok(Some(bytes)) => Self::decode_block(&bytes),
            _ => None,
        }
    }

    fn put_block(&self, block: &Block) {
        let oid = block.oid();
        let bytes = block.canonical_bytes();

        match self.cf_blocks() {
            Ok(cf) => {
                if let Err(e) = self.db.put_cf(&cf, oid.as_hash().as_bytes(), bytes) {
                    tracing::error!(error = %e, "RocksDbIndelibleStore::put_block failed");
                }
            }
            Err(e) => tracing::error!(error = %e, "RocksDbIndelibleStore::put_block: missing column family"),
        }
    }

    fn tip(&self) -> Option<Oid> {
        self.load_tip().ok().flatten()
    }

    fn set_tip(&self, oid: Oid) {
        if let Err(e) = self.store_tip(&oid) {
            tracing::error!(error = %e, "RocksDbIndelibleStore::set_tip failed");
        }
    }

    fn put_serialnum(&self, sn: Hash256) {
        match self.cf_serials() {
            Ok(cf) => {
                if let Err(e) = self.db.put_cf(&cf, sn.as_bytes(), []) {
                    tracing::error!(error = %e, "RocksDbIndelibleStore::put_serialnum failed");
                }
            }
            Err(e) => tracing::error!(error = %e, "RocksDbIndelibleStore::put_serialnum: missing column family"),
        }
    }

    fn contains_serialnum(&self, sn: &Hash256) -> bool {
        match self.cf_serials() {
            Ok(cf) => matches!(self.db.get_cf(&cf, sn.as_bytes()), Ok(Some(_))),
            Err(_) => false,
        }
    }

    fn put_commitment(&self, commitment: Hash256) {
        match self.cf_commitments() {
            Ok(cf) => {
                if let Err(e) = self.db.put_cf(&cf, commitment.as_bytes(), []) {
                    tracing::error!(error = %e, "RocksDbIndelibleStore::put_commitment failed");
                }
            }
            Err(e) => tracing::error!(error = %e, "RocksDbIndelibleStore::put_commitment: missing column family"),
        }
    }

    fn contains_commitment(&self, commitment: &Hash256) -> bool {
        match self.cf_commitments() {
            Ok(cf) => matches!(self.db.get_cf(&cf, commitment.as_bytes()), Ok(Some(_))),
            Err(_) => false,
        }
    }
}

//! Genesis loading.
//!
//! The genesis block is the one block with no prior: a fixed file, created
//! out-of-band by mint bootstrap tooling that is out of scope for this
//! crate. This module only knows how to read that file and turn it into
//! the first resident [`BlockNode`], with the witness public-key vector
//! embedded in its aux rather than recovered from a prior block (genesis
//! has none).

use std::path::Path;
use std::sync::Arc;

use crate::types::block::{Block, BlockAux, BlockNode, BlockchainParams};
use crate::types::{BlockHash, WitnessPublicKey};

#[derive(Debug)]
pub enum GenesisError {
    Io(std::io::Error),
    Decode(bincode::error::DecodeError),
    NotLevelZero(u64),
}

impl std::fmt::Display for GenesisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenesisError::Io(e) => write!(f, "failed to read genesis file: {e}"),
            GenesisError::Decode(e) => write!(f, "failed to decode genesis file: {e}"),
            GenesisError::NotLevelZero(level) => write!(f, "genesis block must be level 0, got {level}"),
        }
    }
}

impl std::error::Error for GenesisError {}

/// On-disk genesis file format: the signed level-0 block plus the
/// witness-committee parameters and public-key vector that seed
/// [`BlockchainParams`]/`signing_keys` for every descendant, since genesis
/// has no prior block to inherit them from.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct GenesisFile {
    pub block: Block,
    pub nwitnesses: u8,
    pub maxmal: u8,
    pub signing_keys: Vec<WitnessPublicKey>,
}

pub fn load_genesis_file(path: &Path) -> Result<GenesisFile, GenesisError> {
    let bytes = std::fs::read(path).map_err(GenesisError::Io)?;
    let (file, _): (GenesisFile, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).map_err(GenesisError::Decode)?;
    Ok(file)
}

pub fn write_genesis_file(path: &Path, file: &GenesisFile) -> std::io::Result<()> {
    let bytes = bincode::serde::encode_to_vec(file, bincode::config::standard()).expect("GenesisFile encoding is infallible");
    std::fs::write(path, bytes)
}

/// Builds the resident genesis [`BlockNode`] from a loaded [`GenesisFile`].
pub fn build_genesis_node(file: &GenesisFile) -> Result<Arc<BlockNode>, GenesisError> {
    if file.block.header.level != 0 {
        return Err(GenesisError::NotLevelZero(file.block.header.level));
    }

    let oid = file.block.oid();
    let block_hash = BlockHash::compute(&file.block.canonical_bytes());
    let params = BlockchainParams::with_conf_sigs(file.nwitnesses, file.maxmal, file.nwitnesses, file.maxmal);

    let aux = BlockAux::new(oid, block_hash, 0, file.block.header.witness, 0, params, file.signing_keys.clone());

    Ok(Arc::new(BlockNode { block: file.block.clone(), aux, prior: parking_lot::Mutex::new(None) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockSignature, BlockWireHeader, Hash256, Oid};
    use tempfile::TempDir;

    fn sample_genesis_file() -> GenesisFile {
        let header = BlockWireHeader {
            prior_oid: Oid(Hash256([0u8; 32])),
            level: 0,
            timestamp: 1_700_000_000,
            witness: 0,
            next_signing_public_key: None,
            transactions: vec![],
        };
        let block = Block { header, signature: BlockSignature([0u8; 64]) };
        GenesisFile { block, nwitnesses: 11, maxmal: 0, signing_keys: vec![WitnessPublicKey([1u8; 32]); 11] }
    }

    #[test]
    fn genesis_file_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("genesis.dat");
        let file = sample_genesis_file();

        write_genesis_file(&path, &file).unwrap();
        let loaded = load_genesis_file(&path).unwrap();

        assert_eq!(loaded.block.header.level, 0);
        assert_eq!(loaded.signing_keys.len(), 11);
    }

    #[test]
    fn build_genesis_node_has_no_prior_and_level_zero() {
        let file = sample_genesis_file();
        let node = build_genesis_node(&file).unwrap();
        assert_eq!(node.aux.level, 0);
        assert!(node.prior.lock().is_none());
        assert_eq!(node.aux.signing_keys.len(), 11);
    }

    #[test]
    fn rejects_non_zero_level_genesis() {
        let mut file = sample_genesis_file();
        file.block.header.level = 1;
        let result = build_genesis_node(&file);
        assert!(matches!(result, Err(GenesisError::NotLevelZero(1))));
    }
}

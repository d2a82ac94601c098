//! Block wire format and in-memory auxiliary state.
//!
//! [`BlockWireHeader`] is the canonical, signed, on-wire representation of a
//! block. [`BlockAux`] is everything the node tracks about a resident block
//! that is *not* part of the signed content: its derived identifiers, its
//! position in the DAG, and the witness-committee parameters inherited from
//! its parent.

use serde::{Deserialize, Serialize};

use super::tx::Transaction;
use super::{BlockHash, BlockSignature, Hash256, Oid, WitnessPublicKey, MAX_WITNESSES};

/// Tag byte identifying a block for [`Oid`] derivation, distinguishing it
/// from a transaction OID even if the underlying bytes were to collide.
pub const BLOCK_OID_TAG: u8 = 0x01;

/// The signed, canonical, on-wire block header.
///
/// `next_signing_public_key` is only populated when key rotation is
/// compiled in; production builds of this crate leave it `None` and the
/// field still round-trips cleanly through bincode because it is an
/// `Option`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockWireHeader {
    pub prior_oid: Oid,
    pub level: u64,
    pub timestamp: u64,
    pub witness: u8,
    pub next_signing_public_key: Option<WitnessPublicKey>,
    pub transactions: Vec<Transaction>,
}

/// A block as stored on the wire: header plus detached signature.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockWireHeader,
    pub signature: BlockSignature,
}

impl Block {
    /// Canonical bytes covered by the block signature: the bincode
    /// encoding of the header alone, never including the signature itself.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        bincode::serde::encode_to_vec(&self.header, bincode::config::standard())
            .expect("BlockWireHeader encoding is infallible")
    }

    /// Derives this block's [`Oid`] from its canonical bytes and signature.
    pub fn oid(&self) -> Oid {
        Oid::derive(BLOCK_OID_TAG, &self.canonical_bytes(), &self.signature.0)
    }
}

/// Witness-committee parameters that chain forward from a block to its
/// descendants until a witness rotation changes them.
///
/// `nconfsigs`, `nskipconfsigs`, and `nseqconfsigs` are derived from
/// `nwitnesses`/`maxmal` by [`BlockchainParams::with_conf_sigs`]; they are
/// cached here rather than recomputed on every walk because the walk is on
/// the hot confirmation path.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockchainParams {
    pub nwitnesses: u8,
    pub maxmal: u8,
    pub nconfsigs: u8,
    pub nskipconfsigs: u8,
    pub nseqconfsigs: u8,
    pub next_nwitnesses: u8,
    pub next_maxmal: u8,
}

/// Upper bound on `nconfsigs` regardless of `nwitnesses`/`maxmal`, mirroring
/// the original source's `MAX_NCONFSIGS = MAX_NWITNESSES + (MAX_NWITNESSES-1)/2`.
pub const MAX_NCONFSIGS: u8 = (MAX_WITNESSES + (MAX_WITNESSES - 1) / 2) as u8;

impl BlockchainParams {
    /// Derives `nconfsigs`/`nskipconfsigs`/`nseqconfsigs` from `nwitnesses`
    /// and `maxmal`, clamped to [`MAX_NCONFSIGS`].
    ///
    /// Formulas, transcribed from `BlockAux::SetConfSigs`:
    /// `nconfsigs = (nwitnesses - maxmal)/2 + maxmal + 1`;
    /// `nskipconfsigs = nwitnesses + maxmal`;
    /// `nseqconfsigs = nskipconfsigs if maxmal > 0 else nconfsigs`.
    pub fn with_conf_sigs(nwitnesses: u8, maxmal: u8, next_nwitnesses: u8, next_maxmal: u8) -> Self {
        let nw = nwitnesses as u32;
        let mm = maxmal as u32;

        let nconfsigs = ((nw - mm) / 2 + mm + 1).min(MAX_NCONFSIGS as u32) as u8;
        let nskipconfsigs = (nw + mm).min(MAX_NCONFSIGS as u32) as u8;
        let nseqconfsigs = if maxmal > 0 { nskipconfsigs } else { nconfsigs };

        BlockchainParams {
            nwitnesses,
            maxmal,
            nconfsigs,
            nskipconfsigs,
            nseqconfsigs,
            next_nwitnesses,
            next_maxmal,
        }
    }
}

/// Everything the node tracks about a resident block beyond its signed
/// content: derived identifiers, DAG position, and inherited committee
/// parameters. Not part of the wire format.
#[derive(Debug)]
pub struct BlockAux {
    pub oid: Oid,
    pub block_hash: BlockHash,
    pub level: u64,
    pub witness: u8,
    /// Distance walked back to find the nearest prior occurrence of the
    /// same witness, computed by [`crate::score::skip`] at acceptance time.
    pub skip: u16,
    pub params: BlockchainParams,
    pub signing_keys: Vec<WitnessPublicKey>,
    /// Memoized fork-choice score; `None` until [`crate::score::calc_skip_score`]
    /// has been run for the current generation stamp.
    pub score: std::sync::Mutex<Option<(u64, u16)>>,
    /// Generation counter invalidating `score` when the graph is extended
    /// past this block, mirroring the original's `score_genstamp`.
    pub score_genstamp: std::sync::atomic::AtomicU32,
}

impl BlockAux {
    pub fn new(
        oid: Oid,
        block_hash: BlockHash,
        level: u64,
        witness: u8,
        skip: u16,
        params: BlockchainParams,
        signing_keys: Vec<WitnessPublicKey>,
    ) -> Self {
        BlockAux {
            oid,
            block_hash,
            level,
            witness,
            skip,
            params,
            signing_keys,
            score: std::sync::Mutex::new(None),
            score_genstamp: std::sync::atomic::AtomicU32::new(0),
        }
    }
}

/// A resident node in the in-memory block graph: the wire block, its
/// derived auxiliary state, and an owned link to its parent.
///
/// The parent link (`prior`) is the sole field that changes after
/// construction, guarded by [`crate::graph::PRIOR_LOCK`] exactly as the
/// original source guards its one mutable "prior block" pointer with a
/// single global spinlock rather than one lock per node.
pub struct BlockNode {
    pub block: Block,
    pub aux: BlockAux,
    pub prior: parking_lot::Mutex<Option<std::sync::Arc<BlockNode>>>,
}

impl BlockNode {
    pub fn oid(&self) -> Oid {
        self.aux.oid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(level: u64, witness: u8) -> BlockWireHeader {
        BlockWireHeader {
            prior_oid: Oid(Hash256([0u8; 32])),
            level,
            timestamp: 1_700_000_000,
            witness,
            next_signing_public_key: None,
            transactions: vec![],
        }
    }

    #[test]
    fn oid_is_deterministic_for_identical_blocks() {
        let b1 = Block { header: header(1, 3), signature: BlockSignature([7u8; 64]) };
        let b2 = Block { header: header(1, 3), signature: BlockSignature([7u8; 64]) };
        assert_eq!(b1.oid(), b2.oid());
    }

    #[test]
    fn oid_changes_with_level() {
        let b1 = Block { header: header(1, 3), signature: BlockSignature([7u8; 64]) };
        let b2 = Block { header: header(2, 3), signature: BlockSignature([7u8; 64]) };
        assert_ne!(b1.oid(), b2.oid());
    }

    #[test]
    fn conf_sigs_formulas_match_spec_vectors() {
        // 11 witnesses, maxmal = 0: nconfsigs = (11-0)/2 + 0 + 1 = 6 (integer division).
        let p = BlockchainParams::with_conf_sigs(11, 0, 11, 0);
        assert_eq!(p.nconfsigs, 6);
        assert_eq!(p.nskipconfsigs, 11);
        assert_eq!(p.nseqconfsigs, p.nconfsigs);

        // maxmal > 0: nseqconfsigs tracks nskipconfsigs instead.
        let p2 = BlockchainParams::with_conf_sigs(11, 2, 11, 2);
        assert_eq!(p2.nconfsigs, (11 - 2) / 2 + 2 + 1);
        assert_eq!(p2.nskipconfsigs, 13);
        assert_eq!(p2.nseqconfsigs, p2.nskipconfsigs);
    }

    #[test]
    fn conf_sigs_are_clamped_to_max() {
        let p = BlockchainParams::with_conf_sigs(21, 20, 21, 20);
        assert!(p.nconfsigs <= MAX_NCONFSIGS);
        assert!(p.nskipconfsigs <= MAX_NCONFSIGS);
        assert!(p.nseqconfsigs <= MAX_NCONFSIGS);
    }
}

//! Core domain types shared across the chain.
//!
//! This module defines strongly-typed hashes, object identifiers, and
//! witness key material. The goal is to avoid "naked" byte buffers in
//! public APIs and instead use domain-specific newtypes, the same way the
//! rest of this crate does for every other wire-visible value.

use serde::{Deserialize, Serialize};

pub mod block;
pub mod tx;

pub use block::{Block, BlockAux, BlockNode, BlockWireHeader, BlockchainParams};
pub use tx::{Transaction, TxKind};

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Length in bytes of a [`BlockHash`].
pub const BLOCK_HASH_LEN: usize = 64;

/// Maximum number of witnesses in a committee.
pub const MAX_WITNESSES: usize = 21;

/// Strongly-typed 256-bit hash wrapper (BLAKE3-256).
///
/// This is the backing representation for object identifiers, evidence
/// hashes, and serial numbers throughout the chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// Computes a keyed BLAKE3-256 hash, used to derive object identifiers
    /// from a block or transaction's wire representation. Keying separates
    /// the OID hash space from the general-purpose content hash space.
    pub fn compute_keyed(key: &[u8; 32], data: &[u8]) -> Self {
        let h = blake3::keyed_hash(key, data);
        Hash256(*h.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Object identifier: a keyed hash over `(header_tag, content, signature)`.
///
/// Every block and transaction that has been signed is addressed by its
/// `Oid`. Unlike [`BlockHash`], which only covers a block and folds in its
/// ancestry for fork-choice scoring, an `Oid` addresses a single object in
/// isolation and never changes once the object is signed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Oid(pub Hash256);

/// Context key used to derive object identifiers, analogous to a domain
/// separation tag. Distinct from the key used for block hashes so that an
/// `Oid` and a `BlockHash` can never collide even if fed identical bytes.
const OID_CONTEXT_KEY: [u8; 32] = *b"crate-consensus-core/oid-v1-----";

impl Oid {
    pub fn derive(header_tag: u8, content: &[u8], signature: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(1 + content.len() + signature.len());
        buf.push(header_tag);
        buf.extend_from_slice(content);
        buf.extend_from_slice(signature);
        Oid(Hash256::compute_keyed(&OID_CONTEXT_KEY, &buf))
    }

    pub fn as_hash(&self) -> &Hash256 {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 512-bit block hash used for fork-choice comparisons.
///
/// A `BlockHash` is wide enough that its numeric value (interpreted as a
/// big-endian integer) can be compared directly for block matching without
/// a meaningful collision risk across the entire indelible chain, matching
/// the original source's use of a double-width hash for this purpose.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockHash(#[serde(with = "serde_big_array_64")] pub [u8; BLOCK_HASH_LEN]);

impl BlockHash {
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(data);
        let mut out = [0u8; BLOCK_HASH_LEN];
        hasher.finalize_xof().fill(&mut out);
        BlockHash(out)
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_HASH_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockHash({})", hex::encode(self.0))
    }
}

/// Ed25519 public key, wrapped to keep `ed25519_dalek` out of call sites
/// that only need to move key bytes around.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WitnessPublicKey(pub [u8; 32]);

impl WitnessPublicKey {
    pub fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, ed25519_dalek::SignatureError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
    }
}

impl std::fmt::Debug for WitnessPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WitnessPublicKey({})", hex::encode(self.0))
    }
}

/// Detached ed25519 signature over a block's canonical bytes.
#[derive(Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockSignature(#[serde(with = "serde_big_array_64")] pub [u8; 64]);

mod serde_big_array_64 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 64], s: S) -> Result<S::Ok, S::Error> {
        bytes.as_slice().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 64], D::Error> {
        let v = <Vec<u8>>::deserialize(d)?;
        v.try_into()
            .map_err(|v: Vec<u8>| serde::de::Error::invalid_length(v.len(), &"64 bytes"))
    }
}

impl std::fmt::Debug for BlockSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockSignature({})", hex::encode(self.0))
    }
}

impl BlockSignature {
    pub fn to_dalek(&self) -> ed25519_dalek::Signature {
        ed25519_dalek::Signature::from_bytes(&self.0)
    }

    pub fn from_dalek(sig: &ed25519_dalek::Signature) -> Self {
        BlockSignature(sig.to_bytes())
    }
}

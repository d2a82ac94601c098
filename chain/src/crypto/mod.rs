//! Block signing and verification.
//!
//! A block is signed over a cumulative hash rather than its raw bytes:
//! `d = H(prior_block_hash || this.block_hash)`, optionally folding in the
//! next signing key when rotation is enabled. This ties every signature to
//! the whole chain of block hashes behind it, not just the block's own
//! content, so a signature cannot be replayed onto a block with identical
//! content but a different ancestor.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

use crate::types::block::BlockchainParams;
use crate::types::{BlockHash, BlockSignature, WitnessPublicKey};

/// Whether the next-signing-key-rotation field is folded into the
/// cumulative signing hash. A production deployment that never rotates
/// keys within a witness's term leaves this off.
pub const ROTATE_BLOCK_SIGNING_KEYS: bool = false;

#[derive(Debug)]
pub enum CryptoError {
    WitnessOutOfRange { witness: u8, next_nwitnesses: u8 },
    UnknownSigningKey(u8),
    BadSignature(ed25519_dalek::SignatureError),
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CryptoError::WitnessOutOfRange { witness, next_nwitnesses } => write!(
                f,
                "witness index {witness} is not below prior's next_nwitnesses {next_nwitnesses}"
            ),
            CryptoError::UnknownSigningKey(w) => write!(f, "no signing key on record for witness {w}"),
            CryptoError::BadSignature(e) => write!(f, "signature verification failed: {e}"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Builds the cumulative hash `d` a block's signature is computed over.
pub fn cumulative_signing_hash(
    prior_block_hash: &BlockHash,
    this_block_hash: &BlockHash,
    next_signing_public_key: Option<&WitnessPublicKey>,
) -> BlockHash {
    let mut buf = Vec::with_capacity(128 + 32);
    buf.extend_from_slice(prior_block_hash.as_bytes());
    buf.extend_from_slice(this_block_hash.as_bytes());
    let d = BlockHash::compute(&buf);

    if ROTATE_BLOCK_SIGNING_KEYS {
        if let Some(key) = next_signing_public_key {
            let mut buf2 = Vec::with_capacity(64 + 32);
            buf2.extend_from_slice(d.as_bytes());
            buf2.extend_from_slice(&key.0);
            return BlockHash::compute(&buf2);
        }
    }

    d
}

/// Signs the cumulative hash with the witness's private key.
pub fn sign_block(
    signing_key: &SigningKey,
    prior_block_hash: &BlockHash,
    this_block_hash: &BlockHash,
    next_signing_public_key: Option<&WitnessPublicKey>,
) -> BlockSignature {
    let d = cumulative_signing_hash(prior_block_hash, this_block_hash, next_signing_public_key);
    let sig = signing_key.sign(d.as_bytes());
    BlockSignature::from_dalek(&sig)
}

/// Verifies a block's signature against the public key recorded at index
/// `witness` in the *prior* block's committee, enforcing
/// `witness < prior.next_nwitnesses`.
pub fn verify_block_signature(
    witness: u8,
    prior_params: &BlockchainParams,
    prior_signing_keys: &[WitnessPublicKey],
    prior_block_hash: &BlockHash,
    this_block_hash: &BlockHash,
    next_signing_public_key: Option<&WitnessPublicKey>,
    signature: &BlockSignature,
) -> Result<(), CryptoError> {
    if witness >= prior_params.next_nwitnesses {
        return Err(CryptoError::WitnessOutOfRange { witness, next_nwitnesses: prior_params.next_nwitnesses });
    }

    let key_bytes = prior_signing_keys
        .get(witness as usize)
        .ok_or(CryptoError::UnknownSigningKey(witness))?;

    let verifying_key = key_bytes
        .to_verifying_key()
        .map_err(CryptoError::BadSignature)?;

    let d = cumulative_signing_hash(prior_block_hash, this_block_hash, next_signing_public_key);

    verifying_key
        .verify(d.as_bytes(), &signature.to_dalek())
        .map_err(CryptoError::BadSignature)
}

/// Derives a [`WitnessPublicKey`] from a [`VerifyingKey`], for assembling
/// committee key tables from freshly generated keys in tests and the
/// witness builder.
pub fn public_key_of(signing_key: &SigningKey) -> WitnessPublicKey {
    WitnessPublicKey(VerifyingKey::from(signing_key).to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn params() -> BlockchainParams {
        BlockchainParams::with_conf_sigs(11, 0, 11, 0)
    }

    #[test]
    fn round_trip_sign_and_verify() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let pub_key = public_key_of(&signing_key);

        let prior_hash = BlockHash::compute(b"prior");
        let this_hash = BlockHash::compute(b"this");

        let sig = sign_block(&signing_key, &prior_hash, &this_hash, None);

        let result = verify_block_signature(0, &params(), &[pub_key], &prior_hash, &this_hash, None, &sig);
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_witness_at_or_beyond_next_nwitnesses() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let pub_key = public_key_of(&signing_key);
        let prior_hash = BlockHash::compute(b"prior");
        let this_hash = BlockHash::compute(b"this");
        let sig = sign_block(&signing_key, &prior_hash, &this_hash, None);

        let mut p = params();
        p.next_nwitnesses = 1;
        let result = verify_block_signature(1, &p, &[pub_key, pub_key], &prior_hash, &this_hash, None, &sig);
        assert!(matches!(result, Err(CryptoError::WitnessOutOfRange { .. })));
    }

    #[test]
    fn rejects_signature_over_wrong_ancestor() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let pub_key = public_key_of(&signing_key);
        let prior_hash = BlockHash::compute(b"prior");
        let this_hash = BlockHash::compute(b"this");
        let wrong_prior_hash = BlockHash::compute(b"wrong-prior");

        let sig = sign_block(&signing_key, &prior_hash, &this_hash, None);

        let result = verify_block_signature(0, &params(), &[pub_key], &wrong_prior_hash, &this_hash, None, &sig);
        assert!(result.is_err());
    }
}

//! Block validator: the nine-step pipeline a received block passes through
//! before it is admitted to the resident graph and handed to the indelible
//! promotion engine.
//!
//! Unlike the transaction validator pool this is a single worker, matching
//! the original design: block admission order must be serialized because
//! later steps (the tentative-spend set, the prior-chaining of
//! `blockchain_params`) depend on the outcome of earlier blocks.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::crypto::{self, CryptoError};
use crate::graph::BlockGraph;
use crate::indelible::{self, IndelibleSerialTable};
use crate::mint::{self, MintWindowConfig, MintWindowViolation};
use crate::score::check_bad_sig_order;
use crate::storage::IndelibleStore;
use crate::txvalidate::{ProofVerifier, TxResult, TxValidatorPool};
use crate::types::block::{Block, BlockAux, BlockNode, BlockchainParams};
use crate::types::{BlockHash, Hash256, Oid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Valid,
    Invalid,
    Hold,
    Skipped,
}

#[derive(Debug)]
pub enum BlockValidationError {
    MissingPrior(Oid),
    BadSigOrder,
    Crypto(CryptoError),
    ClockSkew { block_timestamp: u64, local_timestamp: u64 },
    DoubleSpendWithinBlock(Hash256),
    DoubleSpendAgainstIndelible(Hash256),
    TxRejected,
    OidMismatch,
    MintWindow(MintWindowViolation),
}

impl std::fmt::Display for BlockValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockValidationError::MissingPrior(oid) => write!(f, "prior block {oid} not yet valid"),
            BlockValidationError::BadSigOrder => write!(f, "witness signed out of order"),
            BlockValidationError::Crypto(e) => write!(f, "{e}"),
            BlockValidationError::ClockSkew { block_timestamp, local_timestamp } => write!(
                f,
                "block timestamp {block_timestamp} is too far ahead of local time {local_timestamp}"
            ),
            BlockValidationError::DoubleSpendWithinBlock(sn) => write!(f, "serial number {sn} spent twice within block"),
            BlockValidationError::DoubleSpendAgainstIndelible(sn) => write!(f, "serial number {sn} already indelible"),
            BlockValidationError::TxRejected => write!(f, "a transaction in this block failed validation"),
            BlockValidationError::OidMismatch => write!(f, "declared object does not byte-match its validated form"),
            BlockValidationError::MintWindow(v) => write!(f, "mint-window violation: {v:?}"),
        }
    }
}

impl std::error::Error for BlockValidationError {}

/// Tunables that would otherwise be read from a persisted parameter set.
#[derive(Clone, Copy, Debug)]
pub struct BlockValidationConfig {
    pub prune_horizon_level: u64,
    pub block_future_tolerance_secs: u64,
    pub mint: MintWindowConfig,
}

impl Default for BlockValidationConfig {
    fn default() -> Self {
        BlockValidationConfig { prune_horizon_level: 0, block_future_tolerance_secs: 60, mint: MintWindowConfig::default() }
    }
}

pub struct BlockValidator<V: ProofVerifier> {
    graph: Arc<BlockGraph>,
    tx_pool: Arc<TxValidatorPool<V>>,
    config: BlockValidationConfig,
    /// Indelible serial numbers already spent, consulted at step 6. A
    /// process-wide cache in front of `storage`, shared with the rest of
    /// the node through [`crate::context::NodeContext`] so a restart
    /// rehydrates double-spend protection from the persisted store rather
    /// than from this in-memory table alone.
    indelible_serials: Arc<IndelibleSerialTable>,
    storage: Arc<dyn IndelibleStore>,
}

impl<V: ProofVerifier> BlockValidator<V> {
    pub fn new(
        graph: Arc<BlockGraph>,
        tx_pool: Arc<TxValidatorPool<V>>,
        config: BlockValidationConfig,
        indelible_serials: Arc<IndelibleSerialTable>,
        storage: Arc<dyn IndelibleStore>,
    ) -> Self {
        BlockValidator { graph, tx_pool, config, indelible_serials, storage }
    }

    pub fn mark_indelible_serial(&self, sn: Hash256) {
        self.indelible_serials.insert(sn);
        self.storage.put_serialnum(sn);
    }

    /// Runs the full pipeline for one received block. Returns the resident
    /// node on success so the caller can insert it into the graph and run
    /// indelible promotion.
    pub fn validate(&self, block: Block) -> Result<(Arc<BlockNode>, BlockStatus), BlockValidationError> {
        let header = &block.header;

        // Step 1: prune-horizon skip.
        if header.level < self.config.prune_horizon_level {
            let oid = block.oid();
            let block_hash = BlockHash::compute(&block.canonical_bytes());
            let aux = BlockAux::new(oid, block_hash, header.level, header.witness, 0, BlockchainParams::with_conf_sigs(0, 0, 0, 0), vec![]);
            let node = Arc::new(BlockNode { block, aux, prior: parking_lot::Mutex::new(None) });
            return Ok((node, BlockStatus::Skipped));
        }

        // Step 2: prior must already be resident and valid. An honestly
        // out-of-order block — one whose prior simply hasn't arrived yet —
        // is held for a later retry rather than rejected outright.
        let Some(prior) = self.graph.get(&header.prior_oid) else {
            let oid = block.oid();
            let block_hash = BlockHash::compute(&block.canonical_bytes());
            let aux = BlockAux::new(oid, block_hash, header.level, header.witness, 0, BlockchainParams::with_conf_sigs(0, 0, 0, 0), vec![]);
            let node = Arc::new(BlockNode { block, aux, prior: parking_lot::Mutex::new(None) });
            return Ok((node, BlockStatus::Hold));
        };

        // Step 3: chain to prior — inherit committee parameters.
        let skip_value = crate::score::skip(prior.aux.witness, header.witness, prior.aux.params.nwitnesses);
        let params = BlockchainParams::with_conf_sigs(
            prior.aux.params.next_nwitnesses,
            prior.aux.params.next_maxmal,
            prior.aux.params.next_nwitnesses,
            prior.aux.params.next_maxmal,
        );

        let block_hash = BlockHash::compute(&block.canonical_bytes());
        let oid = block.oid();

        let aux = BlockAux::new(oid, block_hash, header.level, header.witness, skip_value, params, prior.aux.signing_keys.clone());
        let node = Arc::new(BlockNode { block, aux, prior: parking_lot::Mutex::new(Some(Arc::clone(&prior))) });

        // Step 3b: mint-window gate. While this level is still within the
        // configured mint-only bootstrap window, only a single Mint
        // transaction per witness is admitted. Checked ahead of signature
        // verification since it depends only on block content.
        let tx_kinds: Vec<_> = node.block.header.transactions.iter().map(|tx| tx.kind.clone()).collect();
        mint::check_mint_window(&self.config.mint, node.aux.level, &tx_kinds).map_err(BlockValidationError::MintWindow)?;

        // Step 4: sig order + ed25519 verification.
        if check_bad_sig_order(&node, None).map_err(|_| BlockValidationError::BadSigOrder)? {
            return Err(BlockValidationError::BadSigOrder);
        }

        crypto::verify_block_signature(
            node.aux.witness,
            &prior.aux.params,
            &prior.aux.signing_keys,
            &prior.aux.block_hash,
            &node.aux.block_hash,
            node.block.header.next_signing_public_key.as_ref(),
            &node.block.signature,
        )
        .map_err(BlockValidationError::Crypto)?;

        // Step 5: clock skew.
        let local_now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        if node.block.header.timestamp > local_now + self.config.block_future_tolerance_secs {
            return Err(BlockValidationError::ClockSkew { block_timestamp: node.block.header.timestamp, local_timestamp: local_now });
        }

        // Step 6: tentative-spend set + enqueue block transactions.
        let mut tentative = std::collections::HashSet::new();
        for tx in &node.block.header.transactions {
            for sn in &tx.serial_numbers {
                if self.indelible_serials.contains(sn) || self.storage.contains_serialnum(sn) {
                    return Err(BlockValidationError::DoubleSpendAgainstIndelible(*sn));
                }
                if !tentative.insert(*sn) {
                    return Err(BlockValidationError::DoubleSpendWithinBlock(*sn));
                }
            }
        }

        for tx in node.block.header.transactions.clone() {
            self.tx_pool.enqueue(tx, true, 0);
        }

        // Step 7: wait for all block-tx validations.
        let tx_results = self.tx_pool.wait_for_block_tx_validation();

        // Step 8: any enclosed transaction that came back as anything other
        // than an accepted result marks the whole block invalid — a
        // failing ZK proof, insufficient donation, or a stop-grade error
        // from one transaction condemns the block that carried it.
        if tx_results.iter().any(|r| !matches!(r, TxResult::Ok | TxResult::Resubmission)) {
            return Err(BlockValidationError::TxRejected);
        }

        // Step 9: admit to the graph and attempt to advance the indelible
        // tip past it.
        self.graph.insert(Arc::clone(&node));
        self.promote_indelible();

        Ok((node, BlockStatus::Valid))
    }

    /// Walks forward from the current last-indelible tip looking for a
    /// newly-confirmed block, and if one is found, writes its spent serial
    /// numbers and output commitments through to `storage` in one pass
    /// before advancing the graph's last-indelible tip.
    fn promote_indelible(&self) {
        let Some(from) = self.graph.last_indelible_values().block else { return };
        let candidates = self.graph.residents();

        let Some(next) = indelible::find_next_indelible(&self.graph, &from, &candidates) else { return };

        for tx in &next.block.header.transactions {
            for sn in &tx.serial_numbers {
                self.indelible_serials.insert(*sn);
                self.storage.put_serialnum(*sn);
            }
            for commitment in &tx.output_commitments {
                self.storage.put_commitment(*commitment);
            }
        }

        self.storage.put_block(&next.block);
        self.storage.set_tip(next.oid());

        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        self.graph.set_last_indelible(Arc::clone(&next), timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryIndelibleStore;
    use crate::types::{BlockSignature, BlockWireHeader};

    struct AlwaysTrue;
    impl ProofVerifier for AlwaysTrue {
        fn verify(&self, _p: &[u8], _i: &[u8]) -> bool {
            true
        }
    }

    struct AlwaysFalse;
    impl ProofVerifier for AlwaysFalse {
        fn verify(&self, _p: &[u8], _i: &[u8]) -> bool {
            false
        }
    }

    fn new_validator<V: ProofVerifier>(
        graph: Arc<BlockGraph>,
        pool: Arc<TxValidatorPool<V>>,
        config: BlockValidationConfig,
    ) -> BlockValidator<V> {
        BlockValidator::new(graph, pool, config, Arc::new(IndelibleSerialTable::default()), Arc::new(InMemoryIndelibleStore::new()))
    }

    /// Builds a genesis node with a real signing key on record, for tests
    /// that need to pass actual signature verification rather than stop at
    /// the mint-window gate.
    fn genesis_with_key() -> (Arc<BlockNode>, ed25519_dalek::SigningKey) {
        use rand::rngs::OsRng;

        let signing_key = ed25519_dalek::SigningKey::generate(&mut OsRng);
        let pub_key = crate::crypto::public_key_of(&signing_key);

        let header = BlockWireHeader {
            prior_oid: Oid(Hash256([0u8; 32])),
            level: 0,
            timestamp: 0,
            witness: 0,
            next_signing_public_key: None,
            transactions: vec![],
        };
        let block = Block { header, signature: BlockSignature([0u8; 64]) };
        let oid = block.oid();
        let block_hash = BlockHash::compute(&block.canonical_bytes());
        let params = BlockchainParams::with_conf_sigs(1, 0, 1, 0);
        let aux = BlockAux::new(oid, block_hash, 0, 0, 0, params, vec![pub_key]);
        let node = Arc::new(BlockNode { block, aux, prior: parking_lot::Mutex::new(None) });
        (node, signing_key)
    }

    /// Signs a child of `parent` with `signing_key`, mirroring
    /// `WitnessBuilder::build_block`'s header-then-signature construction.
    fn sign_child(
        signing_key: &ed25519_dalek::SigningKey,
        parent: &Arc<BlockNode>,
        witness: u8,
        transactions: Vec<crate::types::tx::Transaction>,
    ) -> Block {
        let header = BlockWireHeader {
            prior_oid: parent.oid(),
            level: parent.aux.level + 1,
            timestamp: 0,
            witness,
            next_signing_public_key: None,
            transactions,
        };
        let this_block_hash = BlockHash::compute(
            &bincode::serde::encode_to_vec(&header, bincode::config::standard()).expect("header encoding is infallible"),
        );
        let signature = crypto::sign_block(signing_key, &parent.aux.block_hash, &this_block_hash, None);
        Block { header, signature }
    }

    fn genesis_node() -> Arc<BlockNode> {
        let header = BlockWireHeader {
            prior_oid: Oid(Hash256([0u8; 32])),
            level: 0,
            timestamp: 0,
            witness: 0,
            next_signing_public_key: None,
            transactions: vec![],
        };
        let block = Block { header, signature: BlockSignature([0u8; 64]) };
        let oid = block.oid();
        let block_hash = BlockHash::compute(&block.canonical_bytes());
        let params = BlockchainParams::with_conf_sigs(1, 0, 1, 0);
        let aux = BlockAux::new(oid, block_hash, 0, 0, 0, params, vec![]);
        Arc::new(BlockNode { block, aux, prior: parking_lot::Mutex::new(None) })
    }

    #[test]
    fn missing_prior_yields_hold_error() {
        let graph = Arc::new(BlockGraph::new());
        let pool = Arc::new(TxValidatorPool::start(1, Default::default(), Arc::new(AlwaysTrue)));
        let validator = new_validator(graph, pool, Default::default());

        let header = BlockWireHeader {
            prior_oid: Oid(Hash256([9u8; 32])),
            level: 1,
            timestamp: 0,
            witness: 0,
            next_signing_public_key: None,
            transactions: vec![],
        };
        let block = Block { header, signature: BlockSignature([0u8; 64]) };

        let (_node, status) = validator.validate(block).unwrap();
        assert_eq!(status, BlockStatus::Hold);
    }

    #[test]
    fn block_below_prune_horizon_is_skipped() {
        let graph = Arc::new(BlockGraph::new());
        let pool = Arc::new(TxValidatorPool::start(1, Default::default(), Arc::new(AlwaysTrue)));
        let config = BlockValidationConfig { prune_horizon_level: 100, block_future_tolerance_secs: 60, mint: MintWindowConfig::default() };
        let validator = new_validator(graph, pool, config);

        let header = BlockWireHeader {
            prior_oid: Oid(Hash256([0u8; 32])),
            level: 1,
            timestamp: 0,
            witness: 0,
            next_signing_public_key: None,
            transactions: vec![],
        };
        let block = Block { header, signature: BlockSignature([0u8; 64]) };

        let (_node, status) = validator.validate(block).unwrap();
        assert_eq!(status, BlockStatus::Skipped);
    }

    #[test]
    fn genesis_helper_builds_a_usable_node() {
        let g = genesis_node();
        assert_eq!(g.aux.level, 0);
    }

    #[test]
    fn non_mint_tx_rejected_while_mint_window_open() {
        let graph = Arc::new(BlockGraph::new());
        graph.insert(genesis_node());
        let pool = Arc::new(TxValidatorPool::start(1, Default::default(), Arc::new(AlwaysTrue)));
        let config = BlockValidationConfig {
            mint: crate::mint::MintWindowConfig { mint_count: 10, enabled: true },
            ..Default::default()
        };
        let validator = new_validator(graph, pool, config);

        let tx = crate::types::tx::Transaction {
            kind: crate::types::tx::TxKind::Payment,
            expiration: 0,
            donation: 10_000,
            serial_numbers: vec![],
            output_commitments: vec![],
            proof: vec![1],
            public_inputs: vec![1],
        };
        let header = BlockWireHeader {
            prior_oid: genesis_node().oid(),
            level: 1,
            timestamp: 0,
            witness: 0,
            next_signing_public_key: None,
            transactions: vec![tx],
        };
        let block = Block { header, signature: BlockSignature([0u8; 64]) };

        let result = validator.validate(block);
        assert!(matches!(result, Err(BlockValidationError::MintWindow(MintWindowViolation::NonMintDuringMintWindow))));
    }

    #[test]
    fn block_with_underfunded_tx_is_rejected() {
        let (genesis, signing_key) = genesis_with_key();
        let graph = Arc::new(BlockGraph::new());
        graph.insert(Arc::clone(&genesis));
        graph.set_last_indelible(Arc::clone(&genesis), 0);

        let pool = Arc::new(TxValidatorPool::start(1, Default::default(), Arc::new(AlwaysTrue)));
        let validator = new_validator(graph, pool, Default::default());

        let tx = crate::types::tx::Transaction {
            kind: crate::types::tx::TxKind::Payment,
            expiration: 0,
            donation: 1,
            serial_numbers: vec![],
            output_commitments: vec![],
            proof: vec![1],
            public_inputs: vec![1],
        };
        let block = sign_child(&signing_key, &genesis, 0, vec![tx]);

        let result = validator.validate(block);
        assert!(matches!(result, Err(BlockValidationError::TxRejected)));
    }

    #[test]
    fn block_with_unverifiable_proof_is_rejected() {
        let (genesis, signing_key) = genesis_with_key();
        let graph = Arc::new(BlockGraph::new());
        graph.insert(Arc::clone(&genesis));
        graph.set_last_indelible(Arc::clone(&genesis), 0);

        let pool = Arc::new(TxValidatorPool::start(1, Default::default(), Arc::new(AlwaysFalse)));
        let validator = new_validator(graph, pool, Default::default());

        let tx = crate::types::tx::Transaction {
            kind: crate::types::tx::TxKind::Payment,
            expiration: 0,
            donation: 1_000_000,
            serial_numbers: vec![],
            output_commitments: vec![],
            proof: vec![1],
            public_inputs: vec![1],
        };
        let block = sign_child(&signing_key, &genesis, 0, vec![tx]);

        let result = validator.validate(block);
        assert!(matches!(result, Err(BlockValidationError::TxRejected)));
    }

    #[test]
    fn double_spend_against_persisted_serial_is_rejected() {
        let (genesis, signing_key) = genesis_with_key();
        let graph = Arc::new(BlockGraph::new());
        graph.insert(Arc::clone(&genesis));
        graph.set_last_indelible(Arc::clone(&genesis), 0);

        let sn = Hash256([5u8; 32]);
        let storage: Arc<dyn IndelibleStore> = Arc::new(InMemoryIndelibleStore::new());
        storage.put_serialnum(sn);

        let pool = Arc::new(TxValidatorPool::start(1, Default::default(), Arc::new(AlwaysTrue)));
        let validator = BlockValidator::new(graph, pool, Default::default(), Arc::new(IndelibleSerialTable::default()), storage);

        let tx = crate::types::tx::Transaction {
            kind: crate::types::tx::TxKind::Payment,
            expiration: 0,
            donation: 1_000_000,
            serial_numbers: vec![sn],
            output_commitments: vec![],
            proof: vec![1],
            public_inputs: vec![1],
        };
        let block = sign_child(&signing_key, &genesis, 0, vec![tx]);

        let result = validator.validate(block);
        assert!(matches!(result, Err(BlockValidationError::DoubleSpendAgainstIndelible(_))));
    }

    #[test]
    fn confirmed_blocks_advance_the_indelible_tip_and_persist_it() {
        let (genesis, signing_key) = genesis_with_key();
        let graph = Arc::new(BlockGraph::new());
        graph.insert(Arc::clone(&genesis));
        graph.set_last_indelible(Arc::clone(&genesis), 0);

        let pool = Arc::new(TxValidatorPool::start(1, Default::default(), Arc::new(AlwaysTrue)));
        let storage: Arc<dyn IndelibleStore> = Arc::new(InMemoryIndelibleStore::new());
        let validator = BlockValidator::new(
            Arc::clone(&graph),
            pool,
            Default::default(),
            Arc::new(IndelibleSerialTable::default()),
            Arc::clone(&storage),
        );

        let level1 = sign_child(&signing_key, &genesis, 0, vec![]);
        let (level1_node, status1) = validator.validate(level1).unwrap();
        assert_eq!(status1, BlockStatus::Valid);
        // A single-level extension confirms nothing yet: genesis is still
        // the last-indelible tip.
        assert_eq!(graph.last_indelible_level(), 0);

        let level2 = sign_child(&signing_key, &level1_node, 0, vec![]);
        let (_level2_node, status2) = validator.validate(level2).unwrap();
        assert_eq!(status2, BlockStatus::Valid);

        // `level1` now has one confirming descendant, meeting the
        // single-witness committee's required confirmation count.
        assert_eq!(graph.last_indelible_level(), 1);
        assert_eq!(graph.last_indelible_values().block.unwrap().oid(), level1_node.oid());
        assert_eq!(storage.tip(), Some(level1_node.oid()));
    }
}

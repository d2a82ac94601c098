//! Witness builder: the optional role of assembling and signing new
//! blocks. Rather than always extending a single stored tip, it runs the
//! skip-score engine over every resident branch and builds on whichever
//! scores highest — the `FindBestBuildingBlock` behavior this chain's
//! fork choice requires instead of a simple longest-chain rule.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_dalek::SigningKey;

use crate::crypto;
use crate::graph::BlockGraph;
use crate::score::{calc_skip_score, check_bad_sig_order};
use crate::types::block::{Block, BlockWireHeader, BlockchainParams};
use crate::types::tx::Transaction;
use crate::types::BlockNode;

/// Selects transactions to include in the next block. Consensus does not
/// care how transactions are stored or gossiped; it only needs a batch
/// that fits the given soft limits.
pub trait TxPool {
    fn select_for_block(&mut self, max_txs: usize, max_bytes: usize) -> Vec<Transaction>;
}

#[derive(Clone, Debug)]
pub struct WitnessBuilderConfig {
    pub witness_index: u8,
    pub max_block_txs: usize,
    pub max_block_size_bytes: usize,
    pub allow_empty_blocks: bool,
}

pub struct WitnessBuilder {
    config: WitnessBuilderConfig,
    signing_key: SigningKey,
    /// Highest level this witness has already built a block on top of.
    /// Candidates at or below this level are never worth building on
    /// again: this witness has already moved past them.
    highest_witnessed_level: std::sync::atomic::AtomicU64,
}

impl WitnessBuilder {
    pub fn new(config: WitnessBuilderConfig, signing_key: SigningKey) -> Self {
        WitnessBuilder { config, signing_key, highest_witnessed_level: std::sync::atomic::AtomicU64::new(0) }
    }

    /// Finds the resident block with the highest skip-score relative to
    /// the current last-indelible tip, assuming this witness extends it
    /// next — the branch this witness should actually build on.
    ///
    /// Skips any candidate that would make this witness sign out of order
    /// (`check_bad_sig_order` with this witness as the hypothetical next
    /// signer) and any candidate at or below the highest level this witness
    /// has already built on, matching `FindBestBuildingBlock`'s candidate
    /// filters.
    pub fn find_best_building_block<'a>(
        &self,
        graph: &BlockGraph,
        resident: &'a [Arc<BlockNode>],
    ) -> Option<&'a Arc<BlockNode>> {
        let last_indelible = graph.last_indelible_values().block?;
        let floor = self.highest_witnessed_level.load(std::sync::atomic::Ordering::Acquire);

        resident
            .iter()
            .filter(|node| node.aux.level >= floor)
            .filter(|node| !check_bad_sig_order(node, Some(self.config.witness_index)).unwrap_or(true))
            .map(|node| {
                let score = calc_skip_score(node, Some(self.config.witness_index), &last_indelible, 0, false);
                (node, score)
            })
            .max_by_key(|(_, score)| *score)
            .map(|(node, _)| node)
    }

    /// Builds and signs a new block on top of `parent`, or returns `None`
    /// if the selected transactions are empty and this builder is not
    /// configured to produce empty blocks.
    pub fn build_block<P: TxPool>(&self, parent: &Arc<BlockNode>, tx_pool: &mut P) -> Option<Block> {
        let txs = tx_pool.select_for_block(self.config.max_block_txs, self.config.max_block_size_bytes);
        if txs.is_empty() && !self.config.allow_empty_blocks {
            return None;
        }

        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let level = parent.aux.level + 1;

        let header = BlockWireHeader {
            prior_oid: parent.oid(),
            level,
            timestamp,
            witness: self.config.witness_index,
            next_signing_public_key: None,
            transactions: txs,
        };

        let this_block_hash = crate::types::BlockHash::compute(
            &bincode::serde::encode_to_vec(&header, bincode::config::standard()).expect("header encoding is infallible"),
        );

        let signature = crypto::sign_block(&self.signing_key, &parent.aux.block_hash, &this_block_hash, None);

        self.highest_witnessed_level.store(level, std::sync::atomic::Ordering::Release);

        Some(Block { header, signature })
    }

    /// Derives the committee parameters the next block built here would
    /// inherit, matching the block validator's own chain-to-prior step so
    /// a witness never builds a block its own peers would reject.
    pub fn next_params(&self, parent: &Arc<BlockNode>) -> BlockchainParams {
        BlockchainParams::with_conf_sigs(
            parent.aux.params.next_nwitnesses,
            parent.aux.params.next_maxmal,
            parent.aux.params.next_nwitnesses,
            parent.aux.params.next_maxmal,
        )
    }
}

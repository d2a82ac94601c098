//! Consensus core of a permissioned witness-committee node.
//!
//! This crate implements the in-memory block DAG, the witness skip-score
//! fork-choice rule, block signing/verification, the transaction and block
//! validation pipelines, indelible promotion, the relay gossip service, the
//! block-sync catch-up client, expiry/pruning, and the optional witness
//! builder role. The zero-knowledge proof system, the embedded persistent
//! KV store's internals, CLI/config parsing, transport bootstrap, and
//! wallet/exchange/foreign-chain logic are treated as external
//! collaborators reached only through the trait seams this crate defines
//! (`txvalidate::ProofVerifier`, `storage::IndelibleStore`).
//!
//! Module map, leaves first:
//!
//! - [`types`]: OIDs, hashes, the block/transaction wire formats, and the
//!   non-wire `BlockAux` state attached to every resident block.
//! - [`crypto`]: ed25519 block signing and verification over the
//!   cumulative block-hash chain.
//! - [`graph`]: the resident block DAG and the last-indelible tip.
//! - [`score`]: the skip/skip-score fork-choice engine and the
//!   signature-order check.
//! - [`txvalidate`]: the transaction validator worker pool.
//! - [`blockvalidate`]: the single-worker block validation pipeline.
//! - [`indelible`]: walking newly valid blocks forward into permanent
//!   confirmation.
//! - [`relay`]: peer gossip admission/back-pressure state.
//! - [`blocksync`]: the historical block-range catch-up work list.
//! - [`expire`]: transaction expiry and block prune-horizon calculations.
//! - [`witness`]: the optional block-producing role.
//! - [`wire`]: wire tags and message shapes shared by relay/block-sync.
//! - [`genesis`]: reading the fixed genesis file.
//! - [`mint`]: the feature-gated mint-only bootstrap window.
//! - [`storage`]: the `IndelibleStore` trait plus in-memory and RocksDB
//!   backends.
//! - [`metrics`]: Prometheus metrics and HTTP exporter.
//! - [`config`]: the top-level `NodeConfig` assembled from defaults.

pub mod blocksync;
pub mod blockvalidate;
pub mod config;
pub mod context;
pub mod crypto;
pub mod expire;
pub mod genesis;
pub mod graph;
pub mod indelible;
pub mod metrics;
pub mod mint;
pub mod relay;
pub mod score;
pub mod storage;
pub mod txvalidate;
pub mod types;
pub mod wire;
pub mod witness;

// Re-export the domain types at the crate root, the same way every other
// module in this crate reaches them.
pub use types::*;

// Re-export the pieces most call sites outside this crate need without
// reaching into submodules.
pub use blockvalidate::{BlockStatus, BlockValidationConfig, BlockValidationError, BlockValidator};
pub use config::NodeConfig;
pub use context::NodeContext;
pub use graph::BlockGraph;
pub use metrics::{run_prometheus_http_server, ConsensusMetrics, MetricsRegistry};
pub use score::{calc_skip_score, check_bad_sig_order, skip};
pub use storage::{IndelibleStore, InMemoryIndelibleStore, RocksDbIndelibleStore};
pub use txvalidate::{ProofVerifier, TxResult, TxValidatorPool};
pub use witness::{TxPool, WitnessBuilder, WitnessBuilderConfig};

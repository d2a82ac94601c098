//! Top-level configuration for a node.
//!
//! This module aggregates configuration for:
//!
//! - witness-committee / consensus tuning (`WitnessConfig`),
//! - persistent storage (RocksDB path and creation flags),
//! - the transaction validator pool and block validator,
//! - the relay gossip service and block-sync client,
//! - the metrics exporter (enable flag + listen address).
//!
//! CLI/config-file parsing and onion-routing bootstrap are out of scope;
//! a single `NodeConfig` is assembled here from defaults and handed to
//! `main.rs`.

use std::net::SocketAddr;
use std::time::Duration;

use crate::blockvalidate::BlockValidationConfig;
use crate::storage::rocksdb::RocksDbConfig;
use crate::txvalidate::DonationSchedule;

/// Witness-committee parameters a freshly bootstrapped node starts with,
/// before any rotation block changes them.
#[derive(Clone, Debug)]
pub struct WitnessConfig {
    pub nwitnesses: u8,
    pub maxmal: u8,
    /// This node's own witness index, if it runs the optional builder role.
    pub witness_index: Option<u8>,
}

impl Default for WitnessConfig {
    fn default() -> Self {
        WitnessConfig { nwitnesses: 11, maxmal: 0, witness_index: None }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let addr: SocketAddr = "127.0.0.1:9898".parse().expect("hard-coded metrics listen address should parse");
        Self { enabled: true, listen_addr: addr }
    }
}

/// Configuration for the transaction validator pool.
#[derive(Clone, Debug)]
pub struct TxValidationConfig {
    pub worker_count: usize,
    pub donation_schedule: DonationSchedule,
}

impl Default for TxValidationConfig {
    fn default() -> Self {
        TxValidationConfig {
            worker_count: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            donation_schedule: DonationSchedule::default(),
        }
    }
}

/// Configuration for the relay gossip service.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub max_outstanding_sends: usize,
    pub heartbeat: Duration,
    pub timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            max_outstanding_sends: 64,
            heartbeat: crate::relay::RELAY_HEARTBEAT,
            timeout: crate::relay::RELAY_TIMEOUT,
        }
    }
}

/// Top-level configuration for a node.
#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    pub witness: WitnessConfig,
    pub storage: RocksDbConfig,
    pub tx_validation: TxValidationConfig,
    pub block_validation: BlockValidationConfig,
    pub relay: RelayConfig,
    pub metrics: MetricsConfig,
    pub mint: crate::mint::MintWindowConfig,
    /// Path to the fixed genesis file this node reads at startup.
    pub genesis_path: String,
}

impl NodeConfig {
    pub fn with_genesis_path(mut self, path: impl Into<String>) -> Self {
        self.genesis_path = path.into();
        self
    }
}

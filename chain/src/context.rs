//! The node's top-level shared context.
//!
//! Design Note §9 calls out three pieces of genuinely global mutable state
//! in the original source: the last-indelible tip, the proof-key cache, and
//! the fatal-error flag. Rather than reach for `static`s, this crate
//! collects them (plus every other piece of state more than one service
//! needs a handle to) into one `NodeContext` assembled once at startup and
//! threaded into every component by `Arc`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::NodeConfig;
use crate::graph::BlockGraph;
use crate::indelible::IndelibleSerialTable;
use crate::storage::IndelibleStore;

/// Everything a node's services share a handle to.
///
/// `storage` is `dyn` rather than generic so `main.rs` can pick RocksDB in
/// production and an in-memory store in tests without every other field
/// of this struct also becoming generic over the backend.
pub struct NodeContext {
    pub config: NodeConfig,
    pub graph: Arc<BlockGraph>,
    pub indelible_serials: Arc<IndelibleSerialTable>,
    pub storage: Arc<dyn IndelibleStore>,
    /// Set by any service that hits an unrecoverable storage write
    /// failure, which is fatal for the node. Every service checks this at
    /// its suspension points and winds down.
    pub fatal: Arc<AtomicBool>,
    /// Cooperative shutdown signal, independent of `fatal`: set on a clean
    /// operator-requested stop as well as on a fatal error.
    pub shutdown: Arc<AtomicBool>,
}

impl NodeContext {
    pub fn new(config: NodeConfig, storage: Arc<dyn IndelibleStore>) -> Self {
        NodeContext {
            config,
            graph: Arc::new(BlockGraph::new()),
            indelible_serials: Arc::new(IndelibleSerialTable::default()),
            storage,
            fatal: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Marks the node as fatally broken and requests every service to wind
    /// down. Idempotent.
    pub fn mark_fatal(&self, reason: &str) {
        tracing::error!(reason, "node entering fatal state; stopping all services");
        self.fatal.store(true, Ordering::SeqCst);
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.load(Ordering::Acquire)
    }
}

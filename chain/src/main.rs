// src/main.rs
//
// Minimal demo node wiring up the consensus core:
//
// - RocksDB-backed indelible store
// - the resident block graph + skip-score engine
// - a transaction validator pool (proof verification stubbed out: the ZK
//   proof system is an external collaborator)
// - the single-worker block validator
// - a Prometheus metrics exporter on /metrics
// - optionally, the witness builder role, if this node is configured as a
//   witness
//
// CLI/config-file parsing, onion-routing transport bootstrap, and
// directory/rendezvous lookup are out of scope; this binary assembles a
// `NodeConfig` from defaults and an environment-supplied genesis path.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing_subscriber::EnvFilter;

use chain::blockvalidate::BlockValidator;
use chain::config::NodeConfig;
use chain::context::NodeContext;
use chain::genesis;
use chain::metrics::{run_prometheus_http_server, MetricsRegistry};
use chain::storage::{IndelibleStore, RocksDbIndelibleStore};
use chain::txvalidate::{DonationSchedule, ProofVerifier, TxValidatorPool};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(err) = run_node().await {
        tracing::error!(error = %err, "fatal error; node exiting");
        std::process::exit(1);
    }
}

/// Stand-in for the real zero-knowledge proof verifier, which lives outside
/// this crate's scope: `verify(proof, public_inputs) -> bool` is treated
/// as a black box. A production deployment links a real verifier crate in
/// its place.
struct PlaceholderProofVerifier;

impl ProofVerifier for PlaceholderProofVerifier {
    fn verify(&self, proof: &[u8], public_inputs: &[u8]) -> bool {
        !proof.is_empty() && !public_inputs.is_empty()
    }
}

async fn run_node() -> Result<(), Box<dyn std::error::Error>> {
    let config = NodeConfig::default().with_genesis_path(
        std::env::var("CHAIN_GENESIS_PATH").unwrap_or_else(|_| "genesis.dat".to_string()),
    );

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?);

    if config.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = config.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!(error = %e, "metrics HTTP server error");
            }
        });
        tracing::info!(%addr, "metrics exporter listening");
    }

    // ---------------------------
    // Persistent storage (RocksDB)
    // ---------------------------

    let storage: Arc<dyn IndelibleStore> = Arc::new(
        RocksDbIndelibleStore::open(&config.storage)
            .map_err(|e| format!("failed to open RocksDB store at {}: {e}", config.storage.path))?,
    );

    let ctx = Arc::new(NodeContext::new(config, storage));

    // ---------------------------
    // Genesis
    // ---------------------------

    let genesis_path = std::path::Path::new(&ctx.config.genesis_path);
    if genesis_path.exists() {
        let file = genesis::load_genesis_file(genesis_path).map_err(|e| format!("failed to load genesis: {e}"))?;
        let node = genesis::build_genesis_node(&file).map_err(|e| format!("invalid genesis file: {e}"))?;
        ctx.graph.insert(Arc::clone(&node));
        ctx.graph.set_last_indelible(node, current_unix_timestamp());
        tracing::info!(path = %ctx.config.genesis_path, "loaded genesis block");
    } else {
        tracing::warn!(
            path = %ctx.config.genesis_path,
            "no genesis file found; starting with an empty graph (devnet-only)"
        );
    }

    // ---------------------------
    // Transaction validator pool + block validator
    // ---------------------------

    let tx_pool = Arc::new(TxValidatorPool::start(
        ctx.config.tx_validation.worker_count,
        DonationSchedule::default(),
        Arc::new(PlaceholderProofVerifier),
    ));

    let block_validator = Arc::new(BlockValidator::new(
        Arc::clone(&ctx.graph),
        Arc::clone(&tx_pool),
        ctx.config.block_validation.clone(),
        Arc::clone(&ctx.indelible_serials),
        Arc::clone(&ctx.storage),
    ));

    tracing::info!(
        workers = ctx.config.tx_validation.worker_count,
        witness = ?ctx.config.witness.witness_index,
        "node started"
    );

    {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received interrupt; requesting shutdown");
                ctx.request_shutdown();
            }
        });
    }

    // ---------------------------
    // Metrics refresh loop
    // ---------------------------
    //
    // A production node updates these gauges from the components that own
    // the underlying state as events happen; this loop periodically
    // snapshots them so the exporter has something to show even with an
    // otherwise idle graph.

    loop {
        if ctx.is_shutting_down() {
            tracing::info!("shutdown requested; node winding down");
            break;
        }

        let values = ctx.graph.last_indelible_values();
        metrics.consensus.last_indelible_level.set(values.level as i64);
        metrics.consensus.resident_blocks.set(ctx.graph.len() as i64);
        metrics.consensus.tx_validator_queue_depth.set(tx_pool.queue_len() as i64);

        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    drop(block_validator);
    Ok(())
}

fn current_unix_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_else(|_| Duration::from_secs(0)).as_secs()
}

//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed consensus metrics, and an
//! async HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Consensus-related Prometheus metrics.
///
/// These are registered into a [`Registry`] and can be updated from
/// validation, indelible-promotion, relay, and block-sync code.
#[derive(Clone)]
pub struct ConsensusMetrics {
    /// Latency of the full block-validator pipeline (§4.6 steps 1-9), in
    /// seconds.
    pub block_validation_seconds: Histogram,
    /// Latency of a single `calc_skip_score` call, in seconds — the hot
    /// path every fork-choice decision walks.
    pub skip_score_seconds: Histogram,
    /// Blocks rejected by the validator, broken out by the
    /// [`crate::blockvalidate::BlockValidationError`] variant name.
    pub blocks_rejected_total: IntCounterVec,
    /// Transactions rejected by the validator pool, broken out by
    /// [`crate::txvalidate::TxResult`] reason.
    pub txs_rejected_total: IntCounterVec,
    /// Current level of the last-indelible tip.
    pub last_indelible_level: IntGauge,
    /// Number of blocks currently resident in the in-memory graph.
    pub resident_blocks: IntGauge,
    /// Depth of the transaction validator pool's priority queue.
    pub tx_validator_queue_depth: IntGauge,
    /// Number of relay peers currently connected.
    pub relay_peers_connected: IntGauge,
    /// Estimated levels behind the network the block-sync client is
    /// currently working through.
    pub blocksync_lag_levels: Gauge,
    /// Peers dropped by the relay layer for exceeding
    /// `PROCESS_RESULT_STOP_THRESHOLD`.
    pub relay_peers_dropped_total: IntCounter,
}

impl ConsensusMetrics {
    /// Registers consensus metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let block_validation_seconds = Histogram::with_opts(
            HistogramOpts::new("consensus_block_validation_seconds", "Time to run the block-validator pipeline, in seconds")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(block_validation_seconds.clone()))?;

        let skip_score_seconds = Histogram::with_opts(
            HistogramOpts::new("consensus_skip_score_seconds", "Time to compute calc_skip_score for one candidate block, in seconds")
                .buckets(vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]),
        )?;
        registry.register(Box::new(skip_score_seconds.clone()))?;

        let blocks_rejected_total = IntCounterVec::new(
            Opts::new("consensus_blocks_rejected_total", "Total blocks rejected by the block validator, by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(blocks_rejected_total.clone()))?;

        let txs_rejected_total = IntCounterVec::new(
            Opts::new("consensus_txs_rejected_total", "Total transactions rejected by the validator pool, by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(txs_rejected_total.clone()))?;

        let last_indelible_level = IntGauge::with_opts(Opts::new(
            "consensus_last_indelible_level",
            "Level of the last-indelible block this node has confirmed",
        ))?;
        registry.register(Box::new(last_indelible_level.clone()))?;

        let resident_blocks = IntGauge::with_opts(Opts::new(
            "consensus_resident_blocks",
            "Number of blocks currently resident in the in-memory block graph",
        ))?;
        registry.register(Box::new(resident_blocks.clone()))?;

        let tx_validator_queue_depth = IntGauge::with_opts(Opts::new(
            "consensus_tx_validator_queue_depth",
            "Depth of the transaction validator pool's priority work queue",
        ))?;
        registry.register(Box::new(tx_validator_queue_depth.clone()))?;

        let relay_peers_connected = IntGauge::with_opts(Opts::new(
            "consensus_relay_peers_connected",
            "Number of relay peer connections currently in the CONNECTED state",
        ))?;
        registry.register(Box::new(relay_peers_connected.clone()))?;

        let blocksync_lag_levels = Gauge::with_opts(Opts::new(
            "consensus_blocksync_lag_levels",
            "Estimated number of levels behind the network the block-sync client is working through",
        ))?;
        registry.register(Box::new(blocksync_lag_levels.clone()))?;

        let relay_peers_dropped_total = IntCounter::with_opts(Opts::new(
            "consensus_relay_peers_dropped_total",
            "Total relay peers dropped for exceeding the stop-threshold or timing out",
        ))?;
        registry.register(Box::new(relay_peers_dropped_total.clone()))?;

        Ok(Self {
            block_validation_seconds,
            skip_score_seconds,
            blocks_rejected_total,
            txs_rejected_total,
            last_indelible_level,
            resident_blocks,
            tx_validator_queue_depth,
            relay_peers_connected,
            blocksync_lag_levels,
            relay_peers_dropped_total,
        })
    }
}

/// Wrapper around a Prometheus registry and the consensus metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub consensus: ConsensusMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the consensus metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let consensus = ConsensusMetrics::register(&registry)?;
        Ok(Self {
            registry,
            consensus,
        })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            eprintln!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
///
/// This function is `async` and is intended to be spawned onto a Tokio
/// runtime, e.g.:
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9898".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                eprintln!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn consensus_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ConsensusMetrics::register(&registry).expect("register metrics");

        metrics.block_validation_seconds.observe(0.123);
        metrics.skip_score_seconds.observe(0.0004);
        metrics.blocks_rejected_total.with_label_values(&["BadSigOrder"]).inc();
        metrics.txs_rejected_total.with_label_values(&["InsufficientDonation"]).inc();
        metrics.last_indelible_level.set(42);
        metrics.resident_blocks.set(7);
        metrics.tx_validator_queue_depth.set(3);
        metrics.relay_peers_connected.set(5);
        metrics.blocksync_lag_levels.set(12.0);
        metrics.relay_peers_dropped_total.inc();

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.consensus.block_validation_seconds.observe(0.01);
        let text = registry.gather_text();
        assert!(text.contains("consensus_block_validation_seconds"));
    }
}

//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (tile requests, latency, connections, shutdowns)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `tessera_tile_requests_total` (counter): tile requests by mount, status
//! - `tessera_tile_request_duration_seconds` (histogram): latency by mount
//! - `tessera_active_connections` (gauge): current connection count
//! - `tessera_shutdowns_total` (counter): shutdowns by outcome
//! - `tessera_tile_cache_bytes` (gauge): bytes held by the tile cache
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Recording without an installed exporter is a no-op, so tests and
//!   embedders pay nothing

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_tile_request(mount: &str, status: u16, start: Instant) {
    let mount = mount.to_string();
    metrics::counter!(
        "tessera_tile_requests_total",
        "mount" => mount.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("tessera_tile_request_duration_seconds", "mount" => mount)
        .record(start.elapsed().as_secs_f64());
}

pub fn set_active_connections(count: usize) {
    metrics::gauge!("tessera_active_connections").set(count as f64);
}

pub fn record_shutdown(outcome: &'static str) {
    metrics::counter!("tessera_shutdowns_total", "outcome" => outcome).increment(1);
}

pub fn record_tile_cache_bytes(bytes: usize) {
    metrics::gauge!("tessera_tile_cache_bytes").set(bytes as f64);
}

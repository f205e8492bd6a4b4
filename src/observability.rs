use std::net::SocketAddr;
use std::time::Instant;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: engine operations executed. Labels: op, outcome.
pub const CHECKS_TOTAL: &str = "deskbook_checks_total";

/// Histogram: engine operation latency in seconds, repository read included. Labels: op.
pub const CHECK_DURATION_SECONDS: &str = "deskbook_check_duration_seconds";

/// Counter: repository reads that failed. Labels: op.
pub const REPOSITORY_ERRORS_TOTAL: &str = "deskbook_repository_errors_total";

/// Counter: wire requests that exceeded the request timeout.
pub const REQUEST_TIMEOUTS_TOTAL: &str = "deskbook_request_timeouts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "deskbook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "deskbook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "deskbook_connections_rejected_total";

/// Gauge: bookings held by the in-memory repository at startup.
pub const SEEDED_BOOKINGS: &str = "deskbook_seeded_bookings";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Record one finished engine operation.
pub fn record(op: &'static str, outcome: &'static str, started: Instant) {
    metrics::counter!(CHECKS_TOTAL, "op" => op, "outcome" => outcome).increment(1);
    metrics::histogram!(CHECK_DURATION_SECONDS, "op" => op).record(started.elapsed().as_secs_f64());
}

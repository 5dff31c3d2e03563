use std::net::SocketAddr;

use crate::engine::EngineError;
use crate::wire::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "visitbook_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "visitbook_request_duration_seconds";

/// Counter: reservations committed.
pub const BOOKINGS_TOTAL: &str = "visitbook_bookings_total";

/// Counter: bookings refused because the slot was already taken.
pub const SLOT_CONFLICTS_TOTAL: &str = "visitbook_slot_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "visitbook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "visitbook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "visitbook_connections_rejected_total";

/// Gauge: reservations restored from the WAL at startup.
pub const RESERVATIONS_LOADED: &str = "visitbook_reservations_loaded";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "visitbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "visitbook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), EngineError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| EngineError::Config(format!("metrics exporter: {e}")))?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for a request, for metrics.
pub fn op_label(req: &Request) -> &'static str {
    match req {
        Request::AvailableSlots { .. } => "available_slots",
        Request::Book { .. } => "book",
        Request::ByDate { .. } => "by_date",
        Request::Mine { .. } => "mine",
    }
}

/// Status label for a finished request.
pub fn status_label(error: Option<&EngineError>) -> &'static str {
    error.map_or("ok", EngineError::code)
}

//! Metrics collection.
//!
//! # Metrics
//! - `refund_executions_total` (counter): refund attempts by network, outcome
//! - `refund_spend_guard_total` (counter): spend guard decisions
//! - `refund_finality_total` (counter): refunds promoted to COMPLETED by network
//! - `refund_rpc_failovers_total` (counter): endpoint failovers by network
//! - `refund_rpc_health` (gauge): 1=healthy, 0=unhealthy per network
//! - `refund_webhooks_total` (counter): queued webhook events
//!
//! # Design Decisions
//! - Uses the metrics facade; the host process installs the exporter
//! - Low-overhead updates (atomic operations)

/// Record the outcome of a refund execution attempt.
pub fn record_refund_execution(network: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!(
        "refund_executions_total",
        "network" => network.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
}

/// Record a spend guard decision ("allowed", "rejected", "degraded").
pub fn record_spend_guard(decision: &'static str) {
    metrics::counter!("refund_spend_guard_total", "decision" => decision).increment(1);
}

/// Record a refund reaching finality.
pub fn record_refund_finality(network: &str) {
    metrics::counter!("refund_finality_total", "network" => network.to_string()).increment(1);
}

/// Record an RPC endpoint failover.
pub fn record_rpc_failover(network: &str) {
    metrics::counter!("refund_rpc_failovers_total", "network" => network.to_string())
        .increment(1);
}

/// Record RPC health for a network.
pub fn record_rpc_health(network: &str, healthy: bool) {
    metrics::gauge!("refund_rpc_health", "network" => network.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Record a queued webhook event.
pub fn record_webhook(event: &str) {
    metrics::counter!("refund_webhooks_total", "event" => event.to_string()).increment(1);
}

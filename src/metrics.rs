//! Prometheus metrics for DCA Sentinel
//!
//! Exposes metrics endpoint for monitoring:
//! - DCA executions by outcome
//! - Alert triggers and notification failures
//! - Scheduled strategy count
//! - Price feed health
//! - Alert monitor tick duration

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Metrics state
pub struct MetricsState {
    /// Prometheus registry
    registry: Registry,
    /// DCA executions, labelled by outcome (success / failed / skipped)
    pub dca_executions: IntCounterVec,
    /// Price alerts fired
    pub alert_triggers: IntCounter,
    /// Notifications that could not be delivered, labelled by event kind
    pub notification_failures: IntCounterVec,
    /// Strategies with a live recurring task
    pub scheduled_strategies: IntGauge,
    /// Last price feed call healthy (1) or degraded (0)
    pub price_feed_healthy: IntGauge,
    /// Alert monitor tick duration in seconds
    pub monitor_tick_seconds: Histogram,
}

impl MetricsState {
    /// Create a new metrics state with all metrics registered
    pub fn new() -> Self {
        let registry = Registry::new();

        let dca_executions = IntCounterVec::new(
            Opts::new("sentinel_dca_executions_total", "DCA executions by outcome"),
            &["outcome"],
        )
        .expect("Failed to create dca_executions counter");
        registry
            .register(Box::new(dca_executions.clone()))
            .expect("Failed to register dca_executions");

        let alert_triggers = IntCounter::with_opts(Opts::new(
            "sentinel_alert_triggers_total",
            "Price alerts triggered",
        ))
        .expect("Failed to create alert_triggers counter");
        registry
            .register(Box::new(alert_triggers.clone()))
            .expect("Failed to register alert_triggers");

        let notification_failures = IntCounterVec::new(
            Opts::new(
                "sentinel_notification_failures_total",
                "Notifications that failed to send",
            ),
            &["kind"],
        )
        .expect("Failed to create notification_failures counter");
        registry
            .register(Box::new(notification_failures.clone()))
            .expect("Failed to register notification_failures");

        let scheduled_strategies = IntGauge::with_opts(Opts::new(
            "sentinel_scheduled_strategies",
            "Strategies with an active recurring task",
        ))
        .expect("Failed to create scheduled_strategies gauge");
        registry
            .register(Box::new(scheduled_strategies.clone()))
            .expect("Failed to register scheduled_strategies");

        let price_feed_healthy = IntGauge::with_opts(Opts::new(
            "sentinel_price_feed_healthy",
            "Price feed health (1 = healthy, 0 = degraded)",
        ))
        .expect("Failed to create price_feed_healthy gauge");
        registry
            .register(Box::new(price_feed_healthy.clone()))
            .expect("Failed to register price_feed_healthy");

        let monitor_tick_seconds = Histogram::with_opts(HistogramOpts::new(
            "sentinel_monitor_tick_seconds",
            "Alert monitor tick duration in seconds",
        ))
        .expect("Failed to create monitor_tick_seconds histogram");
        registry
            .register(Box::new(monitor_tick_seconds.clone()))
            .expect("Failed to register monitor_tick_seconds");

        price_feed_healthy.set(1);

        Self {
            registry,
            dca_executions,
            alert_triggers,
            notification_failures,
            scheduled_strategies,
            price_feed_healthy,
            monitor_tick_seconds,
        }
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for MetricsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics handler - returns Prometheus metrics in text format
///
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.registry().gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("Content-Type", "text/plain; version=0.0.4")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        buffer,
    )
}

/// Create metrics router
pub fn metrics_router() -> Router<Arc<MetricsState>> {
    Router::new().route("/metrics", get(metrics_handler))
}

// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Evoke operator.
//!
//! This module provides metrics collection with the namespace prefix
//! `evoke_dev_` (prometheus-safe version of "evoke.dev").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Outcomes and durations of worker passes
//! - **Queue Metrics** - Requeues, dropped keys, and queue depth
//! - **Configuration Metrics** - Resync outcomes
//!
//! # Example
//!
//! ```rust,no_run
//! use evoke::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("gateway-controller", std::time::Duration::from_millis(12));
//! ```

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::info;

use crate::constants::{METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH};

/// Namespace prefix for all Evoke metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "evoke_dev";

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliation passes by controller and status
///
/// Labels:
/// - `controller`: Controller name (e.g. `gateway-controller`)
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliation passes by controller and status",
    );
    let counter = CounterVec::new(opts, &["controller", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliation passes in seconds
///
/// Labels:
/// - `controller`: Controller name
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliation passes in seconds by controller",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["controller"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Queue Metrics
// ============================================================================

/// Total number of rate-limited requeues
///
/// Labels:
/// - `controller`: Controller name
pub static REQUEUES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of rate-limited requeues by controller",
    );
    let counter = CounterVec::new(opts, &["controller"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of keys dropped after exhausting their retry budget
///
/// Labels:
/// - `controller`: Controller name
pub static DROPPED_KEYS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_dropped_keys_total"),
        "Total number of keys dropped after exceeding max requeues",
    );
    let counter = CounterVec::new(opts, &["controller"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of keys currently pending in the work queue
///
/// Labels:
/// - `controller`: Controller name
pub static QUEUE_DEPTH: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_queue_depth"),
        "Number of keys currently pending in the work queue",
    );
    let gauge = GaugeVec::new(opts, &["controller"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Configuration Metrics
// ============================================================================

/// Total number of configuration resyncs by controller and status
///
/// Labels:
/// - `controller`: Controller name
/// - `status`: Outcome (`applied`, `ignored`, `error`)
pub static CONFIG_RESYNCS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_config_resyncs_total"),
        "Total number of configuration resyncs by controller and status",
    );
    let counter = CounterVec::new(opts, &["controller", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation pass
///
/// # Arguments
/// * `controller` - Controller name (e.g. `gateway-controller`)
/// * `duration` - Duration of the pass
pub fn record_reconciliation_success(controller: &str, duration: Duration) {
    RECONCILIATIONS_TOTAL
        .with_label_values(&[controller, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[controller])
        .observe(duration.as_secs_f64());
}

/// Record a terminally failed reconciliation pass
///
/// # Arguments
/// * `controller` - Controller name
/// * `duration` - Duration of the pass before failure
pub fn record_reconciliation_error(controller: &str, duration: Duration) {
    RECONCILIATIONS_TOTAL
        .with_label_values(&[controller, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[controller])
        .observe(duration.as_secs_f64());
}

/// Record a rate-limited requeue
///
/// # Arguments
/// * `controller` - Controller name
pub fn record_requeue(controller: &str) {
    REQUEUES_TOTAL.with_label_values(&[controller]).inc();
}

/// Record a key dropped after exhausting its retry budget
///
/// # Arguments
/// * `controller` - Controller name
pub fn record_dropped_key(controller: &str) {
    DROPPED_KEYS_TOTAL.with_label_values(&[controller]).inc();
}

/// Record a configuration resync outcome
///
/// # Arguments
/// * `controller` - Controller name
/// * `status` - Outcome (`applied`, `ignored`, `error`)
pub fn record_config_resync(controller: &str, status: &str) {
    CONFIG_RESYNCS_TOTAL
        .with_label_values(&[controller, status])
        .inc();
}

/// Set the current work-queue depth
///
/// # Arguments
/// * `controller` - Controller name
/// * `depth` - Number of pending keys
#[allow(clippy::cast_precision_loss)]
pub fn set_queue_depth(controller: &str, depth: usize) {
    QUEUE_DEPTH
        .with_label_values(&[controller])
        .set(depth as f64);
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

async fn metrics_handler() -> (StatusCode, String) {
    match gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// Serve the Prometheus metrics endpoint.
///
/// Binds `0.0.0.0:port` and serves the text exposition format on
/// `/metrics` until the process exits.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve_metrics(port: u16) -> anyhow::Result<()> {
    let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));
    let address = format!("{METRICS_SERVER_BIND_ADDRESS}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %address, "serving metrics");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_reconciliation_success() {
        let controller = "test-controller";
        let duration = Duration::from_millis(500);

        record_reconciliation_success(controller, duration);

        let counter = RECONCILIATIONS_TOTAL.with_label_values(&[controller, "success"]);
        assert!(counter.get() > 0.0);

        let histogram = RECONCILIATION_DURATION_SECONDS.with_label_values(&[controller]);
        assert!(histogram.get_sample_count() > 0);
    }

    #[test]
    fn test_record_dropped_key() {
        let controller = "test-controller-drop";

        record_dropped_key(controller);
        record_dropped_key(controller);

        let counter = DROPPED_KEYS_TOTAL.with_label_values(&[controller]);
        assert!(counter.get() >= 2.0);
    }

    #[test]
    fn test_queue_depth_gauge() {
        let controller = "test-controller-depth";

        set_queue_depth(controller, 7);
        let gauge = QUEUE_DEPTH.with_label_values(&[controller]);
        assert!((gauge.get() - 7.0).abs() < f64::EPSILON);

        set_queue_depth(controller, 0);
        assert!(gauge.get().abs() < f64::EPSILON);
    }

    #[test]
    fn test_gather_metrics() {
        record_reconciliation_success("gather-test", Duration::from_millis(100));

        let result = gather_metrics();
        assert!(result.is_ok(), "Gathering metrics should succeed");

        let metrics_text = result.unwrap();
        assert!(
            metrics_text.contains("evoke_dev"),
            "Metrics should contain namespace prefix"
        );
        assert!(
            metrics_text.contains("reconciliations_total"),
            "Metrics should contain reconciliation counter"
        );
    }
}

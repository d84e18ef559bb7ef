//! Prometheus metrics for the LBF Operator
//!
//! Exposes metrics endpoint for monitoring:
//! - Operation outcomes by type and status
//! - Job dispatch counts and durations
//! - Scheduled job gauge
//! - Notification delivery failures

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
    registry: Registry,
    /// Finished operations by type and final status
    pub operations_total: IntCounterVec,
    /// Jobs dispatched by kind
    pub jobs_dispatched: IntCounterVec,
    /// Handler duration (milliseconds)
    pub job_duration: Histogram,
    /// Jobs currently delayed or running
    pub scheduled_jobs: IntGauge,
    /// Notification deliveries that raised
    pub notifications_failed: IntCounter,
}

impl MetricsState {
    /// Create a new metrics state with all metrics registered
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let operations_total = IntCounterVec::new(
            Opts::new("lbf_operations_total", "Finished operations by type and status"),
            &["type", "status"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let jobs_dispatched = IntCounterVec::new(
            Opts::new("lbf_jobs_dispatched_total", "Jobs dispatched by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(jobs_dispatched.clone()))?;

        let job_duration = Histogram::with_opts(
            HistogramOpts::new("lbf_job_duration_ms", "Job handler duration in milliseconds")
                .buckets(vec![
                    100.0, 500.0, 1_000.0, 5_000.0, 15_000.0, 60_000.0, 180_000.0, 600_000.0,
                ]),
        )?;
        registry.register(Box::new(job_duration.clone()))?;

        let scheduled_jobs = IntGauge::with_opts(Opts::new(
            "lbf_scheduled_jobs",
            "Jobs currently delayed or running",
        ))?;
        registry.register(Box::new(scheduled_jobs.clone()))?;

        let notifications_failed = IntCounter::with_opts(Opts::new(
            "lbf_notifications_failed_total",
            "Notification deliveries that failed",
        ))?;
        registry.register(Box::new(notifications_failed.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            jobs_dispatched,
            job_duration,
            scheduled_jobs,
            notifications_failed,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
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
